//! Configuration loading and parsing for `tagsmith.toml` files.
//!
//! Every section has defaults, so a repository without a config file gets a
//! conventional Python release flow: pytest, ruff and mypy for validation,
//! `python -m build` for artifacts and twine for uploads to PyPI.
use log::*;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use url::Url;

use crate::{
    error::{ReleaseError, Result},
    manifest::DEFAULT_MANIFEST,
    version::DEFAULT_TAG_PREFIX,
};

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "tagsmith.toml";

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore(release): {version}";
pub const DEFAULT_TAG_MESSAGE: &str = "Release {version}";
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Placeholder values substituted into collaborator arguments and messages.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    pub version: String,
    pub tag: String,
    pub index_url: String,
}

impl Placeholders {
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{version}", &self.version)
            .replace("{tag}", &self.tag)
            .replace("{index_url}", &self.index_url)
    }
}

/// Git settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote that branches and tags are pushed to.
    pub remote: String,
    /// Environment variable holding an HTTPS token for pushing.
    pub token_env: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.into(),
            token_env: None,
        }
    }
}

/// One external command: a validation check, the build, or an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolStep {
    /// Short name used in logs and errors ("test", "lint").
    pub name: String,
    /// Program followed by its arguments. Not run through a shell.
    pub command: Vec<String>,
}

impl ToolStep {
    pub fn new(name: &str, command: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Artifact build settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub command: Vec<String>,
    /// Directory, relative to the repository root, the build writes into.
    pub output_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".into(), "-m".into(), "build".into()],
            output_dir: DEFAULT_OUTPUT_DIR.into(),
        }
    }
}

/// Kind of package index a target uploads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Public,
    Internal,
}

/// A named upload destination.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub index: IndexKind,
    /// Index URL; required for internal indexes.
    pub url: Option<String>,
    /// Upload command. Artifact paths are appended to it.
    pub command: Vec<String>,
}

/// Root configuration structure for `tagsmith.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manifest path relative to the repository root.
    pub manifest: String,
    /// Prefix for release tags.
    pub tag_prefix: String,
    pub commit_message: String,
    pub tag_message: String,
    pub git: GitConfig,
    /// Checks run, in order, before anything is committed or published.
    pub validate: Vec<ToolStep>,
    pub build: BuildConfig,
    pub targets: BTreeMap<String, TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut targets = BTreeMap::new();
        targets.insert(
            "pypi".to_string(),
            TargetConfig {
                index: IndexKind::Public,
                url: None,
                command: vec!["twine".into(), "upload".into()],
            },
        );

        Self {
            manifest: DEFAULT_MANIFEST.into(),
            tag_prefix: DEFAULT_TAG_PREFIX.into(),
            commit_message: DEFAULT_COMMIT_MESSAGE.into(),
            tag_message: DEFAULT_TAG_MESSAGE.into(),
            git: GitConfig::default(),
            validate: vec![
                ToolStep::new("test", &["pytest"]),
                ToolStep::new("lint", &["ruff", "check", "."]),
                ToolStep::new("typecheck", &["mypy", "src"]),
            ],
            build: BuildConfig::default(),
            targets,
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "no config found at {}: using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        info!("loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Reject configurations that would only fail halfway through a release.
    pub fn check(&self) -> Result<()> {
        if self.manifest.trim().is_empty() {
            return Err(ReleaseError::invalid_config("manifest path is empty"));
        }

        for step in &self.validate {
            if step.command.is_empty() {
                return Err(ReleaseError::invalid_config(format!(
                    "validate step '{}' has an empty command",
                    step.name
                )));
            }
        }

        if self.build.command.is_empty() {
            return Err(ReleaseError::invalid_config("build command is empty"));
        }

        for (name, target) in &self.targets {
            if target.command.is_empty() {
                return Err(ReleaseError::invalid_config(format!(
                    "target '{name}' has an empty command"
                )));
            }

            match (&target.index, &target.url) {
                (IndexKind::Internal, None) => {
                    return Err(ReleaseError::invalid_config(format!(
                        "internal target '{name}' requires a url"
                    )));
                }
                (_, Some(url)) => {
                    Url::parse(url)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Manifest path relative to the repository root, normalised for
    /// comparison against git status paths.
    pub fn manifest_path(&self) -> &str {
        self.manifest.trim_start_matches("./")
    }

    pub fn target(&self, name: &str) -> Result<&TargetConfig> {
        self.targets
            .get(name)
            .ok_or_else(|| ReleaseError::UnknownTarget(name.into()))
    }
}
