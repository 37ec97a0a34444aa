//! Release orchestration.
//!
//! The [`Orchestrator`] walks a single release through
//! `Draft → Validated → Committed → Tagged → Pushed → Published`. Each
//! operation checks the current state first and fails with
//! [`ReleaseError::InvalidState`] when called out of order, before touching
//! the repository. Preconditions that guard irreversible steps (clean tree,
//! no existing tag) are checked again right before the step runs.
use log::*;
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    collaborator::{Invocation, ToolOutput, ToolRunner},
    config::{Config, IndexKind, Placeholders, ToolStep},
    error::{ReleaseError, Result},
    manifest::Manifest,
    repo::{Repository, branch_refspec, tag_refspec},
    version::{ReleaseTag, ReleaseVersion, sort_release_tags},
};

/// Where a release is in its lifecycle. Ordered: a later state implies all
/// earlier ones were reached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseState {
    Draft,
    Validated,
    Committed,
    Tagged,
    Pushed,
    Published,
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseState::Draft => "draft",
            ReleaseState::Validated => "validated",
            ReleaseState::Committed => "committed",
            ReleaseState::Tagged => "tagged",
            ReleaseState::Pushed => "pushed",
            ReleaseState::Published => "published",
        };
        write!(f, "{name}")
    }
}

/// Package index a release was published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    None,
    Internal { name: String, url: String },
    Public { name: String },
}

impl PublishTarget {
    fn index_url(&self) -> &str {
        match self {
            PublishTarget::Internal { url, .. } => url,
            _ => "",
        }
    }
}

/// A release being cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: ReleaseVersion,
    pub tag: String,
    pub target: PublishTarget,
}

/// Built distribution files for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub version: String,
    /// Paths relative to the repository root.
    pub paths: Vec<PathBuf>,
}

pub struct Orchestrator {
    config: Config,
    repo: Repository,
    runner: Box<dyn ToolRunner>,
    dry_run: bool,
    allow_dirty: bool,
    state: ReleaseState,
    release: Option<Release>,
}

impl Orchestrator {
    pub fn new(
        repo: Repository,
        config: Config,
        runner: Box<dyn ToolRunner>,
    ) -> Self {
        Self {
            config,
            repo,
            runner,
            dry_run: false,
            allow_dirty: false,
            state: ReleaseState::Draft,
            release: None,
        }
    }

    /// Log mutating steps instead of performing them. Checks and validation
    /// still run for real.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state(&self) -> ReleaseState {
        self.state
    }

    pub fn release(&self) -> Option<&Release> {
        self.release.as_ref()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Version currently recorded in the manifest.
    pub fn manifest_version(&self) -> Result<String> {
        self.load_manifest()?.version()
    }

    /// Release tags in ascending semantic order.
    pub fn release_tags(&self) -> Result<Vec<ReleaseTag>> {
        let names = self.repo.tag_names()?;
        Ok(sort_release_tags(&self.config.tag_prefix, names))
    }

    /// Start a release: check preconditions, then write `version` into the
    /// manifest and stage it.
    ///
    /// # Errors
    ///
    /// - [`ReleaseError::InvalidVersion`] for anything but `MAJOR.MINOR.PATCH`
    /// - [`ReleaseError::DirtyWorkingTree`] if the tree has changes and
    ///   `allow_dirty` is false
    /// - [`ReleaseError::VersionConflict`] if the tag already exists
    /// - [`ReleaseError::InvalidManifest`] if the manifest has no writable
    ///   version
    pub fn prepare_release(
        &mut self,
        version: &str,
        allow_dirty: bool,
    ) -> Result<&Release> {
        self.require("prepare release", ReleaseState::Draft)?;

        let version = ReleaseVersion::parse(version)?;
        let tag = version.tag_name(&self.config.tag_prefix);

        info!("preparing release {version} (tag {tag})");

        let dirty = self.repo.dirty_paths()?;
        if !dirty.is_empty() {
            if !allow_dirty {
                return Err(ReleaseError::DirtyWorkingTree { paths: dirty });
            }
            warn!(
                "continuing with uncommitted changes: {}",
                dirty.join(", ")
            );
        }

        if self.repo.tag_exists(&tag)? {
            return Err(ReleaseError::VersionConflict { tag });
        }

        let mut manifest = self.load_manifest()?;
        let changed = manifest.set_version(&version.to_string())?;

        if changed {
            if self.dry_run {
                info!(
                    "[dry-run] would write version {version} to {}",
                    manifest.path().display()
                );
            } else {
                manifest.save()?;
                self.repo.stage_path(Path::new(self.config.manifest_path()))?;
            }
        }

        self.allow_dirty = allow_dirty;

        Ok(&*self.release.insert(Release {
            version,
            tag,
            target: PublishTarget::None,
        }))
    }

    /// Run every configured check in order, stopping at the first failure.
    pub fn validate(&mut self) -> Result<()> {
        self.require("validate", ReleaseState::Draft)?;

        let placeholders = self.placeholders(&PublishTarget::None);
        let steps = self.config.validate.clone();

        for step in &steps {
            let output = self.run_step(step, &placeholders, &[])?;

            if !output.success {
                error!("validation step '{}' failed", step.name);
                return Err(ReleaseError::ValidationFailed {
                    step: step.name.clone(),
                    output: output.output,
                });
            }

            info!("validation step '{}' passed", step.name);
        }

        self.state = ReleaseState::Validated;
        Ok(())
    }

    /// Commit the staged manifest and tag the result.
    ///
    /// Only the manifest goes into the commit, even when other changes are
    /// staged. The commit is skipped when the manifest already had the
    /// version. The tag is checked for before committing and again before it
    /// is written. `message` overrides the configured tag message.
    pub fn commit_and_tag(&mut self, message: Option<&str>) -> Result<()> {
        self.require("commit and tag", ReleaseState::Validated)?;
        let release = self.prepared("commit and tag")?.clone();
        let placeholders = self.placeholders(&PublishTarget::None);

        if !self.allow_dirty {
            let manifest = self.config.manifest_path();
            let dirty = self
                .repo
                .dirty_paths()?
                .into_iter()
                .filter(|p| p != manifest)
                .collect::<Vec<_>>();

            if !dirty.is_empty() {
                return Err(ReleaseError::DirtyWorkingTree { paths: dirty });
            }
        }

        if self.repo.tag_exists(&release.tag)? {
            return Err(ReleaseError::TagAlreadyExists { tag: release.tag });
        }

        let commit_message = placeholders.render(&self.config.commit_message);
        let manifest = Path::new(self.config.manifest_path());

        if self.dry_run {
            info!("[dry-run] would commit: {commit_message}");
        } else if let Some(oid) =
            self.repo.commit_path(manifest, &commit_message)?
        {
            info!("created release commit {oid}");
        } else {
            info!("manifest already at {}: no commit needed", release.version);
        }

        self.state = ReleaseState::Committed;

        // and again right before the tag is written
        if self.repo.tag_exists(&release.tag)? {
            return Err(ReleaseError::TagAlreadyExists { tag: release.tag });
        }

        let tag_message = message
            .map(|m| placeholders.render(m))
            .unwrap_or_else(|| placeholders.render(&self.config.tag_message));

        if self.dry_run {
            info!("[dry-run] would create tag {}", release.tag);
        } else {
            self.repo.tag_head(&release.tag, &tag_message)?;
            info!("created tag {}", release.tag);
        }

        self.state = ReleaseState::Tagged;
        Ok(())
    }

    /// Push the current branch and the release tag.
    pub fn push(&mut self) -> Result<()> {
        self.require("push", ReleaseState::Tagged)?;
        let release = self.prepared("push")?.clone();
        let branch = self.repo.current_branch()?;

        let refspecs = vec![branch_refspec(&branch), tag_refspec(&release.tag)];

        if self.dry_run {
            info!("[dry-run] would push {}", refspecs.join(", "));
        } else {
            self.repo.push(&refspecs)?;
            info!(
                "pushed {branch} and {} to {}",
                release.tag,
                self.repo.remote_name()
            );
        }

        self.state = ReleaseState::Pushed;
        Ok(())
    }

    /// Confirm the manifest version was already released and pushed, so a
    /// standalone publish can continue from `Pushed`.
    ///
    /// Requires tag `<prefix><manifest version>` locally at HEAD and on the
    /// remote with the same target.
    pub fn reconcile_pushed(&mut self) -> Result<&Release> {
        self.require("publish", ReleaseState::Validated)?;

        let version = ReleaseVersion::parse(&self.manifest_version()?)?;
        let tag = version.tag_name(&self.config.tag_prefix);

        let head = self.repo.head_commit_id()?;
        if self.repo.tag_commit_id(&tag)? != Some(head) {
            return Err(ReleaseError::ReleaseNotTagged { tag });
        }

        let local = self.repo.tag_ref_target(&tag)?;
        let remote = self.repo.remote_ref(&format!("refs/tags/{tag}"))?;

        if remote.is_none() || remote != local {
            return Err(ReleaseError::ReleaseNotPushed {
                tag,
                remote: self.repo.remote_name().to_string(),
            });
        }

        info!("{tag} is tagged at HEAD and pushed");
        self.state = ReleaseState::Pushed;

        Ok(&*self.release.insert(Release {
            version,
            tag,
            target: PublishTarget::None,
        }))
    }

    /// Build distribution artifacts for the release.
    ///
    /// The tree must be clean apart from earlier build output: what gets
    /// uploaded has to be exactly what was tagged.
    pub fn build(&mut self) -> Result<ArtifactSet> {
        self.require("build", ReleaseState::Pushed)?;
        let release = self.prepared("build")?.clone();
        let version = release.version.to_string();

        let dirty = self.dirty_outside_output_dir()?;
        if !dirty.is_empty() {
            return Err(ReleaseError::DirtyWorkingTree { paths: dirty });
        }

        if self.dry_run {
            info!("[dry-run] would build artifacts for {version}");
            return Ok(ArtifactSet {
                version,
                paths: vec![],
            });
        }

        let step = ToolStep {
            name: "build".into(),
            command: self.config.build.command.clone(),
        };
        let placeholders = self.placeholders(&PublishTarget::None);
        let output = self.run_step(&step, &placeholders, &[])?;

        if !output.success {
            return Err(ReleaseError::BuildFailed {
                output: output.output,
            });
        }

        let paths = self.collect_artifacts(&version)?;
        info!("built {} artifact(s) for {version}", paths.len());

        Ok(ArtifactSet { version, paths })
    }

    /// Upload `artifacts` to the configured target named `target`.
    ///
    /// A failure here leaves the pushed tag alone; publishing can simply be
    /// retried.
    pub fn publish(
        &mut self,
        artifacts: &ArtifactSet,
        target: &str,
    ) -> Result<()> {
        self.require("publish", ReleaseState::Pushed)?;
        let release = self.prepared("publish")?.clone();
        let target_config = self.config.target(target)?.clone();

        let publish_target = match target_config.index {
            IndexKind::Public => PublishTarget::Public {
                name: target.into(),
            },
            IndexKind::Internal => PublishTarget::Internal {
                name: target.into(),
                url: target_config.url.clone().unwrap_or_default(),
            },
        };

        let dirty = self.dirty_outside_output_dir()?;
        if !dirty.is_empty() {
            return Err(ReleaseError::DirtyWorkingTree { paths: dirty });
        }

        if self.dry_run {
            info!("[dry-run] would publish {} to {target}", release.tag);
        } else {
            if artifacts.version != release.version.to_string()
                || artifacts.paths.is_empty()
            {
                return Err(ReleaseError::PublishFailed {
                    target: target.into(),
                    output: format!(
                        "no artifacts for version {} to upload",
                        release.version
                    ),
                });
            }

            let step = ToolStep {
                name: format!("upload to {target}"),
                command: target_config.command.clone(),
            };
            let placeholders = self.placeholders(&publish_target);
            let paths = artifacts
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>();

            let output = self.run_step(&step, &placeholders, &paths)?;

            if !output.success {
                return Err(ReleaseError::PublishFailed {
                    target: target.into(),
                    output: output.output,
                });
            }

            info!("published {} to {target}", release.tag);
        }

        if let Some(release) = self.release.as_mut() {
            release.target = publish_target;
        }
        self.state = ReleaseState::Published;
        Ok(())
    }

    /// Create an annotated tag for `version` at HEAD outside the release
    /// sequence.
    pub fn tag_release(
        &self,
        version: &str,
        message: Option<&str>,
    ) -> Result<String> {
        let version = ReleaseVersion::parse(version)?;
        let tag = version.tag_name(&self.config.tag_prefix);

        if self.repo.tag_exists(&tag)? {
            return Err(ReleaseError::VersionConflict { tag });
        }

        let placeholders = Placeholders {
            version: version.to_string(),
            tag: tag.clone(),
            index_url: String::new(),
        };
        let message = placeholders
            .render(message.unwrap_or(self.config.tag_message.as_str()));

        self.repo.tag_head(&tag, &message)?;
        info!("created tag {tag}");

        Ok(tag)
    }

    /// Push the current branch and every local tag.
    pub fn push_all(&self) -> Result<()> {
        let branch = self.repo.current_branch()?;

        let mut refspecs = vec![branch_refspec(&branch)];
        refspecs.extend(
            self.repo
                .tag_names()?
                .iter()
                .map(|tag| tag_refspec(tag)),
        );

        if self.dry_run {
            info!("[dry-run] would push {}", refspecs.join(", "));
            return Ok(());
        }

        self.repo.push(&refspecs)
    }

    /// Dirty paths, leaving out the build output directory. Build output is
    /// expected to be untracked or ignored, and a failed upload leaves it
    /// behind for the retry.
    fn dirty_outside_output_dir(&self) -> Result<Vec<String>> {
        let output_dir = self.config.build.output_dir.trim_end_matches('/');
        let prefix = format!("{output_dir}/");

        Ok(self
            .repo
            .dirty_paths()?
            .into_iter()
            .filter(|p| !p.starts_with(&prefix))
            .collect())
    }

    fn require(
        &self,
        operation: &'static str,
        expected: ReleaseState,
    ) -> Result<()> {
        if self.state != expected {
            return Err(ReleaseError::InvalidState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn prepared(&self, operation: &'static str) -> Result<&Release> {
        self.release
            .as_ref()
            .ok_or(ReleaseError::NotPrepared { operation })
    }

    fn placeholders(&self, target: &PublishTarget) -> Placeholders {
        match &self.release {
            Some(release) => Placeholders {
                version: release.version.to_string(),
                tag: release.tag.clone(),
                index_url: target.index_url().to_string(),
            },
            None => Placeholders {
                index_url: target.index_url().to_string(),
                ..Placeholders::default()
            },
        }
    }

    fn run_step(
        &self,
        step: &ToolStep,
        placeholders: &Placeholders,
        extra_args: &[String],
    ) -> Result<ToolOutput> {
        let invocation =
            Invocation::from_step(step, placeholders, self.repo.workdir()?)?
                .with_args(extra_args.iter().cloned());
        self.runner.run(&invocation)
    }

    fn load_manifest(&self) -> Result<Manifest> {
        let path = self.repo.workdir()?.join(self.config.manifest_path());
        Manifest::load(&path)
    }

    /// Files in the build output directory whose names carry `version`.
    /// Older builds lying around in the same directory are left out.
    fn collect_artifacts(&self, version: &str) -> Result<Vec<PathBuf>> {
        let output_dir = Path::new(&self.config.build.output_dir);
        let abs_dir = self.repo.workdir()?.join(output_dir);

        if !abs_dir.is_dir() {
            return Ok(vec![]);
        }

        let mut paths = vec![];
        for entry in fs::read_dir(&abs_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            if entry.file_type()?.is_file() && is_artifact_for(&name, version)
            {
                paths.push(output_dir.join(&name));
            } else {
                debug!("skipping {name}: not an artifact for {version}");
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// Python distribution names put the version right after the project name:
/// `pkg-1.0.0.tar.gz`, `pkg-1.0.0-py3-none-any.whl`.
fn is_artifact_for(file_name: &str, version: &str) -> bool {
    let needle = format!("-{version}");
    file_name.match_indices(&needle).any(|(i, _)| {
        let rest = &file_name[i + needle.len()..];
        rest.starts_with('-')
            || rest.starts_with(".tar")
            || rest.starts_with(".zip")
    })
}
