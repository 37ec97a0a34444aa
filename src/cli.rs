//! CLI argument parsing.
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_CONFIG_FILE;

/// Release a Python package: validate, bump, tag, push and publish.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = ".", global = true)]
    /// Path inside the git repository to release. Parent directories are
    /// searched for the repository root.
    pub repo: PathBuf,

    #[arg(long, global = true)]
    /// Configuration file. Defaults to tagsmith.toml in the repository root.
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Release subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the configured test, lint and type checks.
    Validate,

    /// Create an annotated release tag for a version at HEAD.
    Tag {
        /// Version to tag, as MAJOR.MINOR.PATCH.
        version: String,

        #[arg(short, long)]
        /// Tag message. Supports {version} and {tag} placeholders.
        message: Option<String>,
    },

    /// Push the current branch and every local tag.
    Push {
        #[arg(long, default_value_t = false)]
        /// Log the refs that would be pushed without pushing.
        dry_run: bool,
    },

    /// Bump, validate, commit, tag and push a release.
    Release {
        /// Version to release, as MAJOR.MINOR.PATCH.
        version: String,

        #[arg(long, default_value_t = false)]
        /// Proceed even if the working tree has uncommitted changes.
        allow_dirty: bool,

        #[arg(short, long)]
        /// Tag message. Supports {version} and {tag} placeholders.
        message: Option<String>,

        #[arg(long)]
        /// Build and upload to this target once the release is pushed.
        publish: Option<String>,

        #[arg(long, default_value_t = false)]
        /// Run checks and validation but only log what would change.
        dry_run: bool,
    },

    /// Build and upload the already released manifest version.
    Publish {
        /// Target name from the [targets] config table.
        target: String,

        #[arg(long, default_value_t = false)]
        /// Run checks and validation but skip the build and upload.
        dry_run: bool,
    },

    /// Print the version in the manifest.
    Version {
        #[arg(long, default_value_t = false)]
        /// Print as JSON.
        json: bool,
    },

    /// List release tags in ascending version order.
    Versions {
        #[arg(long, default_value_t = false)]
        /// Print as JSON.
        json: bool,
    },
}

impl Args {
    /// Config file to load: `--config` when given, otherwise
    /// `tagsmith.toml` in `workdir`.
    pub fn config_path(&self, workdir: &Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| workdir.join(DEFAULT_CONFIG_FILE))
    }
}
