//! Typed errors for release operations.
//!
//! Every variant aborts the release pipeline. The command layer wraps these
//! with the name of the failing step before they reach the user.

use std::path::PathBuf;
use thiserror::Error;

use crate::orchestrator::ReleaseState;

/// Main error type for tagsmith operations.
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Input errors
    #[error(
        "Invalid version '{0}': expected MAJOR.MINOR.PATCH using digits only"
    )]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown publish target '{0}'")]
    UnknownTarget(String),

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    // Precondition errors
    #[error("Working tree has uncommitted changes: {}", paths.join(", "))]
    DirtyWorkingTree { paths: Vec<String> },

    #[error("Version conflict: tag '{tag}' already exists")]
    VersionConflict { tag: String },

    #[error("Tag '{tag}' was created by someone else while releasing")]
    TagAlreadyExists { tag: String },

    #[error("Cannot {operation}: release is {actual}, requires {expected}")]
    InvalidState {
        operation: &'static str,
        expected: ReleaseState,
        actual: ReleaseState,
    },

    #[error("Cannot {operation}: no release has been prepared")]
    NotPrepared { operation: &'static str },

    #[error(
        "Another release is in progress (lock file {} exists)",
        path.display()
    )]
    ReleaseInProgress { path: PathBuf },

    #[error("HEAD is detached: check out a branch before releasing")]
    DetachedHead,

    #[error("Tag '{tag}' does not exist at HEAD: run release first")]
    ReleaseNotTagged { tag: String },

    #[error("Tag '{tag}' has not been pushed to remote '{remote}'")]
    ReleaseNotPushed { tag: String, remote: String },

    // Collaborator errors
    #[error("Validation step '{step}' failed:\n{output}")]
    ValidationFailed { step: String, output: String },

    #[error("Build failed:\n{output}")]
    BuildFailed { output: String },

    #[error("Publishing to '{target}' failed:\n{output}")]
    PublishFailed { target: String, output: String },

    #[error("Push of '{refspec}' rejected: {reason}")]
    PushRejected { refspec: String, reason: String },

    // Wrapped errors
    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML edit error: {0}")]
    TomlEditError(#[from] toml_edit::TomlError),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regular expression error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias using ReleaseError
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a push rejection error
    pub fn push_rejected(
        refspec: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PushRejected {
            refspec: refspec.into(),
            reason: reason.into(),
        }
    }
}
