//! Command execution for tagsmith.
//!
//! Each subcommand opens the repository, loads `tagsmith.toml` and drives
//! the [`crate::orchestrator::Orchestrator`] through the steps it needs:
//!
//! - **validate**: run the configured checks
//! - **tag** / **push**: manual tagging and pushing outside a release
//! - **release**: prepare, validate, commit, tag, push and optionally publish
//! - **publish**: build and upload a version that is already pushed
//! - **show**: report the manifest version and existing release tags
//!
//! Commands that change the repository hold the release lock for their
//! whole run. Failures are wrapped with the name of the step that failed.

/// Shared repository, configuration and lock setup.
pub mod common;

/// Standalone build and upload, also used by `release --publish`.
pub mod publish;

/// The full release sequence.
pub mod release;

/// `version` and `versions`.
pub mod show;

/// Manual `tag` and `push`.
pub mod tag;

pub mod validate;
