pub mod cli;
pub mod collaborator;
pub mod command;
pub mod config;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod orchestrator;
pub mod repo;
pub mod result;
pub mod version;

pub use error::ReleaseError;
pub use orchestrator::{Orchestrator, ReleaseState};

#[cfg(test)]
pub mod test_helpers;
