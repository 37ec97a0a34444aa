//! Exclusive release lock.
//!
//! A lock file inside the git directory marks a release in progress. It is
//! created with `create_new`, so two processes can never both hold it, and
//! removed when the guard drops.
use log::*;
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process,
};

use crate::error::{ReleaseError, Result};

pub const LOCK_FILE: &str = "tagsmith.lock";

#[derive(Debug)]
pub struct ReleaseLock {
    path: PathBuf,
}

impl ReleaseLock {
    /// Take the lock in `git_dir`.
    ///
    /// # Errors
    ///
    /// [`ReleaseError::ReleaseInProgress`] when the lock file already exists.
    /// A stale file left by a crashed run has to be removed by hand; the
    /// error message names it.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let path = git_dir.join(LOCK_FILE);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(ReleaseError::ReleaseInProgress { path });
            }
            Err(err) => return Err(err.into()),
        };

        writeln!(file, "{}", process::id())?;
        debug!("acquired release lock {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ReleaseLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                "failed to remove release lock {}: {err}",
                self.path.display()
            );
        } else {
            debug!("released lock {}", self.path.display());
        }
    }
}
