//! External tools the release calls out to: test runner, linters, the
//! package builder and the upload client.
//!
//! They are opaque to the orchestrator. Each one is a process that either
//! exits successfully or fails, and its combined output is kept so failures
//! can be reported verbatim.
use log::*;
use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    config::{Placeholders, ToolStep},
    error::{ReleaseError, Result},
};

/// A fully rendered command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl Invocation {
    /// Render `step` with placeholders substituted, to run in `workdir`.
    pub fn from_step(
        step: &ToolStep,
        placeholders: &Placeholders,
        workdir: &Path,
    ) -> Result<Self> {
        let mut parts = step.command.iter().map(|c| placeholders.render(c));

        let program = parts.next().ok_or_else(|| {
            ReleaseError::invalid_config(format!(
                "step '{}' has an empty command",
                step.name
            ))
        })?;

        Ok(Self {
            name: step.name.clone(),
            program,
            args: parts.collect(),
            workdir: workdir.to_path_buf(),
        })
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of running a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
}

impl ToolOutput {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Runs collaborator commands.
#[cfg_attr(test, mockall::automock)]
pub trait ToolRunner {
    /// Run to completion. `Err` is reserved for failures to even attempt the
    /// run; a tool that ran and failed is `Ok` with `success == false`.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs collaborators as child processes, inheriting the environment so the
/// package's own settings (database urls and the like) reach its test suite.
#[derive(Debug, Default)]
pub struct CommandRunner;

impl ToolRunner for CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        info!("running {}: {invocation}", invocation.name);

        let result = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .output();

        let output = match result {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(ToolOutput::failed(format!(
                    "{}: command not found",
                    invocation.program
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            debug!("{} output:\n{combined}", invocation.name);
            Ok(ToolOutput::passed(combined))
        } else {
            warn!("{} exited with {}", invocation.name, output.status);
            Ok(ToolOutput::failed(combined))
        }
    }
}
