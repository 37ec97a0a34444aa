//! Tag and push command implementations.
//!
//! Both work outside the release sequence: `tag` marks HEAD for a version
//! that was bumped by hand, `push` sends the branch and all tags upstream.
use color_eyre::eyre::WrapErr;
use log::*;

use crate::{cli, command::common, result::Result};

/// Create an annotated tag for `version` at HEAD.
pub fn execute(
    args: &cli::Args,
    version: &str,
    message: Option<&str>,
) -> Result<()> {
    let session = common::start_session(args, true, false)?;

    let tag = session
        .orchestrator
        .tag_release(version, message)
        .wrap_err("tag step failed")?;

    info!("tagged HEAD as {tag}");
    Ok(())
}

/// Push the current branch and every local tag.
pub fn push(args: &cli::Args, dry_run: bool) -> Result<()> {
    let session = common::start_session(args, true, dry_run)?;

    session
        .orchestrator
        .push_all()
        .wrap_err("push step failed")?;

    Ok(())
}
