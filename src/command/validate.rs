//! Validate command implementation.
use color_eyre::eyre::WrapErr;
use log::*;

use crate::{cli, command::common, result::Result};

/// Run every configured check against the working tree.
pub fn execute(args: &cli::Args) -> Result<()> {
    let mut session = common::start_session(args, false, false)?;

    session
        .orchestrator
        .validate()
        .wrap_err("validate step failed")?;

    info!("all validation steps passed");
    Ok(())
}
