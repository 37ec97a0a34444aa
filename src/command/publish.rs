//! Publish command implementation.
use color_eyre::eyre::WrapErr;
use log::*;

use crate::{
    cli, command::common, orchestrator::Orchestrator, result::Result,
};

/// Validate, then build and upload the manifest version, which must already
/// be tagged at HEAD and pushed.
pub fn execute(args: &cli::Args, target: &str, dry_run: bool) -> Result<()> {
    let mut session = common::start_session(args, true, dry_run)?;
    let orchestrator = &mut session.orchestrator;

    orchestrator.validate().wrap_err("validate step failed")?;

    let release = orchestrator
        .reconcile_pushed()
        .wrap_err("publish step failed")?;
    info!("publishing {}", release.tag);

    build_and_upload(orchestrator, target)
}

/// Build artifacts for a pushed release and upload them to `target`.
pub fn build_and_upload(
    orchestrator: &mut Orchestrator,
    target: &str,
) -> Result<()> {
    let artifacts = orchestrator.build().wrap_err("build step failed")?;

    for path in &artifacts.paths {
        debug!("artifact: {}", path.display());
    }

    orchestrator
        .publish(&artifacts, target)
        .wrap_err_with(|| format!("publish step to {target} failed"))?;

    Ok(())
}
