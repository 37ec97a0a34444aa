//! Release command implementation.
use color_eyre::eyre::WrapErr;
use log::*;

use crate::{
    cli,
    command::{common, publish},
    result::Result,
};

/// Options for a single `release` invocation.
#[derive(Debug, Default)]
pub struct ReleaseOptions<'a> {
    pub allow_dirty: bool,
    pub message: Option<&'a str>,
    pub publish: Option<&'a str>,
    pub dry_run: bool,
}

/// Bump the manifest to `version`, validate, commit, tag and push, then
/// optionally build and publish.
///
/// Stops at the first failing step. Nothing after it runs, and nothing
/// before it is undone.
pub fn execute(
    args: &cli::Args,
    version: &str,
    options: ReleaseOptions<'_>,
) -> Result<()> {
    let mut session = common::start_session(args, true, options.dry_run)?;
    let orchestrator = &mut session.orchestrator;

    // unknown targets fail before anything is committed
    if let Some(target) = options.publish {
        orchestrator
            .config()
            .target(target)
            .wrap_err("release step failed")?;
    }

    let release = orchestrator
        .prepare_release(version, options.allow_dirty)
        .wrap_err("prepare step failed")?;
    info!("releasing {} as {}", release.version, release.tag);

    orchestrator.validate().wrap_err("validate step failed")?;

    orchestrator
        .commit_and_tag(options.message)
        .wrap_err("commit and tag step failed")?;

    orchestrator.push().wrap_err("push step failed")?;

    if let Some(target) = options.publish {
        publish::build_and_upload(orchestrator, target)?;
    }

    info!("release {version} complete: {}", orchestrator.state());
    Ok(())
}
