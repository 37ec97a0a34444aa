//! Common functionality shared between commands
use color_eyre::eyre::WrapErr;
use log::*;

use crate::{
    cli,
    collaborator::CommandRunner,
    config::Config,
    lock::ReleaseLock,
    orchestrator::Orchestrator,
    repo::{Repository, discover_workdir},
    result::Result,
};

/// An orchestrator for the target repository, plus the release lock when
/// the command mutates the repository.
pub struct Session {
    pub orchestrator: Orchestrator,
    // dropped after the orchestrator, releasing the lock last
    _lock: Option<ReleaseLock>,
}

/// Load configuration for the repository selected by `--repo`.
pub fn load_configuration(args: &cli::Args) -> Result<(Repository, Config)> {
    let workdir = discover_workdir(&args.repo).wrap_err_with(|| {
        format!("no git repository at {}", args.repo.display())
    })?;

    let config_path = args.config_path(&workdir);
    let config = Config::load(&config_path).wrap_err_with(|| {
        format!("failed to load config from {}", config_path.display())
    })?;

    let repo = Repository::open(&workdir, &config.git)?;

    Ok((repo, config))
}

/// Open the repository and build an orchestrator running real processes.
///
/// With `lock` set, the release lock is held for the lifetime of the
/// returned session.
pub fn start_session(
    args: &cli::Args,
    lock: bool,
    dry_run: bool,
) -> Result<Session> {
    let (repo, config) = load_configuration(args)?;

    let lock = if lock {
        Some(ReleaseLock::acquire(&repo.git_dir())?)
    } else {
        None
    };

    if dry_run {
        warn!("dry run: nothing will be written, committed, pushed or uploaded");
    }

    let orchestrator =
        Orchestrator::new(repo, config, Box::new(CommandRunner))
            .with_dry_run(dry_run);

    Ok(Session {
        orchestrator,
        _lock: lock,
    })
}
