//! Version reporting commands.
use color_eyre::eyre::WrapErr;

use crate::{cli, command::common, result::Result};

/// Print the manifest version.
pub fn version(args: &cli::Args, json: bool) -> Result<()> {
    let session = common::start_session(args, false, false)?;
    let version = session
        .orchestrator
        .manifest_version()
        .wrap_err("failed to read manifest version")?;

    if json {
        let json = serde_json::json!({ "version": version });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{version}");
    }

    Ok(())
}

/// Print release tags, oldest version first.
pub fn versions(args: &cli::Args, json: bool) -> Result<()> {
    let session = common::start_session(args, false, false)?;
    let tags = session
        .orchestrator
        .release_tags()
        .wrap_err("failed to list release tags")?;

    if json {
        let json = serde_json::json!(&tags);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for tag in &tags {
            println!("{}", tag.name);
        }
    }

    Ok(())
}
