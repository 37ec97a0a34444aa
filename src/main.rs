use clap::Parser;

use tagsmith::{
    cli::{Args, Command},
    command::{self, release::ReleaseOptions},
    result::Result,
};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("tagsmith")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    match &cli_args.command {
        Command::Validate => command::validate::execute(&cli_args),
        Command::Tag { version, message } => {
            command::tag::execute(&cli_args, version, message.as_deref())
        }
        Command::Push { dry_run } => command::tag::push(&cli_args, *dry_run),
        Command::Release {
            version,
            allow_dirty,
            message,
            publish,
            dry_run,
        } => command::release::execute(
            &cli_args,
            version,
            ReleaseOptions {
                allow_dirty: *allow_dirty,
                message: message.as_deref(),
                publish: publish.as_deref(),
                dry_run: *dry_run,
            },
        ),
        Command::Publish { target, dry_run } => {
            command::publish::execute(&cli_args, target, *dry_run)
        }
        Command::Version { json } => command::show::version(&cli_args, *json),
        Command::Versions { json } => {
            command::show::versions(&cli_args, *json)
        }
    }
}
