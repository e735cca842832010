use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tt_cli::commands::{
    directory_for, finish, ingest, init, load_event, mark, places, results, start, status,
};
use tt_cli::{Cli, Commands, Config};
use tt_core::MemoryDirectory;
use tt_store::{EventStore, load_directory};

/// Load config and locate the event document.
fn open_store(config_path: Option<&Path>) -> Result<(EventStore, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok((EventStore::new(&config.event_path), config))
}

/// The rider directory for commands that resolve riders against an event.
fn event_directory(store: &EventStore, config: &Config) -> Result<MemoryDirectory> {
    if !store.exists() {
        return Ok(MemoryDirectory::new());
    }
    directory_for(config, &load_event(store)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays machine readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Init {
            kind,
            riders,
            force,
        }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let riders = riders.as_ref().or(config.riders_path.as_ref());
            let directory = riders
                .map(|path| {
                    load_directory(path)
                        .with_context(|| format!("failed to load riders from {}", path.display()))
                })
                .transpose()?;
            init::run(&mut out, &store, *kind, directory.as_ref(), *force)?;
        }
        Some(Commands::Ingest { idle_ms }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let directory = directory_for(&config, &load_event(&store)?)?;
            let summary = ingest::run(
                io::BufReader::new(io::stdin()),
                &mut out,
                &store,
                &directory,
                Duration::from_millis(*idle_ms),
            )?;
            eprintln!(
                "{} passings applied, {} ignored, {} malformed",
                summary.accepted, summary.ignored, summary.malformed
            );
        }
        Some(Commands::Places {
            source,
            places: list,
        }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            places::run(&mut out, &store, source, list)?;
        }
        Some(Commands::Mark { code, bibs }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            mark::run(&mut out, &store, code, bibs)?;
        }
        Some(Commands::Start { time }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            start::run(&mut out, &store, *time)?;
        }
        Some(Commands::Finish { arm }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            finish::run(&mut out, &store, *arm)?;
        }
        Some(Commands::Results { json }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let directory = event_directory(&store, &config)?;
            results::run(&mut out, &store, &directory, *json)?;
        }
        Some(Commands::Status) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let directory = event_directory(&store, &config)?;
            status::run(&mut out, &store, &directory)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
