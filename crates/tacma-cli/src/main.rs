use std::io::{Write, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tacma_core::SystemClock;
use tracing_subscriber::EnvFilter;

use tacma_cli::commands::{archive, export, priority, session, status, task};
use tacma_cli::{Cli, Commands, Config, PriorityLogAction, SessionAction, Store};

/// Load config and open the store.
fn open_store(config_path: Option<&Path>) -> Result<Store> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Store::open(&config, SystemClock)
}

/// Saves after a mutating command and reports an automatic archive.
fn save<W: Write>(writer: &mut W, store: &mut Store) -> Result<()> {
    if let Some(path) = store.save()? {
        writeln!(writer, "Archived old history to {}", path.display())?;
    }
    Ok(())
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Logs go to stderr so JSON output stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut store = open_store(cli.config.as_deref())?;
    let mut out = stdout().lock();

    let mutated = match command {
        Commands::Add {
            name,
            priority,
            comment,
        } => {
            task::add(&mut out, store.tracker_mut(), name, *priority, comment)?;
            true
        }
        Commands::Start { id } => {
            task::start(&mut out, store.tracker_mut(), *id)?;
            true
        }
        Commands::Stop => {
            task::stop(&mut out, store.tracker_mut())?;
            true
        }
        Commands::Priority { id, value } => {
            task::set_priority(&mut out, store.tracker_mut(), *id, *value)?;
            true
        }
        Commands::Rename { id, name } => {
            task::rename(&mut out, store.tracker_mut(), *id, name)?;
            true
        }
        Commands::Comment { id, text } => {
            task::comment(&mut out, store.tracker_mut(), *id, text)?;
            true
        }
        Commands::Finish { id } => {
            task::finish(&mut out, store.tracker_mut(), *id)?;
            true
        }
        Commands::Remove { id } => {
            task::remove(&mut out, store.tracker_mut(), *id)?;
            true
        }
        Commands::Status { json, at } => {
            status::run(&mut out, store.tracker(), *json, at.as_deref())?;
            false
        }
        Commands::Session(action) => match action {
            SessionAction::List { id } => {
                session::list(&mut out, store.tracker(), *id)?;
                false
            }
            SessionAction::Add { id, start, end } => {
                session::add(&mut out, store.tracker_mut(), *id, start, end)?;
                true
            }
            SessionAction::Remove { id, index } => {
                session::remove(&mut out, store.tracker_mut(), *id, *index)?;
                true
            }
            SessionAction::Set { id, times } => {
                session::set(&mut out, store.tracker_mut(), *id, times)?;
                true
            }
        },
        Commands::PriorityLog(action) => match action {
            PriorityLogAction::List { id } => {
                priority::list(&mut out, store.tracker(), *id)?;
                false
            }
            PriorityLogAction::Set { id, changes } => {
                priority::set(&mut out, store.tracker_mut(), *id, changes)?;
                true
            }
        },
        // Both save on their own.
        Commands::Archive { force } => {
            archive::archive(&mut out, &mut store, *force)?;
            false
        }
        Commands::Backup => {
            archive::backup(&mut out, &mut store)?;
            false
        }
        Commands::Export => {
            export::run(&mut out, store.tracker())?;
            false
        }
    };

    if mutated {
        save(&mut out, &mut store)?;
    }

    Ok(())
}
