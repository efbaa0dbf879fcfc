use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slouch_cli::commands::{report, reset, run};
use slouch_cli::{Cli, Commands, Config};
use slouch_store::SqliteStore;

/// Load config, ensuring the database's parent directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Run { activity }) => {
            let config = load_config(cli.config.as_deref())?;
            let _lock = run::SessionLock::acquire(&config.database_path)?;
            let store = open_store(&config)?;
            run::run(store, &config, *activity)?;
        }
        Some(Commands::Report { json }) => {
            let store = open_store(&load_config(cli.config.as_deref())?)?;
            report::run(&mut std::io::stdout().lock(), &store, *json)?;
        }
        Some(Commands::Reset { yes }) => {
            let config = load_config(cli.config.as_deref())?;
            // A running session would write its record back over the reset
            let _lock = run::SessionLock::acquire(&config.database_path)?;
            let mut store = open_store(&config)?;
            reset::run(&mut std::io::stdout().lock(), &mut store, *yes)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
