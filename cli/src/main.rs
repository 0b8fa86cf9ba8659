//! drizzle-liquibase - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use drizzle_liquibase::config::CONFIG_FILE;
use drizzle_liquibase_cli::commands::{self, generate::GenerateOptions};
use drizzle_liquibase_cli::output;

/// Generate Liquibase changelogs from drizzle schema snapshots
#[derive(Parser, Debug)]
#[command(name = "drizzle-liquibase")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: drizzle-liquibase.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a default drizzle-liquibase.toml
    Init {
        /// Changeset author (default: $USER)
        #[arg(short, long, env = "DRIZZLE_LIQUIBASE_AUTHOR")]
        author: Option<String>,
    },

    /// Validate the configuration file and show resolved settings
    Check,

    /// Write a migration for the changes since the last one
    Generate {
        /// Current schema snapshot (default: <schemaDir>/<schemaIndexFile>)
        #[arg(short, long, value_name = "PATH")]
        snapshot: Option<PathBuf>,

        /// Print the changelog without writing any file
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", output::err_line(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    match cli.command {
        Command::Init { author } => commands::init::run(&config_path, author.as_deref())?,
        Command::Check => commands::check::run(&commands::load_config(&config_path)?),
        Command::Generate { snapshot, dry_run } => {
            let config = commands::load_config(&config_path)?;
            commands::generate::run(&config, GenerateOptions { snapshot, dry_run })?;
        }
    }
    Ok(())
}
