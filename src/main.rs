//! sql-migrator CLI
//!
//! Entry point for the command-line tool.
//!
//! Exit codes:
//! - 0: Command completed (including "nothing to do")
//! - 1: Any surfaced error (configuration, connection, execution, validation)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sql_migrator::reconciler::Reconciler;
use sql_migrator::{Config, scaffold};

/// Default config file name used when --config is not explicitly provided.
const DEFAULT_CONFIG_FILE: &str = "sql-migrator.toml";

#[derive(Parser, Debug)]
#[command(name = "sql-migrator")]
#[command(about = "Migration ledger and reconciliation engine for PostgreSQL and MySQL", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the migrations directory and the ledger table
    Init,

    /// Apply all pending migrations, oldest first
    Up,

    /// Revert the most recently applied migration
    Down,

    /// Show executed and pending migrations
    Status,

    /// Scaffold a new migration file
    Create {
        /// Migration name; letters, digits, and underscores only
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => {
            // exit 0 is implicit
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args.config)?;

    // `create` only touches the filesystem; no connection is opened.
    if let Command::Create { name } = &args.command {
        let id = scaffold::create_unit(&config.migrations_dir, name)?;
        println!(
            "Created migration: {}",
            config.migrations_dir.join(format!("{}.sql", id)).display()
        );
        return Ok(());
    }

    let reconciler = Reconciler::connect(&config)
        .await
        .context("Failed to connect to database")?;

    // The adapter is released on every path out, success or failure.
    let result = dispatch(&reconciler, &args.command).await;
    reconciler.close().await;
    result
}

async fn dispatch(reconciler: &Reconciler, command: &Command) -> Result<()> {
    match command {
        Command::Init => {
            reconciler.init().await?;
            println!("Ledger table ready");
        }
        Command::Up => {
            let report = reconciler.up().await?;
            if report.applied.is_empty() {
                println!("Nothing to do: all {} migration(s) applied", report.skipped);
            } else {
                for id in &report.applied {
                    println!("Applied {}", id);
                }
                println!("{} migration(s) applied", report.applied.len());
            }
        }
        Command::Down => match reconciler.down().await?.reverted {
            Some(id) => println!("Reverted {}", id),
            None => println!("Nothing to rollback: ledger is empty"),
        },
        Command::Status => {
            let status = reconciler.status().await?;
            println!("Executed ({}):", status.executed.len());
            for id in &status.executed {
                println!("  [x] {}", id);
            }
            println!("Pending ({}):", status.pending.len());
            for id in &status.pending {
                println!("  [ ] {}", id);
            }
        }
        Command::Create { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}

/// Load configuration from file.
///
/// If `--config` is explicitly provided the file must exist. The default
/// path must exist too: unlike purely analytical tools there is no usable
/// default for the connection parameters.
fn load_config(config_path: &Option<PathBuf>) -> Result<Config> {
    let path = config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    Config::from_file(&path).context("Failed to load configuration")
}
