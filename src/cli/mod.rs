//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod check;
pub mod common;
pub mod order;
pub mod up;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use startgate::config::Config;

#[derive(Parser)]
#[command(name = "startgate")]
#[command(version)]
#[command(about = "Dependency-ordered service startup with health gates", long_about = None)]
struct Cli {
    /// Path to the service manifest (defaults to ./startgate.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint the manifest and check the dependency graph for cycles
    Check,
    /// Print the startup order
    Order {
        /// Print the order as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Bring every service up and print the startup status as JSON
    Up {
        /// Keep spawned services running until Ctrl-C
        #[arg(long)]
        hold: bool,
    },
    /// Show version information
    Version,
}

/// Entry point for the CLI (called from main()).
pub async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    // Respect the manifest's logging settings when it loads; fall back to
    // defaults (plus env overrides) so a broken manifest can still be linted.
    let logging_cfg = Config::load_from_path(&config_path)
        .unwrap_or_else(|_| {
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        })
        .logging;
    if let Err(e) = startgate::utils::logging::init_logging(&logging_cfg) {
        eprintln!("warning: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Check) => {
            check::cmd_check(&config_path)?;
        }
        Some(Commands::Order { json }) => {
            order::cmd_order(&config_path, json)?;
        }
        Some(Commands::Up { hold }) => {
            up::cmd_up(&config_path, hold).await?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("startgate {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dependency-ordered service startup with health gates and canary traffic ramps");
}
