//! Sentinel CLI - incremental watch-mode test runner for Go projects
//!
//! Usage: sentinel <COMMAND>
//!
//! Commands:
//!   watch   Watch the project and rerun affected tests on change
//!   run     Run every test once and exit

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Watch {
            engine,
            no_initial_run,
        } => commands::watch::cmd_watch(&engine, no_initial_run, cli.json),
        Commands::Run { engine } => {
            if !commands::run::cmd_run(&engine, cli.json)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise each `-v` raises the level by one step
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentinel={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
