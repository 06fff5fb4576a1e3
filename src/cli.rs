use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sentinel::WatchMode;

/// Sentinel - incremental watch-mode test runner for Go projects
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit NDJSON events instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the project and rerun affected tests on every change
    Watch {
        #[command(flatten)]
        engine: EngineArgs,

        /// Skip the initial full run
        #[arg(long)]
        no_initial_run: bool,
    },

    /// Run every test once (served from the cache where possible) and exit
    Run {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Options shared by `watch` and `run`
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Project root containing go.mod
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Maximum number of concurrent `go test` processes
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Test selection mode (all, package, related)
    #[arg(long)]
    pub mode: Option<WatchMode>,

    /// Per-invocation timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Do not read or write the result snapshot
    #[arg(long)]
    pub no_cache: bool,
}
