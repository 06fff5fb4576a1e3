//! Subcommand handlers

pub mod run;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sentinel::config::{self, EngineConfig};
use sentinel::{
    ConsoleResultSink, ExecutionScheduler, GoTestCommand, JsonResultSink, ResultCache,
    ResultSink, SchedulerOptions, SnapshotStore, WatchCoordinator,
};

use crate::cli::EngineArgs;

/// Load the layered config for `args.root` and apply command-line flags on top
pub fn load_config(args: &EngineArgs) -> Result<EngineConfig> {
    let (mut config, warnings) = config::load_or_default(&args.root)?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrency(concurrency.max(1));
    }
    if let Some(mode) = args.mode {
        config = config.with_watch_mode(mode);
    }
    if let Some(ms) = args.timeout_ms {
        let timeout = (ms > 0).then(|| Duration::from_millis(ms));
        config = config.with_test_timeout(timeout);
    }
    if args.no_cache {
        config = config.with_cache_path(None);
    }
    Ok(config)
}

/// Wire the engine together for a resolved config
pub fn build_coordinator(config: EngineConfig, json: bool) -> WatchCoordinator {
    let cache = match config.cache_file() {
        Some(path) => SnapshotStore::new(path).load(),
        None => ResultCache::new(),
    };

    let command = Arc::new(GoTestCommand::from_config(&config));
    let options = SchedulerOptions::default()
        .with_test_timeout(config.test_timeout)
        .with_context_lines(config.context_lines);
    let scheduler = ExecutionScheduler::new(command, options);

    let sink: Arc<dyn ResultSink> = if json {
        Arc::new(JsonResultSink::stdout())
    } else {
        Arc::new(ConsoleResultSink::stdout())
    };

    WatchCoordinator::new(config, Arc::new(cache), Arc::new(scheduler), sink)
}
