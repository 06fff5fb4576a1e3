use anyhow::{Context, Result};

use super::{build_coordinator, load_config};
use crate::cli::EngineArgs;

pub fn cmd_watch(args: &EngineArgs, no_initial_run: bool, json: bool) -> Result<()> {
    let mut config = load_config(args)?;
    if no_initial_run {
        config = config.with_run_on_start(false);
    }

    let mut coordinator = build_coordinator(config, json);
    coordinator.start()?;

    let handle = coordinator
        .stop_handle()
        .context("watch session ended before it could be observed")?;
    ctrlc::set_handler(move || handle.stop()).context("failed to install Ctrl+C handler")?;

    coordinator.wait();
    Ok(())
}
