use anyhow::{Context, Result};
use sentinel::CancelToken;

use super::{build_coordinator, load_config};
use crate::cli::EngineArgs;

/// Run once; returns whether every test passed
pub fn cmd_run(args: &EngineArgs, json: bool) -> Result<bool> {
    let config = load_config(args)?;
    let coordinator = build_coordinator(config, json);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())
        .context("failed to install Ctrl+C handler")?;

    let report = coordinator.run_once(&cancel)?;
    Ok(!report.result.has_failures())
}
