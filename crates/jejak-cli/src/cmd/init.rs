use crate::output::{self, OutputMode};
use anyhow::Context;
use clap::Args;
use jejak_core::config;
use jejak_core::ledger::open_ledger;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Serialize)]
struct InitResult {
    ledger: String,
    config: String,
    created: bool,
}

/// Create the project directory, ledger, and default config.
///
/// Idempotent: re-running against an existing project migrates the ledger
/// forward and leaves the config untouched.
pub fn run_init(_args: &InitArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let ledger_path = config::ledger_path(project_root);
    let config_path = config::config_path(project_root);
    let created = !ledger_path.exists();

    open_ledger(&ledger_path)
        .with_context(|| format!("Failed to initialize ledger at {}", ledger_path.display()))?;

    if !config_path.exists() {
        config::write_config(project_root, &config::TrackingConfig::default())?;
    }

    tracing::info!(ledger = %ledger_path.display(), created, "project initialized");

    let result = InitResult {
        ledger: ledger_path.display().to_string(),
        config: config_path.display().to_string(),
        created,
    };
    output::render(mode, &result, |r, w| {
        if r.created {
            writeln!(w, "Initialized ledger at {}", r.ledger)
        } else {
            writeln!(w, "Ledger already present at {}", r.ledger)
        }
    })
}
