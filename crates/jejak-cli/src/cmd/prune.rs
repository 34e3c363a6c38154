use crate::output::{self, OutputMode};
use clap::Args;
use jejak_core::config;
use jejak_core::prune::prune_realization;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Override the configured retention window, in days.
    #[arg(long)]
    pub retention_days: Option<u64>,
}

#[derive(Serialize)]
struct PruneResult {
    retention_days: u64,
    pruned: usize,
}

/// Sweep realization entries past the retention window.
pub fn run_prune(args: &PruneArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let tracking = config::load_config(project_root)?;
    let conn = super::open_project_ledger(project_root)?;

    let retention_days = args.retention_days.unwrap_or(tracking.retention_days);
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let pruned = prune_realization(&conn, super::now_us(), retention)?;

    let result = PruneResult {
        retention_days,
        pruned,
    };
    output::render(mode, &result, |r, w| {
        writeln!(
            w,
            "pruned {} realization entries older than {} days",
            r.pruned, r.retention_days
        )
    })
}
