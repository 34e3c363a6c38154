//! Command handlers.

pub mod delete;
pub mod history;
pub mod init;
pub mod prune;
pub mod restore;
pub mod save;
pub mod show;

use anyhow::{Context, bail};
use clap::ValueEnum;
use jejak_core::config;
use jejak_core::ledger::open_ledger;
use jejak_core::ledger::store::LedgerKind;
use rusqlite::Connection;
use std::path::Path;

/// `--ledger` flag value, shared by every command that targets one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedgerArg {
    /// Planning-phase ledger.
    Budget,
    /// Realization-phase ledger.
    Realization,
}

impl LedgerArg {
    pub const fn kind(self) -> LedgerKind {
        match self {
            Self::Budget => LedgerKind::Budget,
            Self::Realization => LedgerKind::Realization,
        }
    }
}

/// Open the project ledger, failing with a hint when the project was never
/// initialized.
pub fn open_project_ledger(project_root: &Path) -> anyhow::Result<Connection> {
    let path = config::ledger_path(project_root);
    if !path.exists() {
        bail!(
            "no ledger at {} (run `jejak init` first)",
            path.display()
        );
    }
    open_ledger(&path).with_context(|| format!("Failed to open ledger at {}", path.display()))
}

/// Wall clock in microseconds since the Unix epoch.
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
