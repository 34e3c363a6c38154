use crate::output::{self, OutputMode};
use clap::Args;
use jejak_core::ledger::store::{LedgerKind, VersionStore};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Realization-ledger entry id to restore.
    pub entry_id: i64,
}

#[derive(Serialize)]
struct RestoreResult {
    entry_id: i64,
    restored: bool,
}

/// Undo a soft delete on one realization entry.
pub fn run_restore(args: &RestoreArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = super::open_project_ledger(project_root)?;
    let store = VersionStore::new(&conn, LedgerKind::Realization);

    let restored = store.restore(args.entry_id)?;
    if restored {
        tracing::info!(entry_id = args.entry_id, "restored realization entry");
    }

    let result = RestoreResult {
        entry_id: args.entry_id,
        restored,
    };
    output::render(mode, &result, |r, w| {
        if r.restored {
            writeln!(w, "restored entry {}", r.entry_id)
        } else {
            writeln!(w, "entry {} is not deleted", r.entry_id)
        }
    })
}
