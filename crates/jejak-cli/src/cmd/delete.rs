use crate::output::{self, OutputMode};
use clap::Args;
use jejak_core::ledger::store::{LedgerKind, VersionStore};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Realization-ledger entry id to soft-delete.
    pub entry_id: i64,
}

#[derive(Serialize)]
struct DeleteResult {
    entry_id: i64,
    deleted: bool,
}

/// Soft-delete one realization entry. The budget ledger keeps its history
/// forever and has no delete.
pub fn run_delete(args: &DeleteArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = super::open_project_ledger(project_root)?;
    let store = VersionStore::new(&conn, LedgerKind::Realization);

    let deleted = store.soft_delete(args.entry_id, super::now_us())?;
    if deleted {
        tracing::info!(entry_id = args.entry_id, "soft-deleted realization entry");
    }

    let result = DeleteResult {
        entry_id: args.entry_id,
        deleted,
    };
    output::render(mode, &result, |r, w| {
        if r.deleted {
            writeln!(w, "deleted entry {}", r.entry_id)
        } else {
            writeln!(w, "entry {} already deleted or missing", r.entry_id)
        }
    })
}
