use super::LedgerArg;
use crate::output::{self, OutputMode};
use clap::Args;
use jejak_core::ledger::store::{VersionEntry, VersionStore};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Ledger to read.
    #[arg(long, value_enum)]
    pub ledger: LedgerArg,

    /// Record whose history to list.
    pub record_id: i64,

    /// Maximum number of entries, newest first.
    #[arg(long, default_value_t = 5)]
    pub limit: usize,

    /// List the full history instead of the newest entries.
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    /// Include soft-deleted entries (realization ledger only).
    #[arg(long)]
    pub show_deleted: bool,
}

#[derive(Serialize)]
struct HistoryRow {
    entry_id: i64,
    version: u32,
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<i64>,
    created_at: Option<String>,
    changes: usize,
    deleted: bool,
    diff: Option<Value>,
}

impl HistoryRow {
    fn from_entry(entry: &VersionEntry) -> anyhow::Result<Self> {
        let diff = entry
            .diff
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        Ok(Self {
            entry_id: entry.id,
            version: entry.version,
            action: entry.action_kind.to_string(),
            actor: entry.actor,
            created_at: entry.created_at().map(|t| t.to_rfc3339()),
            changes: entry.diff.as_ref().map_or(0, jejak_core::diff::ChangeSet::len),
            deleted: entry.deleted_at_us.is_some(),
            diff,
        })
    }
}

/// List a record's versions, newest first.
pub fn run_history(args: &HistoryArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = super::open_project_ledger(project_root)?;
    let store = VersionStore::new(&conn, args.ledger.kind());

    let limit = if args.all { None } else { Some(args.limit) };
    let entries = store.history(args.record_id, args.show_deleted, limit)?;

    let rows = entries
        .iter()
        .map(HistoryRow::from_entry)
        .collect::<anyhow::Result<Vec<_>>>()?;

    output::render(mode, &rows, |rows, w| {
        if rows.is_empty() {
            return writeln!(w, "no history");
        }
        for row in rows {
            let actor = row
                .actor
                .map_or_else(|| "system".to_string(), |id| format!("user {id}"));
            let when = row.created_at.as_deref().unwrap_or("-");
            let marker = if row.deleted { " (deleted)" } else { "" };
            writeln!(
                w,
                "v{:<4} {:<8} {:<12} {} changes  {}{}",
                row.version, row.action, actor, row.changes, when, marker
            )?;
        }
        Ok(())
    })
}
