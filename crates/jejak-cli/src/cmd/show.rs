use super::LedgerArg;
use crate::output::{self, OutputMode};
use anyhow::bail;
use clap::Args;
use jejak_core::ledger::store::VersionStore;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ledger to read.
    #[arg(long, value_enum)]
    pub ledger: LedgerArg,

    /// Ledger entry id (see `jejak history`).
    pub entry_id: i64,
}

#[derive(Serialize)]
struct ShowResult {
    entry_id: i64,
    record_id: i64,
    version: u32,
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<i64>,
    created_at: Option<String>,
    updated_at: Option<String>,
    deleted: bool,
    snapshot: Value,
    diff: Option<Value>,
}

/// Show one ledger entry in full: snapshot and diff included.
pub fn run_show(args: &ShowArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = super::open_project_ledger(project_root)?;
    let store = VersionStore::new(&conn, args.ledger.kind());

    let Some(entry) = store.get(args.entry_id)? else {
        bail!("no entry {} in the {} ledger", args.entry_id, args.ledger.kind());
    };

    let result = ShowResult {
        entry_id: entry.id,
        record_id: entry.record_id,
        version: entry.version,
        action: entry.action_kind.to_string(),
        actor: entry.actor,
        created_at: entry.created_at().map(|t| t.to_rfc3339()),
        updated_at: entry.updated_at().map(|t| t.to_rfc3339()),
        deleted: entry.deleted_at_us.is_some(),
        snapshot: serde_json::to_value(&entry.snapshot)?,
        diff: entry.diff.as_ref().map(serde_json::to_value).transpose()?,
    };

    output::render(mode, &result, |r, w| {
        output::kv(w, "entry", r.entry_id.to_string())?;
        output::kv(w, "record", r.record_id.to_string())?;
        output::kv(w, "version", r.version.to_string())?;
        output::kv(w, "action", &r.action)?;
        output::kv(
            w,
            "actor",
            r.actor
                .map_or_else(|| "system".to_string(), |id| format!("user {id}")),
        )?;
        output::kv(w, "created", r.created_at.as_deref().unwrap_or("-"))?;
        output::kv(w, "updated", r.updated_at.as_deref().unwrap_or("-"))?;
        if r.deleted {
            output::kv(w, "deleted", "yes")?;
        }
        match &r.diff {
            Some(diff) => {
                writeln!(w, "changes:")?;
                let pretty =
                    serde_json::to_string_pretty(diff).map_err(std::io::Error::other)?;
                writeln!(w, "{pretty}")
            }
            None => writeln!(w, "changes: none (first version)"),
        }
    })
}
