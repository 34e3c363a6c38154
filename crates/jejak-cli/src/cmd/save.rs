use super::LedgerArg;
use crate::output::{self, OutputMode};
use anyhow::Context;
use clap::Args;
use jejak_core::config;
use jejak_core::record::TrackedRecord;
use jejak_core::track::{RecordSource, TrackOutcome, TrackProfile, Tracker};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Ledger to record against.
    #[arg(long, value_enum)]
    pub ledger: LedgerArg,

    /// JSON file holding the record's current persisted state, line items
    /// included.
    #[arg(long)]
    pub record: PathBuf,

    /// Acting user id; omit for system-initiated saves.
    #[arg(long)]
    pub actor: Option<i64>,
}

/// Reads the record fresh from the given file on every load, the same way an
/// embedded integration re-reads its database after each save.
struct FileSource {
    path: PathBuf,
}

impl RecordSource for FileSource {
    fn load(&self, record_id: i64) -> anyhow::Result<Option<TrackedRecord>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read record file {}", self.path.display()))?;
        let record: TrackedRecord = serde_json::from_str(&content)
            .with_context(|| format!("parse record file {}", self.path.display()))?;
        Ok((record.id == record_id).then_some(record))
    }
}

#[derive(Serialize)]
struct SaveResult {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
}

impl From<&TrackOutcome> for SaveResult {
    fn from(outcome: &TrackOutcome) -> Self {
        match outcome {
            TrackOutcome::SkippedDraft => Self {
                outcome: "skipped_draft",
                version: None,
            },
            TrackOutcome::Unchanged => Self {
                outcome: "unchanged",
                version: None,
            },
            TrackOutcome::Initial { version } => Self {
                outcome: "initial",
                version: Some(*version),
            },
            TrackOutcome::Appended { version } => Self {
                outcome: "appended",
                version: Some(*version),
            },
            TrackOutcome::Merged { version } => Self {
                outcome: "merged",
                version: Some(*version),
            },
        }
    }
}

/// Notify the tracker that a record was saved.
pub fn run_save(args: &SaveArgs, mode: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let tracking = config::load_config(project_root)?;
    let mut conn = super::open_project_ledger(project_root)?;

    let profile = match args.ledger {
        LedgerArg::Budget => TrackProfile::planning(),
        LedgerArg::Realization => TrackProfile::realization(),
    }
    .with_merge_window(tracking.merge_window());

    let source = FileSource {
        path: args.record.clone(),
    };
    let record_id = peek_record_id(&source)?;

    let outcome = Tracker::new(profile)
        .on_saved(&mut conn, &source, record_id, args.actor, super::now_us())
        .context("record save event")?;

    let result = SaveResult::from(&outcome);
    output::render(mode, &result, |r, w| match r.version {
        Some(version) => writeln!(w, "{} version {version}", r.outcome),
        None => writeln!(w, "{}", r.outcome),
    })
}

/// The record id lives inside the file itself; read it once up front so the
/// tracker can re-load by id like any other source.
fn peek_record_id(source: &FileSource) -> anyhow::Result<i64> {
    let content = std::fs::read_to_string(&source.path)
        .with_context(|| format!("read record file {}", source.path.display()))?;
    let record: TrackedRecord = serde_json::from_str(&content)
        .with_context(|| format!("parse record file {}", source.path.display()))?;
    Ok(record.id)
}
