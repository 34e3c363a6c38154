//! Tracking coordinator.
//!
//! [`Tracker::on_saved`] is the single entry point the host application
//! calls after persisting a record (or one of its line items). It decides,
//! per save, between four outcomes:
//!
//! - **skip** — the record is still a draft, or nothing meaningful changed
//! - **initial** — first eligible save: version 1, no diff
//! - **merge** — the save lands inside the debounce window of the previous
//!   entry by the same actor; the latest entry is amended in place and its
//!   diff recomputed against the pre-burst baseline
//! - **append** — a new version with a diff against the previous snapshot
//!
//! # The merge window
//!
//! The host persists a parent aggregate and its child items as separate
//! saves that are not atomic from this engine's point of view, so one user
//! edit arrives here as two or three rapid calls. Saves by the same actor
//! within [`DEFAULT_MERGE_WINDOW`] of the latest entry's creation fold into
//! that entry instead of creating near-duplicate versions. This is a
//! compatibility heuristic, not a guarantee: two genuinely separate rapid
//! edits by one user collapse into one version, and a save delayed past the
//! window splits into two. A host that batches parent and child writes into
//! one transaction could call `on_saved` once per logical edit and drop the
//! window to zero.
//!
//! Bursts longer than two saves keep folding into whatever is currently
//! latest; the window is measured from the latest entry's `created_at_us`,
//! so a burst cannot extend itself indefinitely.
//!
//! # Concurrency
//!
//! The whole read-decide-write sequence runs inside one `BEGIN IMMEDIATE`
//! transaction, serializing concurrent saves of the same record. The
//! `UNIQUE (record_id, version)` constraint backstops anything that slips
//! past (e.g. two processes on one ledger file) as a retryable
//! [`StoreError::VersionCollision`].

use crate::diff::{self, TrackedField};
use crate::ledger::store::{ActionKind, LedgerKind, StoreError, VersionStore};
use crate::record::{RecordError, TrackedRecord};
use crate::snapshot::Snapshot;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Duration;

/// Debounce window for folding cascaded saves into one version.
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_secs(2);

const PLANNING_FIELDS: &[TrackedField] = &[
    TrackedField::numeric("income_amount"),
    TrackedField::numeric("income_percentage"),
    TrackedField::numeric("income_fixed"),
    TrackedField::numeric("income_bos"),
    TrackedField::numeric("income_total"),
    TrackedField::numeric("total_expense"),
    TrackedField::numeric("total_realization"),
    TrackedField::numeric("total_balance"),
    TrackedField::text("record_name"),
    TrackedField::text("record_date"),
];

const REALIZATION_FIELDS: &[TrackedField] = &[
    TrackedField::numeric("income_amount"),
    TrackedField::numeric("income_percentage"),
    TrackedField::numeric("income_fixed"),
    TrackedField::numeric("income_bos"),
    TrackedField::numeric("income_total"),
    TrackedField::numeric("total_expense"),
    TrackedField::numeric("total_realization"),
    TrackedField::numeric("total_balance"),
    TrackedField::text("record_name"),
    TrackedField::text("record_date"),
    TrackedField::text("status_realization"),
];

/// Everything that distinguishes one tracking instance from the other:
/// which ledger it writes, which header fields are meaningful, and how wide
/// the merge window is.
#[derive(Debug, Clone, Copy)]
pub struct TrackProfile {
    pub kind: LedgerKind,
    pub tracked_fields: &'static [TrackedField],
    pub merge_window: Duration,
}

impl TrackProfile {
    /// Planning-phase profile over the budget ledger.
    #[must_use]
    pub const fn planning() -> Self {
        Self {
            kind: LedgerKind::Budget,
            tracked_fields: PLANNING_FIELDS,
            merge_window: DEFAULT_MERGE_WINDOW,
        }
    }

    /// Realization-phase profile; also tracks the realization status flag.
    #[must_use]
    pub const fn realization() -> Self {
        Self {
            kind: LedgerKind::Realization,
            tracked_fields: REALIZATION_FIELDS,
            merge_window: DEFAULT_MERGE_WINDOW,
        }
    }

    /// Same profile with a different merge window.
    #[must_use]
    pub const fn with_merge_window(mut self, window: Duration) -> Self {
        self.merge_window = window;
        self
    }
}

/// Fresh-read seam into the host's source of truth.
///
/// `on_saved` never trusts the aggregate the host had in memory: mid-cascade
/// it is stale (parent totals saved, child items not yet, or vice versa).
/// Implementations must re-read the record, line items included.
pub trait RecordSource {
    /// Load the record's current persisted state, `None` if it no longer
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the source of truth cannot be read.
    fn load(&self, record_id: i64) -> anyhow::Result<Option<TrackedRecord>>;
}

/// What `on_saved` decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Record is in draft status; drafts are invisible to tracking.
    SkippedDraft,
    /// Nothing meaningful changed; no entry written or amended.
    Unchanged,
    /// First eligible save; version 1 appended with no diff.
    Initial { version: u32 },
    /// New version appended with a diff against the previous snapshot.
    Appended { version: u32 },
    /// Latest entry amended in place under the merge window.
    Merged { version: u32 },
}

/// Failures raised by the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The record vanished between the host's save and our reload.
    #[error("record {0} not found in source of truth")]
    RecordMissing(i64),

    /// The reloaded record fails snapshot invariants; nothing was written.
    #[error("record rejected by snapshot validation: {0}")]
    InvalidRecord(#[from] RecordError),

    /// Reading the source of truth failed.
    #[error("source of truth read failed: {0}")]
    Source(#[source] anyhow::Error),

    /// Ledger read/write failed. [`StoreError::is_retryable`] distinguishes
    /// collision races from hard failures.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stateless orchestrator for one tracking profile.
#[derive(Debug, Clone, Copy)]
pub struct Tracker {
    profile: TrackProfile,
}

impl Tracker {
    /// Build a tracker for the given profile.
    #[must_use]
    pub const fn new(profile: TrackProfile) -> Self {
        Self { profile }
    }

    /// The profile this tracker runs.
    #[must_use]
    pub const fn profile(&self) -> &TrackProfile {
        &self.profile
    }

    /// React to a completed host save of `record_id`.
    ///
    /// `actor` is the user who caused the save (`None` for system saves);
    /// it is passed explicitly rather than read from ambient auth state.
    /// `now_us` is the wall clock in microseconds.
    ///
    /// At most one ledger write happens per call, inside a single immediate
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError`] when the reload, validation, or ledger access
    /// fails. A failure never leaves a partial entry behind. Whether a
    /// tracking failure aborts the host's own save is the integration
    /// layer's policy; this engine only reports honestly.
    pub fn on_saved(
        &self,
        conn: &mut Connection,
        source: &dyn RecordSource,
        record_id: i64,
        actor: Option<i64>,
        now_us: i64,
    ) -> Result<TrackOutcome, TrackError> {
        let record = source
            .load(record_id)
            .map_err(TrackError::Source)?
            .ok_or(TrackError::RecordMissing(record_id))?;

        if !record.status.is_final() {
            tracing::debug!(record_id, "skipping draft record");
            return Ok(TrackOutcome::SkippedDraft);
        }

        record.validate()?;
        let new_snapshot = Snapshot::capture(&record);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let outcome = {
            let store = VersionStore::new(&tx, self.profile.kind);
            self.decide(&store, record_id, &new_snapshot, actor, now_us)?
        };
        tx.commit().map_err(StoreError::from)?;

        match &outcome {
            TrackOutcome::Initial { version } | TrackOutcome::Appended { version } => {
                tracing::info!(
                    ledger = %self.profile.kind,
                    record_id,
                    version,
                    actor,
                    "recorded new version"
                );
            }
            TrackOutcome::Merged { version } => {
                tracing::debug!(
                    ledger = %self.profile.kind,
                    record_id,
                    version,
                    "merged save into latest version"
                );
            }
            TrackOutcome::SkippedDraft | TrackOutcome::Unchanged => {}
        }

        Ok(outcome)
    }

    fn decide(
        &self,
        store: &VersionStore<'_>,
        record_id: i64,
        new_snapshot: &Snapshot,
        actor: Option<i64>,
        now_us: i64,
    ) -> Result<TrackOutcome, TrackError> {
        let Some(last) = store.latest(record_id)? else {
            let entry = store.append(
                record_id,
                new_snapshot,
                None,
                ActionKind::Initial,
                actor,
                now_us,
            )?;
            return Ok(TrackOutcome::Initial {
                version: entry.version,
            });
        };

        let window_us = i64::try_from(self.profile.merge_window.as_micros()).unwrap_or(i64::MAX);
        let in_window = now_us - last.created_at_us < window_us;
        let same_actor = last.actor == actor;

        if in_window && same_actor {
            match last.action_kind {
                ActionKind::Initial => {
                    // Still inside the first logical save burst: refresh the
                    // snapshot, keep diff NULL and the INITIAL classification.
                    store.amend_latest(record_id, new_snapshot, None, now_us)?;
                    return Ok(TrackOutcome::Merged {
                        version: last.version,
                    });
                }
                ActionKind::Update => {
                    if let Some(baseline) = store.previous_of(record_id, last.version)? {
                        let merged =
                            diff::diff(&baseline.snapshot, new_snapshot, self.profile.tracked_fields);
                        store.amend_latest(record_id, new_snapshot, Some(&merged), now_us)?;
                        return Ok(TrackOutcome::Merged {
                            version: last.version,
                        });
                    }
                    // No baseline below an UPDATE entry (pruned away, or
                    // history was hand-edited): treat as a normal update.
                }
            }
        }

        let changes = diff::diff(&last.snapshot, new_snapshot, self.profile.tracked_fields);
        if changes.is_empty() {
            tracing::debug!(
                ledger = %self.profile.kind,
                record_id,
                "no meaningful change; suppressing version"
            );
            return Ok(TrackOutcome::Unchanged);
        }

        let entry = store.append(
            record_id,
            new_snapshot,
            Some(&changes),
            ActionKind::Update,
            actor,
            now_us,
        )?;
        Ok(TrackOutcome::Appended {
            version: entry.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::open_in_memory;
    use crate::record::{LineItem, RecordStatus};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    /// In-memory stand-in for the host's database.
    struct MemorySource {
        records: BTreeMap<i64, TrackedRecord>,
    }

    impl MemorySource {
        fn with(record: TrackedRecord) -> Self {
            let mut records = BTreeMap::new();
            records.insert(record.id, record);
            Self { records }
        }
    }

    impl RecordSource for MemorySource {
        fn load(&self, record_id: i64) -> anyhow::Result<Option<TrackedRecord>> {
            Ok(self.records.get(&record_id).cloned())
        }
    }

    fn record(status: RecordStatus) -> TrackedRecord {
        TrackedRecord {
            id: 1,
            record_name: "Anggaran Januari".to_string(),
            record_date: NaiveDate::from_ymd_opt(2026, 1, 31).expect("valid date"),
            month: 1,
            income_amount: 1_000_000.0,
            income_percentage: 10.0,
            income_fixed: 0.0,
            income_bos: 0.0,
            income_total: 1_000_000.0,
            total_expense: 0.0,
            total_realization: 0.0,
            total_balance: 1_000_000.0,
            status,
            status_realization: false,
            items: vec![],
        }
    }

    const SEC: i64 = 1_000_000;

    #[test]
    fn draft_records_are_invisible() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());
        let source = MemorySource::with(record(RecordStatus::Draft));

        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("on_saved");
        assert_eq!(outcome, TrackOutcome::SkippedDraft);

        let store = VersionStore::new(&conn, LedgerKind::Budget);
        assert!(store.latest(1).expect("latest").is_none());
    }

    #[test]
    fn first_eligible_save_is_initial_version_one() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());
        let source = MemorySource::with(record(RecordStatus::Final));

        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("on_saved");
        assert_eq!(outcome, TrackOutcome::Initial { version: 1 });

        let store = VersionStore::new(&conn, LedgerKind::Budget);
        let entry = store.latest(1).expect("latest").expect("some");
        assert_eq!(entry.action_kind, ActionKind::Initial);
        assert!(entry.diff.is_none());
    }

    #[test]
    fn missing_record_is_an_error() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());
        let source = MemorySource {
            records: BTreeMap::new(),
        };

        let err = tracker
            .on_saved(&mut conn, &source, 7, None, 0)
            .expect_err("missing record");
        assert!(matches!(err, TrackError::RecordMissing(7)));
    }

    #[test]
    fn invalid_record_writes_nothing() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());

        let mut bad = record(RecordStatus::Final);
        bad.items = vec![
            LineItem {
                id: 3,
                description: "A".to_string(),
                source_tag: "Mandiri".to_string(),
                amount: 1.0,
            },
            LineItem {
                id: 3,
                description: "B".to_string(),
                source_tag: "BOS".to_string(),
                amount: 2.0,
            },
        ];
        let source = MemorySource::with(bad);

        let err = tracker
            .on_saved(&mut conn, &source, 1, None, 0)
            .expect_err("invalid record");
        assert!(matches!(err, TrackError::InvalidRecord(_)));

        let store = VersionStore::new(&conn, LedgerKind::Budget);
        assert!(store.latest(1).expect("latest").is_none());
    }

    #[test]
    fn merge_into_initial_keeps_initial_and_null_diff() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());

        let mut source = MemorySource::with(record(RecordStatus::Final));
        tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("initial");

        // Child line-item save lands half a second later with new totals.
        let updated = source.records.get_mut(&1).expect("record");
        updated.total_expense = 500.0;
        updated.items = vec![LineItem {
            id: 7,
            description: "Books".to_string(),
            source_tag: "Mandiri".to_string(),
            amount: 500.0,
        }];

        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(9), SEC / 2)
            .expect("merge");
        assert_eq!(outcome, TrackOutcome::Merged { version: 1 });

        let store = VersionStore::new(&conn, LedgerKind::Budget);
        let entry = store.latest(1).expect("latest").expect("some");
        assert_eq!(entry.version, 1);
        assert_eq!(entry.action_kind, ActionKind::Initial);
        assert!(entry.diff.is_none());
        assert_eq!(entry.snapshot.items.len(), 1);
        assert_eq!(store.history(1, false, None).expect("history").len(), 1);
    }

    #[test]
    fn different_actor_never_merges() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());

        let mut source = MemorySource::with(record(RecordStatus::Final));
        tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("initial");

        source.records.get_mut(&1).expect("record").income_amount = 2_000_000.0;
        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(10), SEC / 2)
            .expect("save");
        assert_eq!(outcome, TrackOutcome::Appended { version: 2 });
    }

    #[test]
    fn none_actor_matches_none_actor_for_merge() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());

        let mut source = MemorySource::with(record(RecordStatus::Final));
        tracker
            .on_saved(&mut conn, &source, 1, None, 0)
            .expect("initial");

        source.records.get_mut(&1).expect("record").income_amount = 2_000_000.0;
        let outcome = tracker
            .on_saved(&mut conn, &source, 1, None, SEC / 2)
            .expect("save");
        assert_eq!(outcome, TrackOutcome::Merged { version: 1 });
    }

    #[test]
    fn realization_profile_tracks_status_flag() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::realization());

        let mut source = MemorySource::with(record(RecordStatus::Final));
        tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("initial");

        source
            .records
            .get_mut(&1)
            .expect("record")
            .status_realization = true;
        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(9), 10 * SEC)
            .expect("save");
        assert_eq!(outcome, TrackOutcome::Appended { version: 2 });

        let store = VersionStore::new(&conn, LedgerKind::Realization);
        let entry = store.latest(1).expect("latest").expect("some");
        let diff = entry.diff.expect("diff");
        assert!(diff.get("field_status_realization").is_some());
    }

    #[test]
    fn planning_profile_ignores_status_flag() {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());

        let mut source = MemorySource::with(record(RecordStatus::Final));
        tracker
            .on_saved(&mut conn, &source, 1, Some(9), 0)
            .expect("initial");

        source
            .records
            .get_mut(&1)
            .expect("record")
            .status_realization = true;
        let outcome = tracker
            .on_saved(&mut conn, &source, 1, Some(9), 10 * SEC)
            .expect("save");
        assert_eq!(outcome, TrackOutcome::Unchanged);
    }
}
