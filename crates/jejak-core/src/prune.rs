//! Retention pruner for the realization ledger.
//!
//! Old realization history has an agreed shelf life; entries past the
//! retention window are soft-deleted in a single sweep to keep the ledger
//! from growing without bound. The budget ledger has no retention policy
//! and is never pruned.
//!
//! Pruning removes historical detail but never renumbers what remains:
//! consumers must tolerate gaps in the version sequence after a sweep.
//! The sweep is idempotent — rows already soft-deleted are left alone, so
//! a restore after pruning sticks until the row ages past the cutoff again.

use crate::ledger::store::StoreError;
use rusqlite::{Connection, params};
use std::time::Duration;

/// Default retention window: one year.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Soft-delete realization entries created at or before `now - retention`.
///
/// Returns the number of entries deleted by this sweep. Safe to run
/// repeatedly; a second sweep with the same inputs deletes nothing.
///
/// # Errors
///
/// Returns [`StoreError`] if the sweep statement fails.
pub fn prune_realization(
    conn: &Connection,
    now_us: i64,
    retention: Duration,
) -> Result<usize, StoreError> {
    let retention_us = i64::try_from(retention.as_micros()).unwrap_or(i64::MAX);
    let cutoff_us = now_us.saturating_sub(retention_us);

    let deleted = conn.execute(
        "UPDATE realization_tracks
         SET deleted_at_us = ?1
         WHERE created_at_us <= ?2 AND deleted_at_us IS NULL",
        params![now_us, cutoff_us],
    )?;

    if deleted > 0 {
        tracing::info!(deleted, "pruned realization ledger entries past retention");
    }

    Ok(deleted)
}
