//! Version store: the append-mostly ledger of record snapshots.
//!
//! One [`VersionStore`] wraps a connection plus a [`LedgerKind`] and exposes
//! the operations the coordinator and the history UI need: `latest`,
//! `previous_of`, `append`, `amend_latest`, `history`, and (realization
//! ledger only) `soft_delete` / `restore`.
//!
//! # Versioning invariants
//!
//! - `append` assigns `version = MAX(version) + 1` over **all** rows for the
//!   record, soft-deleted included, so a manually deleted newest entry can
//!   never cause a number to be reissued.
//! - `UNIQUE (record_id, version)` backstops concurrent appends: the loser
//!   surfaces as [`StoreError::VersionCollision`], a retryable failure.
//! - `latest` / `previous_of` / `history` see live rows only; soft-deleted
//!   entries are invisible until restored.

use crate::diff::ChangeSet;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::str::FromStr;

/// Which of the two parallel ledgers a store operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerKind {
    /// Planning-phase ledger. No soft delete.
    Budget,
    /// Realization-phase ledger. Supports soft delete/restore and pruning.
    Realization,
}

impl LedgerKind {
    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Budget => "budget_tracks",
            Self::Realization => "realization_tracks",
        }
    }

    /// Whether rows can be soft-deleted and restored.
    #[must_use]
    pub const fn supports_soft_delete(self) -> bool {
        matches!(self, Self::Realization)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Realization => "realization",
        }
    }

    /// SELECT column list; the budget table has no `deleted_at_us` column so
    /// it is projected as NULL to keep row mapping uniform.
    const fn columns(self) -> &'static str {
        match self {
            Self::Budget => {
                "id, record_id, version, snapshot, diff, action_kind, actor_id,
                 created_at_us, updated_at_us, NULL"
            }
            Self::Realization => {
                "id, record_id, version, snapshot, diff, action_kind, actor_id,
                 created_at_us, updated_at_us, deleted_at_us"
            }
        }
    }

    /// WHERE fragment that hides soft-deleted rows.
    const fn live_clause(self) -> &'static str {
        match self {
            Self::Budget => "",
            Self::Realization => " AND deleted_at_us IS NULL",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// First version of a record after it became trackable. Exactly one per
    /// record, always version 1.
    Initial,
    /// Any later version.
    Update,
}

impl ActionKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(Self::Initial),
            "UPDATE" => Ok(Self::Update),
            _ => Err(StoreError::CorruptEntry(format!(
                "unknown action kind '{s}'"
            ))),
        }
    }
}

/// One row of the track ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntry {
    pub id: i64,
    pub record_id: i64,
    pub version: u32,
    pub snapshot: Snapshot,
    /// Delta against the previous version's snapshot; `None` only for
    /// version 1.
    pub diff: Option<ChangeSet>,
    pub action_kind: ActionKind,
    /// Acting user, `None` for system-initiated saves.
    pub actor: Option<i64>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
    /// Soft-delete stamp; always `None` on the budget ledger.
    pub deleted_at_us: Option<i64>,
}

impl VersionEntry {
    /// Creation time as UTC, `None` if the stored stamp is out of range.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.created_at_us)
    }

    /// Last amendment time as UTC.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.updated_at_us)
    }
}

/// Failures raised by the version store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Two appends for the same record raced; the caller may retry the full
    /// read-decide-write sequence with fresh reads.
    #[error("version collision on record {record_id}: concurrent append lost the race")]
    VersionCollision { record_id: i64 },

    /// Amendment targeted a record with no live ledger entry.
    #[error("no ledger entry to amend for record {0}")]
    NoLatestEntry(i64),

    /// Soft delete/restore requested on the budget ledger.
    #[error("ledger '{0}' does not support soft delete")]
    SoftDeleteUnsupported(LedgerKind),

    /// A stored snapshot or diff payload failed to decode.
    #[error("corrupt ledger entry: {0}")]
    CorruptEntry(String),

    /// Underlying SQLite failure.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True for failures worth retrying with fresh reads.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionCollision { .. })
    }
}

struct RawRow {
    id: i64,
    record_id: i64,
    version: i64,
    snapshot: String,
    diff: Option<String>,
    action_kind: String,
    actor: Option<i64>,
    created_at_us: i64,
    updated_at_us: i64,
    deleted_at_us: Option<i64>,
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        record_id: row.get(1)?,
        version: row.get(2)?,
        snapshot: row.get(3)?,
        diff: row.get(4)?,
        action_kind: row.get(5)?,
        actor: row.get(6)?,
        created_at_us: row.get(7)?,
        updated_at_us: row.get(8)?,
        deleted_at_us: row.get(9)?,
    })
}

fn decode(raw: RawRow) -> Result<VersionEntry, StoreError> {
    let snapshot: Snapshot = serde_json::from_str(&raw.snapshot)
        .map_err(|e| StoreError::CorruptEntry(format!("snapshot of row {}: {e}", raw.id)))?;
    let diff: Option<ChangeSet> = raw
        .diff
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| StoreError::CorruptEntry(format!("diff of row {}: {e}", raw.id)))?;
    let version = u32::try_from(raw.version)
        .map_err(|_| StoreError::CorruptEntry(format!("negative version on row {}", raw.id)))?;

    Ok(VersionEntry {
        id: raw.id,
        record_id: raw.record_id,
        version,
        snapshot,
        diff,
        action_kind: raw.action_kind.parse()?,
        actor: raw.actor,
        created_at_us: raw.created_at_us,
        updated_at_us: raw.updated_at_us,
        deleted_at_us: raw.deleted_at_us,
    })
}

fn encode_snapshot(snapshot: &Snapshot) -> Result<String, StoreError> {
    serde_json::to_string(snapshot)
        .map_err(|e| StoreError::CorruptEntry(format!("encode snapshot: {e}")))
}

fn encode_diff(diff: Option<&ChangeSet>) -> Result<Option<String>, StoreError> {
    diff.map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::CorruptEntry(format!("encode diff: {e}")))
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Typed access to one ledger table over a borrowed connection.
///
/// The store itself is stateless; per-record serialization comes from the
/// caller running the whole read-decide-write sequence inside one
/// `BEGIN IMMEDIATE` transaction (see [`crate::track::Tracker::on_saved`]).
pub struct VersionStore<'conn> {
    conn: &'conn Connection,
    kind: LedgerKind,
}

impl<'conn> VersionStore<'conn> {
    /// Create a store over the given connection and ledger.
    #[must_use]
    pub const fn new(conn: &'conn Connection, kind: LedgerKind) -> Self {
        Self { conn, kind }
    }

    /// The ledger this store operates on.
    #[must_use]
    pub const fn kind(&self) -> LedgerKind {
        self.kind
    }

    /// Newest live entry for a record, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure or a corrupt payload.
    pub fn latest(&self, record_id: i64) -> Result<Option<VersionEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE record_id = ?1{} ORDER BY version DESC LIMIT 1",
            self.kind.columns(),
            self.kind.table(),
            self.kind.live_clause(),
        );
        self.conn
            .query_row(&sql, params![record_id], raw_row)
            .optional()?
            .map(decode)
            .transpose()
    }

    /// Live entry with the greatest version strictly below `version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure or a corrupt payload.
    pub fn previous_of(
        &self,
        record_id: i64,
        version: u32,
    ) -> Result<Option<VersionEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE record_id = ?1 AND version < ?2{}
             ORDER BY version DESC LIMIT 1",
            self.kind.columns(),
            self.kind.table(),
            self.kind.live_clause(),
        );
        self.conn
            .query_row(&sql, params![record_id, version], raw_row)
            .optional()?
            .map(decode)
            .transpose()
    }

    /// One entry by row id, soft-deleted rows included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure or a corrupt payload.
    pub fn get(&self, id: i64) -> Result<Option<VersionEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            self.kind.columns(),
            self.kind.table(),
        );
        self.conn
            .query_row(&sql, params![id], raw_row)
            .optional()?
            .map(decode)
            .transpose()
    }

    /// Append a new version, assigning the next version number atomically.
    ///
    /// The version subquery counts soft-deleted rows too; numbers are never
    /// reissued.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionCollision`] when a concurrent append for the
    /// same record wins the race; other [`StoreError`] values on I/O or
    /// encoding failure.
    pub fn append(
        &self,
        record_id: i64,
        snapshot: &Snapshot,
        diff: Option<&ChangeSet>,
        action_kind: ActionKind,
        actor: Option<i64>,
        now_us: i64,
    ) -> Result<VersionEntry, StoreError> {
        let table = self.kind.table();
        let sql = format!(
            "INSERT INTO {table}
                (record_id, version, snapshot, diff, action_kind, actor_id,
                 created_at_us, updated_at_us)
             VALUES
                (?1,
                 (SELECT COALESCE(MAX(version), 0) + 1 FROM {table} WHERE record_id = ?1),
                 ?2, ?3, ?4, ?5, ?6, ?6)
             RETURNING id, version",
        );

        let result = self.conn.query_row(
            &sql,
            params![
                record_id,
                encode_snapshot(snapshot)?,
                encode_diff(diff)?,
                action_kind.as_str(),
                actor,
                now_us,
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );

        let (id, version) = match result {
            Ok(pair) => pair,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::VersionCollision { record_id });
            }
            Err(e) => return Err(e.into()),
        };

        let version = u32::try_from(version)
            .map_err(|_| StoreError::CorruptEntry(format!("negative version on row {id}")))?;

        tracing::debug!(
            ledger = %self.kind,
            record_id,
            version,
            action = %action_kind,
            "appended ledger entry"
        );

        Ok(VersionEntry {
            id,
            record_id,
            version,
            snapshot: snapshot.clone(),
            diff: diff.cloned(),
            action_kind,
            actor,
            created_at_us: now_us,
            updated_at_us: now_us,
            deleted_at_us: None,
        })
    }

    /// Replace the newest live entry's snapshot (and diff, when given) and
    /// bump `updated_at_us`. Never touches `version`, `action_kind`, or
    /// `created_at_us`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoLatestEntry`] when the record has no live entry;
    /// other [`StoreError`] values on I/O or encoding failure.
    pub fn amend_latest(
        &self,
        record_id: i64,
        snapshot: &Snapshot,
        diff: Option<&ChangeSet>,
        now_us: i64,
    ) -> Result<(), StoreError> {
        let table = self.kind.table();
        let target = format!(
            "(SELECT id FROM {table} WHERE record_id = ?1{} ORDER BY version DESC LIMIT 1)",
            self.kind.live_clause(),
        );

        let updated = if let Some(diff) = diff {
            let sql = format!(
                "UPDATE {table}
                 SET snapshot = ?2, diff = ?3, updated_at_us = ?4
                 WHERE id = {target}",
            );
            self.conn.execute(
                &sql,
                params![
                    record_id,
                    encode_snapshot(snapshot)?,
                    encode_diff(Some(diff))?,
                    now_us,
                ],
            )?
        } else {
            let sql = format!(
                "UPDATE {table}
                 SET snapshot = ?2, updated_at_us = ?3
                 WHERE id = {target}",
            );
            self.conn
                .execute(&sql, params![record_id, encode_snapshot(snapshot)?, now_us])?
        };

        if updated == 0 {
            return Err(StoreError::NoLatestEntry(record_id));
        }

        tracing::debug!(ledger = %self.kind, record_id, "amended latest ledger entry");
        Ok(())
    }

    /// History for one record, newest version first.
    ///
    /// `include_deleted` surfaces soft-deleted rows too (realization ledger
    /// only; a no-op flag on the budget ledger). `limit` caps the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure or a corrupt payload.
    pub fn history(
        &self,
        record_id: i64,
        include_deleted: bool,
        limit: Option<usize>,
    ) -> Result<Vec<VersionEntry>, StoreError> {
        let live = if include_deleted {
            ""
        } else {
            self.kind.live_clause()
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE record_id = ?1{live} ORDER BY version DESC LIMIT ?2",
            self.kind.columns(),
            self.kind.table(),
        );
        let cap = limit.map_or(-1i64, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![record_id, cap], raw_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(decode(row?)?);
        }
        Ok(entries)
    }

    /// Soft-delete one entry. Returns `false` when the entry is missing or
    /// already deleted.
    ///
    /// # Errors
    ///
    /// [`StoreError::SoftDeleteUnsupported`] on the budget ledger; other
    /// [`StoreError`] values on I/O failure.
    pub fn soft_delete(&self, id: i64, now_us: i64) -> Result<bool, StoreError> {
        if !self.kind.supports_soft_delete() {
            return Err(StoreError::SoftDeleteUnsupported(self.kind));
        }
        let sql = format!(
            "UPDATE {} SET deleted_at_us = ?2 WHERE id = ?1 AND deleted_at_us IS NULL",
            self.kind.table(),
        );
        let updated = self.conn.execute(&sql, params![id, now_us])?;
        Ok(updated > 0)
    }

    /// Undo a soft delete. Returns `false` when the entry is missing or not
    /// deleted.
    ///
    /// # Errors
    ///
    /// [`StoreError::SoftDeleteUnsupported`] on the budget ledger; other
    /// [`StoreError`] values on I/O failure.
    pub fn restore(&self, id: i64) -> Result<bool, StoreError> {
        if !self.kind.supports_soft_delete() {
            return Err(StoreError::SoftDeleteUnsupported(self.kind));
        }
        let sql = format!(
            "UPDATE {} SET deleted_at_us = NULL WHERE id = ?1 AND deleted_at_us IS NOT NULL",
            self.kind.table(),
        );
        let updated = self.conn.execute(&sql, params![id])?;
        Ok(updated > 0)
    }
}
