//! Canonical SQLite schema for the track ledger.
//!
//! Two structurally parallel tables, one per tracking phase:
//! - `budget_tracks` — planning-phase versions
//! - `realization_tracks` — realization-phase versions; additionally carries
//!   `deleted_at_us` so history rows can be soft-deleted and restored
//!
//! Both enforce `UNIQUE (record_id, version)` so a racing append fails
//! loudly instead of silently duplicating a version number.

/// Migration v1: track tables plus ledger metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS budget_tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    snapshot TEXT NOT NULL,
    diff TEXT,
    action_kind TEXT NOT NULL CHECK (action_kind IN ('INITIAL', 'UPDATE')),
    actor_id INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (record_id, version)
);

CREATE TABLE IF NOT EXISTS realization_tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    snapshot TEXT NOT NULL,
    diff TEXT,
    action_kind TEXT NOT NULL CHECK (action_kind IN ('INITIAL', 'UPDATE')),
    actor_id INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    deleted_at_us INTEGER,
    UNIQUE (record_id, version)
);

CREATE TABLE IF NOT EXISTS ledger_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO ledger_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path and pruner indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_budget_tracks_record_created
    ON budget_tracks(record_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_realization_tracks_record_created
    ON realization_tracks(record_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_realization_tracks_retention
    ON realization_tracks(created_at_us) WHERE deleted_at_us IS NULL;

UPDATE ledger_meta SET schema_version = 2 WHERE id = 1;
";

/// Indexes expected by the history and pruner query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_budget_tracks_record_created",
    "idx_realization_tracks_record_created",
    "idx_realization_tracks_retention",
];
