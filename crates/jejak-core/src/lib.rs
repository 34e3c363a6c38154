//! jejak-core: versioned change tracking for budget records.
//!
//! The engine turns every finalized save of a budget or realization record
//! into an append-mostly ledger of numbered snapshots plus machine-readable
//! diffs, while suppressing no-op saves and folding cascaded parent/child
//! saves into a single version.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums per module; `anyhow::Result` at
//!   orchestration seams (`RecordSource`).
//! - **Logging**: `tracing` macros (`info!`, `debug!`, `warn!`).
//! - **Time**: wall-clock microseconds (`i64`) in storage and APIs;
//!   `chrono` only at presentation edges.

pub mod config;
pub mod diff;
pub mod ledger;
pub mod prune;
pub mod record;
pub mod snapshot;
pub mod track;
