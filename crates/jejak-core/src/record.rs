//! The tracked record aggregate.
//!
//! A [`TrackedRecord`] is the engine's view of one budget row: scalar header
//! fields (monetary totals, name, date) plus the ordered collection of
//! expense [`LineItem`]s. The surrounding application owns these rows; the
//! engine only ever reads them, immediately after a save, through a
//! [`crate::track::RecordSource`].
//!
//! Only records in [`RecordStatus::Final`] are visible to tracking. Draft
//! records never reach the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a budget record.
///
/// Mirrors the host application's status flag: a record starts as a draft
/// and becomes final when approved. Tracking applies to final records only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Work in progress; invisible to the tracking engine.
    Draft,
    /// Approved/active; every save is a candidate for a ledger entry.
    Final,
}

impl RecordStatus {
    /// Canonical lowercase string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }

    /// Returns `true` for [`RecordStatus::Final`].
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record status '{raw}': expected 'draft' or 'final'")]
pub struct UnknownStatus {
    /// The unrecognised input string.
    pub raw: String,
}

impl FromStr for RecordStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            _ => Err(UnknownStatus { raw: s.to_string() }),
        }
    }
}

/// One expense line item inside a record.
///
/// `id` is the stable identity the diff engine keys on; it survives edits
/// to the other attributes. `source_tag` labels the funding source
/// (e.g. "Mandiri", "BOS").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub description: String,
    pub source_tag: String,
    pub amount: f64,
}

/// A fully loaded budget record: header fields plus expense items.
///
/// Monetary fields carry two-decimal precision in the source of truth;
/// they are rendered back to fixed-point strings when snapshotted (see
/// [`crate::snapshot::Snapshot::capture`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub id: i64,
    pub record_name: String,
    pub record_date: NaiveDate,
    /// Budget month, 1–12.
    pub month: u32,
    pub income_amount: f64,
    pub income_percentage: f64,
    pub income_fixed: f64,
    pub income_bos: f64,
    pub income_total: f64,
    pub total_expense: f64,
    pub total_realization: f64,
    pub total_balance: f64,
    pub status: RecordStatus,
    /// Realization phase flag; tracked by the realization profile only.
    #[serde(default)]
    pub status_realization: bool,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// Malformed record state that would corrupt a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Month outside 1–12.
    #[error("month value must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    /// Line item identity must be a positive integer.
    #[error("line item has non-positive id {0}")]
    InvalidItemId(i64),
    /// Two line items share the same identity.
    #[error("duplicate line item id {0}")]
    DuplicateItemId(i64),
}

impl TrackedRecord {
    /// Check the invariants a snapshot relies on.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the month is out of range or a line item
    /// identity is missing, non-positive, or duplicated. Callers must not
    /// write any ledger entry for a record that fails validation.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !(1..=12).contains(&self.month) {
            return Err(RecordError::InvalidMonth(self.month));
        }
        let mut seen = std::collections::BTreeSet::new();
        for item in &self.items {
            if item.id <= 0 {
                return Err(RecordError::InvalidItemId(item.id));
            }
            if !seen.insert(item.id) {
                return Err(RecordError::DuplicateItemId(item.id));
            }
        }
        Ok(())
    }
}
