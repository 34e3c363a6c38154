//! Structural diff engine.
//!
//! Compares two [`Snapshot`]s and produces a flat, machine-readable
//! [`ChangeSet`]. Header fields are compared against a fixed allow-list of
//! [`TrackedField`]s — anything outside the list (derived totals the host
//! recomputes, bookkeeping timestamps) is ignored. Line items are compared
//! by stable identity, attribute by attribute.
//!
//! # Keys
//!
//! - `field_<name>` — a tracked header field changed
//! - `item_<id>_added` / `item_<id>_deleted` — item appeared/disappeared
//! - `item_<id>_description` / `item_<id>_source_tag` / `item_<id>_amount`
//!   — one attribute of a surviving item changed
//!
//! Each entry carries `{old, new}` with the raw snapshot values, so the
//! history UI can render exactly what the user saw before and after.
//!
//! # Comparison rules
//!
//! Numeric fields compare as numbers regardless of representation: a field
//! holding `"1000.00"` equals one holding `1000.0`. Null and missing values
//! coerce to zero, matching how the host's loose-typed layer always treated
//! them. Everything else compares as exact, case-sensitive strings.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One header field the engine considers meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedField {
    /// Snapshot field name.
    pub name: &'static str,
    /// Compare numerically instead of as an exact string.
    pub numeric: bool,
}

impl TrackedField {
    /// Numeric (monetary/percentage) field.
    #[must_use]
    pub const fn numeric(name: &'static str) -> Self {
        Self { name, numeric: true }
    }

    /// Exact-string field.
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            numeric: false,
        }
    }
}

/// Old/new value pair for a single changed key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Flat map of change keys to old/new pairs.
///
/// Serializes as a plain JSON object; an empty set means "no meaningful
/// change" and must suppress version creation upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    entries: BTreeMap<String, Change>,
}

impl ChangeSet {
    /// True when nothing meaningful changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of changed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up one change by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Change> {
        self.entries.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.entries.iter()
    }

    fn insert(&mut self, key: String, old: Value, new: Value) {
        self.entries.insert(key, Change { old, new });
    }
}

/// Coerce a snapshot value to a float the way the host's loose layer did:
/// numbers pass through, numeric strings parse, everything else is zero.
fn as_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Coerce a snapshot value to its string form for exact comparison.
fn as_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn owned(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or(Value::Null)
}

/// Compare two snapshots and collect every meaningful difference.
///
/// `tracked_fields` is the allow-list of header fields; line items are
/// always compared. The result is empty when the snapshots agree on every
/// tracked field and every item attribute.
#[must_use]
pub fn diff(old: &Snapshot, new: &Snapshot, tracked_fields: &[TrackedField]) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for field in tracked_fields {
        let old_val = old.field(field.name);
        let new_val = new.field(field.name);

        let differs = if field.numeric {
            // Exact float inequality, not an epsilon: two representations of
            // the same decimal must parse to the same f64.
            as_number(old_val) != as_number(new_val)
        } else {
            as_text(old_val) != as_text(new_val)
        };

        if differs {
            changes.insert(
                format!("field_{}", field.name),
                owned(old_val),
                owned(new_val),
            );
        }
    }

    let old_items = old.item_map();
    let new_items = new.item_map();

    for (id, old_item) in &old_items {
        let Some(new_item) = new_items.get(id) else {
            changes.insert(
                format!("item_{id}_deleted"),
                Value::String(old_item.description.clone()),
                Value::String("Deleted".to_string()),
            );
            continue;
        };

        if old_item.description != new_item.description {
            changes.insert(
                format!("item_{id}_description"),
                Value::String(old_item.description.clone()),
                Value::String(new_item.description.clone()),
            );
        }
        if old_item.source_tag != new_item.source_tag {
            changes.insert(
                format!("item_{id}_source_tag"),
                Value::String(old_item.source_tag.clone()),
                Value::String(new_item.source_tag.clone()),
            );
        }
        if as_number(Some(&old_item.amount)) != as_number(Some(&new_item.amount)) {
            changes.insert(
                format!("item_{id}_amount"),
                old_item.amount.clone(),
                new_item.amount.clone(),
            );
        }
    }

    for (id, new_item) in &new_items {
        if !old_items.contains_key(id) {
            changes.insert(
                format!("item_{id}_added"),
                Value::Null,
                Value::String(new_item.description.clone()),
            );
        }
    }

    changes
}
