//! Snapshot serializer.
//!
//! Converts a fully loaded [`TrackedRecord`] into an immutable, comparable
//! value tree: header fields as a sorted scalar map, line items as a list
//! ordered by stable identity. Snapshots are what the ledger persists and
//! what the diff engine compares — they are never mutated after capture.
//!
//! Monetary fields are rendered as fixed two-decimal strings because that is
//! how the source of truth surfaces its `decimal(15,2)` columns. The diff
//! layer compensates with representation-insensitive numeric comparison.

use crate::record::TrackedRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value tree of one line item at capture time.
///
/// `amount` stays a [`Value`] rather than a string so snapshots decoded
/// from older ledger rows (which stored raw numbers) still compare cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: i64,
    pub description: String,
    pub source_tag: String,
    pub amount: Value,
}

/// Full value-tree capture of a [`TrackedRecord`] at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Header fields, keyed by field name. Sorted map keeps the JSON
    /// encoding deterministic.
    pub fields: BTreeMap<String, Value>,
    /// Line items ordered by ascending identity.
    pub items: Vec<ItemSnapshot>,
}

fn money(value: f64) -> Value {
    Value::String(format!("{value:.2}"))
}

impl Snapshot {
    /// Capture the record's current state.
    ///
    /// Deterministic: structurally identical input always yields an
    /// identical snapshot. The caller is responsible for having re-read the
    /// record from the source of truth first; capturing a stale in-memory
    /// aggregate mid-cascade produces a misleading history entry.
    #[must_use]
    pub fn capture(record: &TrackedRecord) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            "record_name".to_string(),
            Value::String(record.record_name.clone()),
        );
        fields.insert(
            "record_date".to_string(),
            Value::String(record.record_date.format("%Y-%m-%d").to_string()),
        );
        fields.insert("month".to_string(), Value::from(record.month));
        fields.insert("income_amount".to_string(), money(record.income_amount));
        fields.insert(
            "income_percentage".to_string(),
            money(record.income_percentage),
        );
        fields.insert("income_fixed".to_string(), money(record.income_fixed));
        fields.insert("income_bos".to_string(), money(record.income_bos));
        fields.insert("income_total".to_string(), money(record.income_total));
        fields.insert("total_expense".to_string(), money(record.total_expense));
        fields.insert(
            "total_realization".to_string(),
            money(record.total_realization),
        );
        fields.insert("total_balance".to_string(), money(record.total_balance));
        fields.insert(
            "status".to_string(),
            Value::String(record.status.as_str().to_string()),
        );
        fields.insert(
            "status_realization".to_string(),
            Value::Bool(record.status_realization),
        );

        let mut items: Vec<ItemSnapshot> = record
            .items
            .iter()
            .map(|item| ItemSnapshot {
                id: item.id,
                description: item.description.clone(),
                source_tag: item.source_tag.clone(),
                amount: money(item.amount),
            })
            .collect();
        items.sort_by_key(|item| item.id);

        Self { fields, items }
    }

    /// Header field by name, `None` when absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Line items keyed by identity.
    #[must_use]
    pub fn item_map(&self) -> BTreeMap<i64, &ItemSnapshot> {
        self.items.iter().map(|item| (item.id, item)).collect()
    }
}
