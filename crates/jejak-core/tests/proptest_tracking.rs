use proptest::prelude::*;

use jejak_core::diff::{self, TrackedField};
use jejak_core::ledger::open_in_memory;
use jejak_core::ledger::store::{ActionKind, VersionStore};
use jejak_core::record::{LineItem, TrackedRecord};
use jejak_core::snapshot::Snapshot;
use jejak_core::track::{RecordSource, TrackProfile, Tracker};
use std::cell::RefCell;

use generators::*;

const FIELDS: &[TrackedField] = &[
    TrackedField::numeric("income_amount"),
    TrackedField::numeric("income_total"),
    TrackedField::numeric("total_expense"),
    TrackedField::text("record_name"),
    TrackedField::text("record_date"),
];

struct SingleSource {
    record: RefCell<TrackedRecord>,
}

impl RecordSource for SingleSource {
    fn load(&self, record_id: i64) -> anyhow::Result<Option<TrackedRecord>> {
        let record = self.record.borrow();
        Ok((record.id == record_id).then(|| record.clone()))
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    // A snapshot never differs from itself, whatever the record looks like.
    #[test]
    fn diff_of_identical_snapshots_is_empty(record in arb_record()) {
        let snapshot = Snapshot::capture(&record);
        let changes = diff::diff(&snapshot, &snapshot, FIELDS);
        prop_assert!(changes.is_empty());
    }

    // Numeric comparison ignores representation: a value rendered as a
    // two-decimal string and the same value as a JSON number are equal.
    #[test]
    fn numeric_compare_ignores_representation(cents in -1_000_000_000i64..1_000_000_000i64) {
        let amount = cents as f64 / 100.0;
        let before = field_snapshot("income_amount", serde_json::json!(format!("{amount:.2}")));
        let after = field_snapshot("income_amount", serde_json::json!(amount));

        let changes = diff::diff(&before, &after, FIELDS);
        prop_assert!(changes.is_empty(), "changes: {:?}", changes);
    }

    // Capturing is deterministic: two captures of one record are identical.
    #[test]
    fn capture_is_deterministic(record in arb_record()) {
        let a = serde_json::to_string(&Snapshot::capture(&record)).expect("encode");
        let b = serde_json::to_string(&Snapshot::capture(&record)).expect("encode");
        prop_assert_eq!(a, b);
    }

    // Reordering line items does not change the captured snapshot.
    #[test]
    fn capture_is_order_insensitive(record in arb_record()) {
        let mut record = record;
        let forward = Snapshot::capture(&record);
        record.items.reverse();
        let reversed = Snapshot::capture(&record);
        prop_assert_eq!(
            serde_json::to_string(&forward).expect("encode"),
            serde_json::to_string(&reversed).expect("encode")
        );
    }

    // Driving the coordinator with an arbitrary sequence of edits, each
    // spaced past the merge window, always yields a contiguous version
    // sequence starting at 1 with exactly one INITIAL entry at the bottom.
    #[test]
    fn versions_stay_contiguous_with_single_initial(
        amounts in proptest::collection::vec(0i64..10_000_000, 1..12),
    ) {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());
        let source = SingleSource {
            record: RefCell::new(arb_record_seed(1)),
        };

        let mut now_us = 0i64;
        for cents in amounts {
            source.record.borrow_mut().total_expense = cents as f64 / 100.0;
            tracker
                .on_saved(&mut conn, &source, 1, Some(1), now_us)
                .expect("on_saved");
            now_us += 10_000_000;
        }

        let store = VersionStore::new(&conn, TrackProfile::planning().kind);
        let mut entries = store.history(1, true, None).expect("history");
        entries.reverse();

        prop_assert!(!entries.is_empty());
        for (i, entry) in entries.iter().enumerate() {
            prop_assert_eq!(entry.version as usize, i + 1);
            let expect_initial = i == 0;
            prop_assert_eq!(entry.action_kind == ActionKind::Initial, expect_initial);
            prop_assert_eq!(entry.diff.is_none(), expect_initial);
        }
    }

    // An edit and its exact revert, each outside the window, produce two
    // UPDATE entries whose diffs mirror each other.
    #[test]
    fn revert_produces_mirrored_diffs(cents in 1i64..10_000_000) {
        let mut conn = open_in_memory().expect("open ledger");
        let tracker = Tracker::new(TrackProfile::planning());
        let source = SingleSource {
            record: RefCell::new(arb_record_seed(1)),
        };
        let original = source.record.borrow().total_expense;

        tracker.on_saved(&mut conn, &source, 1, Some(1), 0).expect("initial");
        source.record.borrow_mut().total_expense = original + cents as f64 / 100.0;
        tracker.on_saved(&mut conn, &source, 1, Some(1), 10_000_000).expect("edit");
        source.record.borrow_mut().total_expense = original;
        tracker.on_saved(&mut conn, &source, 1, Some(1), 20_000_000).expect("revert");

        let store = VersionStore::new(&conn, TrackProfile::planning().kind);
        let entries = store.history(1, false, None).expect("history");
        prop_assert_eq!(entries.len(), 3);

        let revert = entries[0].diff.as_ref().expect("diff");
        let edit = entries[1].diff.as_ref().expect("diff");
        let forward = edit.get("field_total_expense").expect("change");
        let backward = revert.get("field_total_expense").expect("change");
        prop_assert_eq!(&forward.old, &backward.new);
        prop_assert_eq!(&forward.new, &backward.old);
    }
}

// Non-proptest sanity check kept next to the properties it anchors.
#[test]
fn line_item_diff_keys_are_stable() {
    let mut record = arb_record_seed(1);
    let before = Snapshot::capture(&record);
    record.items.push(LineItem {
        id: 42,
        description: "Printer ink".to_string(),
        source_tag: "BOS".to_string(),
        amount: 120.0,
    });
    let after = Snapshot::capture(&record);

    let changes = diff::diff(&before, &after, FIELDS);
    assert!(changes.get("item_42_added").is_some());
    assert_eq!(changes.len(), 1);
}

fn field_snapshot(name: &str, value: serde_json::Value) -> Snapshot {
    Snapshot {
        fields: std::iter::once((name.to_string(), value)).collect(),
        items: vec![],
    }
}
