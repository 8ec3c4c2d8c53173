//! Property tests for slot exclusivity and identifier allocation.
//!
//! Random interleavings of intake, collection, and removal are replayed
//! against a memory-backed desk and checked against a simple model.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use tokio_test::block_on;

use common::{TestDesk, intake_for};
use parcelkeep::error::LifecycleError;
use parcelkeep::parcel::{ParcelFilter, ParcelId};
use parcelkeep::slot::{SLOT_COUNT, SlotId, SlotStatus};

#[derive(Debug, Clone)]
enum Op {
    Intake(u8),
    Collect(usize),
    Remove(usize),
}

/// Slots are drawn from a small range so conflicts are frequent.
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u8..=6).prop_map(Op::Intake),
        1 => (0usize..20).prop_map(Op::Collect),
        1 => (0usize..20).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn occupancy_matches_model(ops in prop::collection::vec(arb_op(), 1..40)) {
        let t = TestDesk::new();
        // slot number -> id of the parcel the model believes is in it
        let mut model: BTreeMap<u8, ParcelId> = BTreeMap::new();
        let mut issued: Vec<ParcelId> = Vec::new();

        block_on(async {
            for op in &ops {
                match op {
                    Op::Intake(n) => {
                        let result = t.desk.lifecycle().intake(&intake_for(&format!("L{n}"))).await;
                        match (model.contains_key(n), result) {
                            (false, Ok(parcel)) => {
                                model.insert(*n, parcel.id.clone());
                                issued.push(parcel.id);
                            }
                            (true, Err(LifecycleError::SlotConflict { .. })) => {}
                            (occupied, other) => panic!("slot L{n} occupied={occupied}: {other:?}"),
                        }
                    }
                    Op::Collect(i) | Op::Remove(i) => {
                        let Some(id) = issued.get(*i).cloned() else { continue };
                        let result = if matches!(op, Op::Collect(_)) {
                            t.desk.lifecycle().mark_collected(&id, "Ana", None).await
                        } else {
                            t.desk.lifecycle().mark_removed(&id).await
                        };
                        let active_slot = model.iter().find(|(_, v)| **v == id).map(|(k, _)| *k);
                        match (active_slot, result) {
                            (Some(n), Ok(_)) => {
                                model.remove(&n);
                            }
                            (None, Err(LifecycleError::InvalidTransition { .. })) => {}
                            (slot, other) => panic!("{id} active in {slot:?}: {other:?}"),
                        }
                    }
                }
            }

            let slots = t.desk.slots().list_slots().await.unwrap();
            assert_eq!(slots.len(), usize::from(SLOT_COUNT));
            for view in &slots {
                let n = view.slot_id.number().unwrap();
                let expected = if model.contains_key(&n) {
                    SlotStatus::Occupied
                } else {
                    SlotStatus::Available
                };
                assert_eq!(view.status, expected, "{}", view.slot_id);
            }

            let active = t.desk.lifecycle().list(&ParcelFilter::active()).await.unwrap();
            assert_eq!(active.len(), model.len());
        });

        // Conflicts never burn an identifier.
        let expected: Vec<String> = (1..=issued.len()).map(|i| format!("P{i:03}")).collect();
        let actual: Vec<String> = issued.iter().map(|id| id.as_str().to_owned()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn slot_labels_round_trip_through_number(n in 1u8..=SLOT_COUNT) {
        let slot = SlotId::parse(&format!(" l{n} ")).unwrap();
        prop_assert_eq!(slot.as_str(), format!("L{n}"));
        prop_assert_eq!(slot.number(), Some(n));
    }

    #[test]
    fn out_of_range_labels_are_rejected(n in (u32::from(SLOT_COUNT) + 1)..10_000u32) {
        let label = format!("L{n}");
        prop_assert!(SlotId::parse(&label).is_err());
    }

    #[test]
    fn arbitrary_text_never_panics(raw in "\\PC{0,12}") {
        if let Ok(slot) = SlotId::parse(&raw) {
            prop_assert!(slot.number().is_some());
        }
    }
}
