//! In-memory tables and indexes shared by the store implementations.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StoreError, UniqueIndex};
use crate::escalation::{NotificationKey, NotificationRecord};
use crate::parcel::{Parcel, ParcelFilter, ParcelId};
use crate::slot::SlotId;

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version.
    #[serde(default)]
    pub version: u32,
    /// Named counters.
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    /// Every parcel, terminal ones included.
    #[serde(default)]
    pub parcels: Vec<Parcel>,
    /// The notification log.
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
}

/// Tables plus the unique indexes derived from them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    counters: BTreeMap<String, u64>,
    parcels: HashMap<ParcelId, Parcel>,
    active_slots: HashMap<SlotId, ParcelId>,
    notifications: Vec<NotificationRecord>,
    notification_keys: HashSet<NotificationKey>,
}

impl Tables {
    /// Rebuilds tables and indexes from a snapshot.
    ///
    /// Rows that violate a constraint are kept in the parcel table but not
    /// indexed, and logged; a corrupt snapshot never prevents startup.
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut tables = Self {
            counters: snapshot.counters,
            ..Self::default()
        };

        for parcel in snapshot.parcels {
            if tables.parcels.contains_key(&parcel.id) {
                warn!(parcel_id = %parcel.id, "snapshot holds a duplicate parcel id; keeping the first");
                continue;
            }
            if parcel.is_active() {
                if let Some(holder) = tables.active_slots.get(&parcel.slot_id) {
                    warn!(
                        slot = %parcel.slot_id,
                        first = %holder,
                        second = %parcel.id,
                        "snapshot holds two active parcels in one slot"
                    );
                } else {
                    tables
                        .active_slots
                        .insert(parcel.slot_id.clone(), parcel.id.clone());
                }
            }
            tables.parcels.insert(parcel.id.clone(), parcel);
        }

        for record in snapshot.notifications {
            if tables.notification_keys.insert(record.key()) {
                tables.notifications.push(record);
            } else {
                warn!(key = %record.key(), "snapshot holds a duplicate notification record");
            }
        }

        tables
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        let mut parcels: Vec<Parcel> = self.parcels.values().cloned().collect();
        sort_parcels(&mut parcels);
        Snapshot {
            version: SNAPSHOT_VERSION,
            counters: self.counters.clone(),
            parcels,
            notifications: self.notifications.clone(),
        }
    }

    pub(crate) fn next_sequence(&mut self, name: &str) -> u64 {
        let counter = self.counters.entry(name.to_owned()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub(crate) fn insert_parcel(&mut self, parcel: &Parcel) -> Result<(), StoreError> {
        if self.parcels.contains_key(&parcel.id) {
            return Err(StoreError::UniqueViolation {
                index: UniqueIndex::ParcelId,
                key: parcel.id.to_string(),
            });
        }
        if parcel.is_active() && self.active_slots.contains_key(&parcel.slot_id) {
            return Err(StoreError::UniqueViolation {
                index: UniqueIndex::ActiveSlot,
                key: parcel.slot_id.to_string(),
            });
        }

        if parcel.is_active() {
            self.active_slots
                .insert(parcel.slot_id.clone(), parcel.id.clone());
        }
        self.parcels.insert(parcel.id.clone(), parcel.clone());
        Ok(())
    }

    pub(crate) fn update_parcel(&mut self, parcel: &Parcel) -> Result<(), StoreError> {
        let Some(previous) = self.parcels.get(&parcel.id) else {
            return Err(StoreError::NotFound(parcel.id.to_string()));
        };

        if parcel.is_active()
            && let Some(holder) = self.active_slots.get(&parcel.slot_id)
            && holder != &parcel.id
        {
            return Err(StoreError::UniqueViolation {
                index: UniqueIndex::ActiveSlot,
                key: parcel.slot_id.to_string(),
            });
        }

        if previous.is_active()
            && self.active_slots.get(&previous.slot_id) == Some(&previous.id)
        {
            self.active_slots.remove(&previous.slot_id);
        }
        if parcel.is_active() {
            self.active_slots
                .insert(parcel.slot_id.clone(), parcel.id.clone());
        }
        self.parcels.insert(parcel.id.clone(), parcel.clone());
        Ok(())
    }

    pub(crate) fn get_parcel(&self, id: &ParcelId) -> Option<Parcel> {
        self.parcels.get(id).cloned()
    }

    pub(crate) fn active_parcel_in(&self, slot: &SlotId) -> Option<ParcelId> {
        self.active_slots.get(slot).cloned()
    }

    pub(crate) fn list_parcels(&self, filter: &ParcelFilter) -> Vec<Parcel> {
        let mut parcels: Vec<Parcel> = self
            .parcels
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_parcels(&mut parcels);
        parcels
    }

    pub(crate) fn notification_exists(&self, key: &NotificationKey) -> bool {
        self.notification_keys.contains(key)
    }

    pub(crate) fn insert_notification(
        &mut self,
        record: &NotificationRecord,
    ) -> Result<(), StoreError> {
        let key = record.key();
        if !self.notification_keys.insert(key.clone()) {
            return Err(StoreError::UniqueViolation {
                index: UniqueIndex::NotificationKey,
                key: key.to_string(),
            });
        }
        self.notifications.push(record.clone());
        Ok(())
    }

    pub(crate) fn list_notifications(&self, parcel: Option<&ParcelId>) -> Vec<NotificationRecord> {
        self.notifications
            .iter()
            .filter(|r| parcel.is_none_or(|id| &r.parcel_id == id))
            .cloned()
            .collect()
    }
}

fn sort_parcels(parcels: &mut [Parcel]) {
    parcels.sort_by(|a, b| {
        a.arrived_at
            .cmp(&b.arrived_at)
            .then_with(|| a.id.as_str().len().cmp(&b.id.as_str().len()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::directory::ResidentId;
    use crate::escalation::{Milestone, RecipientId};
    use crate::parcel::ParcelStatus;
    use crate::parcel::test_support::parcel_in;

    #[test]
    fn active_slot_is_exclusive() {
        let mut tables = Tables::default();
        tables.insert_parcel(&parcel_in("P001", "L5")).unwrap();

        let err = tables.insert_parcel(&parcel_in("P002", "L5")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                index: UniqueIndex::ActiveSlot,
                ..
            }
        ));
    }

    #[test]
    fn terminal_update_releases_slot() {
        let mut tables = Tables::default();
        let mut parcel = parcel_in("P001", "L5");
        tables.insert_parcel(&parcel).unwrap();

        parcel.status = ParcelStatus::Collected;
        tables.update_parcel(&parcel).unwrap();
        assert_eq!(tables.active_parcel_in(&parcel.slot_id), None);

        tables.insert_parcel(&parcel_in("P002", "L5")).unwrap();
    }

    #[test]
    fn duplicate_parcel_id_rejected() {
        let mut tables = Tables::default();
        tables.insert_parcel(&parcel_in("P001", "L1")).unwrap();
        let err = tables.insert_parcel(&parcel_in("P001", "L2")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                index: UniqueIndex::ParcelId,
                ..
            }
        ));
    }

    #[test]
    fn update_into_occupied_slot_rejected() {
        let mut tables = Tables::default();
        tables.insert_parcel(&parcel_in("P001", "L1")).unwrap();
        let mut moved = parcel_in("P002", "L2");
        tables.insert_parcel(&moved).unwrap();

        moved.slot_id = SlotId::parse("L1").unwrap();
        assert!(tables.update_parcel(&moved).is_err());
    }

    #[test]
    fn counters_start_at_one() {
        let mut tables = Tables::default();
        assert_eq!(tables.next_sequence("parcel"), 1);
        assert_eq!(tables.next_sequence("parcel"), 2);
        assert_eq!(tables.next_sequence("other"), 1);
    }

    #[test]
    fn snapshot_rebuild_skips_conflicting_rows() {
        let record = NotificationRecord {
            recipient_id: RecipientId::from(&ResidentId::new("R-1")),
            milestone: Milestone::ReminderSent,
            parcel_id: ParcelId::new("P001"),
            sent_at: Utc::now(),
        };
        let snapshot = Snapshot {
            version: 1,
            counters: BTreeMap::from([("parcel".to_owned(), 2)]),
            parcels: vec![parcel_in("P001", "L5"), parcel_in("P002", "L5")],
            notifications: vec![record.clone(), record],
        };

        let mut tables = Tables::from_snapshot(snapshot);
        assert_eq!(tables.list_parcels(&ParcelFilter::default()).len(), 2);
        assert_eq!(tables.list_notifications(None).len(), 1);
        assert_eq!(
            tables.active_parcel_in(&SlotId::parse("L5").unwrap()),
            Some(ParcelId::new("P001"))
        );
        assert_eq!(tables.next_sequence("parcel"), 3);
    }

    #[test]
    fn listing_orders_by_arrival_then_numeric_id() {
        let mut tables = Tables::default();
        tables.insert_parcel(&parcel_in("P1000", "L1")).unwrap();
        tables.insert_parcel(&parcel_in("P999", "L2")).unwrap();
        let ids: Vec<_> = tables
            .list_parcels(&ParcelFilter::default())
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [ParcelId::new("P999"), ParcelId::new("P1000")]);
    }
}
