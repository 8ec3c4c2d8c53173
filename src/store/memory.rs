//! Process-local store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::Store;
use super::tables::{Snapshot, Tables};
use crate::error::StoreError;
use crate::escalation::{NotificationKey, NotificationRecord};
use crate::parcel::{Parcel, ParcelFilter, ParcelId};
use crate::slot::SlotId;

/// Store kept entirely in memory.
///
/// All tables sit behind one `std::sync::Mutex`, held only for the
/// synchronous table operation and never across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: Mutex::new(Tables::from_snapshot(snapshot)),
        }
    }

    /// Exports the current contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock()?.to_snapshot())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_owned()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        Ok(self.lock()?.next_sequence(name))
    }

    async fn insert_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.lock()?.insert_parcel(parcel)
    }

    async fn update_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.lock()?.update_parcel(parcel)
    }

    async fn get_parcel(&self, id: &ParcelId) -> Result<Option<Parcel>, StoreError> {
        Ok(self.lock()?.get_parcel(id))
    }

    async fn active_parcel_in(&self, slot: &SlotId) -> Result<Option<ParcelId>, StoreError> {
        Ok(self.lock()?.active_parcel_in(slot))
    }

    async fn list_parcels(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>, StoreError> {
        Ok(self.lock()?.list_parcels(filter))
    }

    async fn notification_exists(&self, key: &NotificationKey) -> Result<bool, StoreError> {
        Ok(self.lock()?.notification_exists(key))
    }

    async fn insert_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        self.lock()?.insert_notification(record)
    }

    async fn list_notifications(
        &self,
        parcel: Option<&ParcelId>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        Ok(self.lock()?.list_notifications(parcel))
    }
}
