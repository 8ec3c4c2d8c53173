//! Durable store.
//!
//! The store is the single source of truth for parcels, the notification
//! log, and named counters. Uniqueness constraints are checked and applied
//! inside one critical section per write, so two concurrent intakes for the
//! same slot cannot both pass the check:
//!
//! - parcel id
//! - `(slot_id, active)`: at most one active parcel per slot
//! - `(recipient_id, milestone, parcel_id)` in the notification log
//!
//! # Implementations
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral desks
//! - [`FileStore`]: JSON snapshot on disk, written atomically after every
//!   mutation

pub mod file;
pub mod memory;
mod tables;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::escalation::{NotificationKey, NotificationRecord};
use crate::parcel::{Parcel, ParcelFilter, ParcelId};
use crate::slot::SlotId;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use tables::Snapshot;

/// Document store used by every component.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Atomically increments the counter `name` and returns the new value.
    /// The first call for a name returns 1.
    async fn next_sequence(&self, name: &str) -> Result<u64, StoreError>;

    /// Inserts a new parcel.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the id exists or if
    /// the parcel is active and its slot already holds an active parcel.
    async fn insert_parcel(&self, parcel: &Parcel) -> Result<(), StoreError>;

    /// Replaces an existing parcel.
    ///
    /// Releases the slot when the new version is terminal. Fails with
    /// [`StoreError::NotFound`] for an unknown id.
    async fn update_parcel(&self, parcel: &Parcel) -> Result<(), StoreError>;

    /// Fetches one parcel.
    async fn get_parcel(&self, id: &ParcelId) -> Result<Option<Parcel>, StoreError>;

    /// Returns the id of the active parcel stored in `slot`, if any.
    async fn active_parcel_in(&self, slot: &SlotId) -> Result<Option<ParcelId>, StoreError>;

    /// Lists parcels matching `filter`, oldest arrival first.
    async fn list_parcels(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>, StoreError>;

    /// Returns `true` if a record with this key exists.
    async fn notification_exists(&self, key: &NotificationKey) -> Result<bool, StoreError>;

    /// Appends a record. Fails with [`StoreError::UniqueViolation`] if a
    /// record with the same key exists.
    async fn insert_notification(&self, record: &NotificationRecord) -> Result<(), StoreError>;

    /// Lists records, optionally for a single parcel, in insertion order.
    async fn list_notifications(
        &self,
        parcel: Option<&ParcelId>,
    ) -> Result<Vec<NotificationRecord>, StoreError>;
}
