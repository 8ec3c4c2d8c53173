//! JSON snapshot store.
//!
//! Every mutation is applied to a copy of the tables, the copy is written
//! to `<path>.tmp` and renamed over `<path>`, and only then does the copy
//! replace the live tables. A failed write leaves both the file and the
//! in-memory state untouched.
//!
//! Writes are serialized within one process. Several processes sharing a
//! snapshot file are not coordinated; run one `serve` per file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Store;
use super::tables::{Snapshot, Tables};
use crate::error::StoreError;
use crate::escalation::{NotificationKey, NotificationRecord};
use crate::parcel::{Parcel, ParcelFilter, ParcelId};
use crate::slot::SlotId;

/// Store persisted as a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl FileStore {
    /// Opens the snapshot at `path`, starting empty if the file does not
    /// exist yet. Parent directories are created on first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read and
    /// [`StoreError::Json`] if it is not a valid snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                info!(
                    path = %path.display(),
                    parcels = snapshot.parcels.len(),
                    notifications = snapshot.notifications.len(),
                    "loaded store snapshot"
                );
                Tables::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store snapshot yet, starting empty");
                Tables::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `op` to a copy of the tables, persists the copy, then swaps
    /// it in.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Tables) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut live = self.tables.lock().await;
        let mut next = live.clone();
        let out = op(&mut next)?;
        persist(&self.path, &next.to_snapshot()).await?;
        *live = next;
        Ok(out)
    }
}

async fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "store snapshot written");
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        self.mutate(|t| Ok(t.next_sequence(name))).await
    }

    async fn insert_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.mutate(|t| t.insert_parcel(parcel)).await
    }

    async fn update_parcel(&self, parcel: &Parcel) -> Result<(), StoreError> {
        self.mutate(|t| t.update_parcel(parcel)).await
    }

    async fn get_parcel(&self, id: &ParcelId) -> Result<Option<Parcel>, StoreError> {
        Ok(self.tables.lock().await.get_parcel(id))
    }

    async fn active_parcel_in(&self, slot: &SlotId) -> Result<Option<ParcelId>, StoreError> {
        Ok(self.tables.lock().await.active_parcel_in(slot))
    }

    async fn list_parcels(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>, StoreError> {
        Ok(self.tables.lock().await.list_parcels(filter))
    }

    async fn notification_exists(&self, key: &NotificationKey) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.notification_exists(key))
    }

    async fn insert_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        self.mutate(|t| t.insert_notification(record)).await
    }

    async fn list_notifications(
        &self,
        parcel: Option<&ParcelId>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        Ok(self.tables.lock().await.list_notifications(parcel))
    }
}
