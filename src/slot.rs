//! Slot alphabet and the derived occupancy view.
//!
//! Slots are the fixed bank `L1..L50`. Occupancy is never stored: the
//! registry projects it from the set of active parcels on every read.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::observability::metrics;
use crate::parcel::{Parcel, ParcelFilter, ParcelId};
use crate::store::Store;

/// Number of physical slots at the desk.
pub const SLOT_COUNT: u8 = 50;

/// Prefix shared by every slot label.
pub const SLOT_PREFIX: char = 'L';

/// Identifier of a physical storage slot, e.g. `L7`.
///
/// [`SlotId::parse`] only accepts labels from the fixed alphabet.
/// Deserialization is lenient so that records written by older tooling with
/// a label outside the alphabet still load; [`SlotId::number`] returns
/// `None` for those.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Parses a slot label, accepting `L1` through `L50`.
    ///
    /// Surrounding whitespace and a lowercase `l` are tolerated; leading
    /// zeros (`L05`) are not, so each slot has exactly one spelling.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the label is outside the
    /// alphabet.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix(SLOT_PREFIX)
            .or_else(|| trimmed.strip_prefix(SLOT_PREFIX.to_ascii_lowercase()))
            .ok_or_else(|| format!("slot '{trimmed}' must start with '{SLOT_PREFIX}'"))?;

        if digits.is_empty() || digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(format!(
                "slot '{trimmed}' is not one of {SLOT_PREFIX}1..{SLOT_PREFIX}{SLOT_COUNT}"
            ));
        }

        match digits.parse::<u8>() {
            Ok(n) if (1..=SLOT_COUNT).contains(&n) => Ok(Self::from_number(n)),
            _ => Err(format!(
                "slot '{trimmed}' is not one of {SLOT_PREFIX}1..{SLOT_PREFIX}{SLOT_COUNT}"
            )),
        }
    }

    /// Builds the label for slot number `n` without range checks.
    fn from_number(n: u8) -> Self {
        Self(format!("{SLOT_PREFIX}{n}"))
    }

    /// Returns the slot number when the label is inside the alphabet.
    #[must_use]
    pub fn number(&self) -> Option<u8> {
        Self::parse(&self.0).ok().and_then(|s| s.0[1..].parse().ok())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the full alphabet in numeric order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=SLOT_COUNT).map(Self::from_number)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SlotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Occupancy of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    /// An active parcel is stored in the slot.
    Occupied,
    /// The slot is free.
    Available,
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Occupied => "Occupied",
            Self::Available => "Available",
        })
    }
}

/// One entry of the slot listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    /// Slot label.
    pub slot_id: SlotId,
    /// Derived occupancy.
    pub status: SlotStatus,
}

/// Aggregate occupancy counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySummary {
    /// Slots holding an active parcel.
    pub occupied: usize,
    /// Free slots.
    pub available: usize,
}

/// Projects slot occupancy from a set of parcels.
///
/// Only active parcels count. A parcel whose slot label is outside the
/// alphabet, or a second active parcel in an already-occupied slot, is
/// logged as a data-integrity issue and otherwise ignored.
#[must_use]
pub fn project_occupancy(parcels: &[Parcel]) -> Vec<SlotView> {
    let mut occupied: BTreeMap<u8, &ParcelId> = BTreeMap::new();

    for parcel in parcels.iter().filter(|p| p.is_active()) {
        let Some(n) = parcel.slot_id.number() else {
            warn!(
                parcel_id = %parcel.id,
                slot = %parcel.slot_id,
                "active parcel references a slot outside the fixed alphabet"
            );
            continue;
        };
        if let Some(holder) = occupied.insert(n, &parcel.id) {
            warn!(
                slot = %parcel.slot_id,
                first = %holder,
                second = %parcel.id,
                "two active parcels share one slot"
            );
        }
    }

    SlotId::all()
        .map(|slot_id| {
            let status = match slot_id.number() {
                Some(n) if occupied.contains_key(&n) => SlotStatus::Occupied,
                _ => SlotStatus::Available,
            };
            SlotView { slot_id, status }
        })
        .collect()
}

/// Read-side view over the slot bank.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    store: Arc<dyn Store>,
}

impl SlotRegistry {
    /// Creates a registry reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Lists every slot in the alphabet, in numeric order, with its
    /// current occupancy.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if active parcels cannot be read.
    pub async fn list_slots(&self) -> Result<Vec<SlotView>, StoreError> {
        let active = self.store.list_parcels(&ParcelFilter::active()).await?;
        let views = project_occupancy(&active);
        metrics::set_slots_occupied(
            views
                .iter()
                .filter(|v| v.status == SlotStatus::Occupied)
                .count(),
        );
        Ok(views)
    }

    /// Returns occupied/available counts.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if active parcels cannot be read.
    pub async fn occupancy_summary(&self) -> Result<OccupancySummary, StoreError> {
        let views = self.list_slots().await?;
        let occupied = views
            .iter()
            .filter(|v| v.status == SlotStatus::Occupied)
            .count();
        Ok(OccupancySummary {
            occupied,
            available: views.len() - occupied,
        })
    }
}
