//! Parcel records and the lifecycle manager that owns them.
//!
//! # Architecture
//!
//! - [`Parcel`]: the custody record, persisted by the [`Store`](crate::store::Store)
//! - [`IntakeDetails`]: unvalidated staff input for a new parcel
//! - [`LifecycleManager`]: intake, collection, removal, token verification

pub mod lifecycle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{ResidentId, StaffId};
use crate::error::ValidationIssue;
use crate::slot::SlotId;
use crate::token::VerificationToken;

pub use lifecycle::LifecycleManager;

/// Human-readable parcel identifier such as `P007`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelId(String);

impl ParcelId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Custody status of a parcel.
///
/// `AwaitingPickup` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelStatus {
    /// Stored in its slot, waiting for the resident.
    AwaitingPickup,
    /// Handed over to the resident or their delegate.
    Collected,
    /// Taken out of the slot by staff without a pickup.
    Removed,
}

impl ParcelStatus {
    /// Returns `true` for `Collected` and `Removed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Collected | Self::Removed)
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AwaitingPickup => "AwaitingPickup",
            Self::Collected => "Collected",
            Self::Removed => "Removed",
        })
    }
}

impl std::str::FromStr for ParcelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "awaitingpickup" | "awaiting" | "active" => Ok(Self::AwaitingPickup),
            "collected" => Ok(Self::Collected),
            "removed" => Ok(Self::Removed),
            other => Err(format!("unknown parcel status '{other}'")),
        }
    }
}

/// The custody record for one parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    /// Sequence-generated identifier, immutable.
    pub id: ParcelId,
    /// Resident the parcel is addressed to, when known at intake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<ResidentId>,
    /// Apartment number; the lookup fallback when `resident_id` is absent.
    pub apartment: String,
    /// Parcel category (box, envelope, perishable, ...).
    pub category: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Delivering courier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier: Option<String>,
    /// Staff notes taken at intake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Slot the parcel is stored in.
    pub slot_id: SlotId,
    /// Staff member who received the parcel.
    pub received_by: StaffId,
    /// When the parcel was registered at the desk.
    pub arrived_at: DateTime<Utc>,
    /// Current custody status.
    pub status: ParcelStatus,
    /// When the parcel was collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    /// Name of the person who collected the parcel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_by: Option<String>,
    /// When staff removed the parcel from its slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
    /// Verification token minted at intake.
    pub token: VerificationToken,
}

impl Parcel {
    /// Returns `true` while the parcel holds its slot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Selection criteria for parcel listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParcelFilter {
    /// Only parcels in this status.
    pub status: Option<ParcelStatus>,
    /// Only parcels for this apartment (case-insensitive).
    pub apartment: Option<String>,
    /// Only parcels stored in this slot.
    pub slot_id: Option<SlotId>,
}

impl ParcelFilter {
    /// All parcels still awaiting pickup.
    #[must_use]
    pub fn active() -> Self {
        Self {
            status: Some(ParcelStatus::AwaitingPickup),
            ..Self::default()
        }
    }

    /// Returns `true` when `parcel` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, parcel: &Parcel) -> bool {
        self.status.is_none_or(|s| s == parcel.status)
            && self
                .apartment
                .as_deref()
                .is_none_or(|apt| apt.trim().eq_ignore_ascii_case(parcel.apartment.trim()))
            && self.slot_id.as_ref().is_none_or(|s| *s == parcel.slot_id)
    }
}

/// Staff input for registering a parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeDetails {
    /// Resident reference, if the label names one.
    pub resident_id: Option<String>,
    /// Apartment number (required).
    pub apartment: String,
    /// Parcel category (required).
    pub category: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Delivering courier.
    pub courier: Option<String>,
    /// Staff notes.
    pub notes: Option<String>,
    /// Requested slot label (required).
    pub slot_id: String,
    /// Receiving staff id (required).
    pub received_by: String,
}

/// Intake input after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidIntake {
    pub resident_id: Option<ResidentId>,
    pub apartment: String,
    pub category: String,
    pub description: Option<String>,
    pub courier: Option<String>,
    pub notes: Option<String>,
    pub slot_id: SlotId,
    pub received_by: StaffId,
}

impl IntakeDetails {
    /// Validates required fields and the slot label, collecting every issue.
    ///
    /// # Errors
    ///
    /// Returns all validation issues when any required field is blank or
    /// the slot is outside the alphabet.
    pub fn validate(&self) -> Result<ValidIntake, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let apartment = required(&self.apartment, "apartment", &mut issues);
        let category = required(&self.category, "category", &mut issues);
        let received_by = required(&self.received_by, "receivedBy", &mut issues);

        let slot_id = if self.slot_id.trim().is_empty() {
            issues.push(ValidationIssue::error("slotId", "slot is required"));
            None
        } else {
            SlotId::parse(&self.slot_id)
                .map_err(|reason| issues.push(ValidationIssue::error("slotId", reason)))
                .ok()
        };

        match (apartment, category, received_by, slot_id) {
            (Some(apartment), Some(category), Some(received_by), Some(slot_id))
                if issues.is_empty() =>
            {
                Ok(ValidIntake {
                    resident_id: optional(self.resident_id.as_deref()).map(ResidentId::new),
                    apartment,
                    category,
                    description: optional(self.description.as_deref()),
                    courier: optional(self.courier.as_deref()),
                    notes: optional(self.notes.as_deref()),
                    slot_id,
                    received_by: StaffId::new(received_by),
                })
            }
            _ => Err(issues),
        }
    }
}

fn required(value: &str, field: &str, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        issues.push(ValidationIssue::error(field, format!("{field} is required")));
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::TimeZone;

    use super::*;

    /// Builds an active parcel in `slot` with fixed timestamps.
    pub fn parcel_in(id: &str, slot: &str) -> Parcel {
        let arrived_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Parcel {
            id: ParcelId::new(id),
            resident_id: Some(ResidentId::new("R-100")),
            apartment: "4B".to_owned(),
            category: "box".to_owned(),
            description: None,
            courier: Some("DHL".to_owned()),
            notes: None,
            slot_id: SlotId::parse(slot).unwrap(),
            received_by: StaffId::new("S-1"),
            arrived_at,
            status: ParcelStatus::AwaitingPickup,
            collected_at: None,
            collected_by: None,
            removed_at: None,
            token: VerificationToken {
                token: "t".to_owned(),
                url: "http://desk/verify/t".to_owned(),
                expires_at: arrived_at + chrono::Duration::days(7),
            },
        }
    }
}
