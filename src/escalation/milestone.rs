//! Escalation milestones and the notification log they are recorded in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{Resident, ResidentId, StaffId};
use crate::parcel::{Parcel, ParcelId, ParcelStatus};

/// A fixed escalation checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Milestone {
    /// Day 4: first reminder to the resident.
    ReminderSent,
    /// Day 10: final warning to the resident.
    FinalWarningSent,
    /// Day 14: removal alert to every staff account.
    RemovalAlert,
}

/// Who a milestone is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The parcel's resident.
    Resident,
    /// Every staff account.
    Staff,
}

impl Milestone {
    /// All milestones in escalation order.
    pub const ALL: [Self; 3] = [Self::ReminderSent, Self::FinalWarningSent, Self::RemovalAlert];

    /// Day on which the milestone becomes due.
    #[must_use]
    pub const fn day(self) -> i64 {
        match self {
            Self::ReminderSent => 4,
            Self::FinalWarningSent => 10,
            Self::RemovalAlert => 14,
        }
    }

    /// Returns `true` when the milestone should fire for a parcel that has
    /// been waiting `days_elapsed` whole days.
    ///
    /// The reminder fires on any day from day 4 on, so a missed day is
    /// caught up. The final warning and the removal alert fire only on
    /// their exact day.
    #[must_use]
    pub const fn is_due(self, days_elapsed: i64) -> bool {
        match self {
            Self::ReminderSent => days_elapsed >= self.day(),
            Self::FinalWarningSent | Self::RemovalAlert => days_elapsed == self.day(),
        }
    }

    /// Recipient group.
    #[must_use]
    pub const fn audience(self) -> Audience {
        match self {
            Self::ReminderSent | Self::FinalWarningSent => Audience::Resident,
            Self::RemovalAlert => Audience::Staff,
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReminderSent => "reminder",
            Self::FinalWarningSent => "final_warning",
            Self::RemovalAlert => "removal_alert",
        }
    }

    /// Notification title.
    #[must_use]
    pub fn subject(self, parcel: &Parcel) -> String {
        match self {
            Self::ReminderSent => format!("Reminder: parcel {} is waiting for you", parcel.id),
            Self::FinalWarningSent => {
                format!("Final notice: collect parcel {} within 4 days", parcel.id)
            }
            Self::RemovalAlert => format!(
                "Parcel {} in slot {} is due for removal",
                parcel.id, parcel.slot_id
            ),
        }
    }

    /// Notification body for a resident milestone.
    #[must_use]
    pub fn resident_body(self, parcel: &Parcel, resident: &Resident, days: i64) -> String {
        let greeting = format!("Hello {},", resident.display_name);
        match self {
            Self::ReminderSent | Self::RemovalAlert => format!(
                "{greeting}\n\nYour parcel {} ({}) has been waiting at the front desk in slot {} \
                 for {days} days. Please collect it at your earliest convenience and bring \
                 your verification code: {}",
                parcel.id, parcel.category, parcel.slot_id, parcel.token.url
            ),
            Self::FinalWarningSent => format!(
                "{greeting}\n\nYour parcel {} ({}) has been uncollected for {days} days. \
                 If it is not picked up within 4 days it will be removed from slot {} and \
                 handed to building management. Verification code: {}",
                parcel.id, parcel.category, parcel.slot_id, parcel.token.url
            ),
        }
    }

    /// Notification body for the staff removal alert.
    #[must_use]
    pub fn staff_body(parcel: &Parcel, days: i64) -> String {
        format!(
            "Parcel {} for apartment {} has been in slot {} for {days} days without pickup. \
             Please remove it from the slot and mark it as removed.",
            parcel.id, parcel.apartment, parcel.slot_id
        )
    }
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whole days a parcel has been waiting at `now`, floored, never negative.
#[must_use]
pub fn days_elapsed(arrived_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - arrived_at).num_days().max(0)
}

/// Identifier of a notification recipient: a resident code or a staff id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ResidentId> for RecipientId {
    fn from(id: &ResidentId) -> Self {
        Self(id.as_str().to_owned())
    }
}

impl From<&StaffId> for RecipientId {
    fn from(id: &StaffId) -> Self {
        Self(id.as_str().to_owned())
    }
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Idempotency key of the notification log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationKey {
    /// Recipient.
    pub recipient_id: RecipientId,
    /// Milestone kind.
    pub milestone: Milestone,
    /// Parcel.
    pub parcel_id: ParcelId,
}

impl std::fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.recipient_id, self.milestone, self.parcel_id)
    }
}

/// Append-only record that a milestone notification was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Recipient.
    pub recipient_id: RecipientId,
    /// Milestone kind.
    pub milestone: Milestone,
    /// Parcel.
    pub parcel_id: ParcelId,
    /// When the notification went out.
    pub sent_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Returns the record's idempotency key.
    #[must_use]
    pub fn key(&self) -> NotificationKey {
        NotificationKey {
            recipient_id: self.recipient_id.clone(),
            milestone: self.milestone,
            parcel_id: self.parcel_id.clone(),
        }
    }
}

/// Escalation position of a parcel, derived from its status and log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscalationState {
    /// Waiting, nothing sent yet.
    AwaitingPickup,
    /// Reminder sent.
    ReminderSent,
    /// Final warning sent.
    FinalWarningSent,
    /// Staff alerted.
    RemovalAlertSent,
    /// Collected or removed; escalation is over.
    Closed,
}

/// Derives the escalation state of `parcel` from the notification log.
///
/// `records` may contain entries for other parcels; they are ignored.
#[must_use]
pub fn escalation_state(parcel: &Parcel, records: &[NotificationRecord]) -> EscalationState {
    if parcel.status != ParcelStatus::AwaitingPickup {
        return EscalationState::Closed;
    }
    let highest = records
        .iter()
        .filter(|r| r.parcel_id == parcel.id)
        .map(|r| r.milestone)
        .max();
    match highest {
        None => EscalationState::AwaitingPickup,
        Some(Milestone::ReminderSent) => EscalationState::ReminderSent,
        Some(Milestone::FinalWarningSent) => EscalationState::FinalWarningSent,
        Some(Milestone::RemovalAlert) => EscalationState::RemovalAlertSent,
    }
}
