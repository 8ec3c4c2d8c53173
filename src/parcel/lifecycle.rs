//! Parcel lifecycle: intake, collection, removal, and token verification.
//!
//! ```text
//! intake ──► AwaitingPickup ──┬──► Collected   (terminal)
//!                             └──► Removed     (terminal)
//! ```
//!
//! Slot exclusivity is decided by the store's `(slot, active)` index; the
//! pre-check in [`LifecycleManager::intake`] only avoids burning a sequence
//! number on an obvious conflict. Every occupancy change publishes a
//! `slotUpdated` event, and resident notices are best-effort.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{IntakeDetails, Parcel, ParcelFilter, ParcelId, ParcelStatus};
use crate::clock::Clock;
use crate::directory::{ResidentDirectory, resolve_resident};
use crate::error::{LifecycleError, StoreError, UniqueIndex, ValidationIssue};
use crate::escalation::{EscalationState, RecipientId, escalation_state};
use crate::notify::{Dispatcher, EmailMessage, InAppMessage};
use crate::observability::metrics::{self, NotificationOutcome};
use crate::observability::{EventBroadcaster, publish_slot_update};
use crate::sequence::{DEFAULT_PARCEL_PREFIX, PARCEL_COUNTER, SequenceGenerator};
use crate::slot::SlotStatus;
use crate::store::Store;
use crate::token::{TokenClaims, TokenService};

/// A parcel together with its derived escalation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelListing {
    /// The parcel record.
    #[serde(flatten)]
    pub parcel: Parcel,
    /// Where the parcel stands in the escalation sequence.
    pub escalation: EscalationState,
}

/// Resident notices sent on lifecycle transitions.
#[derive(Debug, Clone, Copy)]
enum Notice {
    Arrived,
    Collected,
}

impl Notice {
    const fn label(self) -> &'static str {
        match self {
            Self::Arrived => "intake",
            Self::Collected => "collected",
        }
    }

    fn title(self, parcel: &Parcel) -> String {
        match self {
            Self::Arrived => format!("Parcel {} has arrived", parcel.id),
            Self::Collected => format!("Parcel {} has been collected", parcel.id),
        }
    }

    fn body(self, parcel: &Parcel) -> String {
        match self {
            Self::Arrived => format!(
                "Your parcel {} ({}) is waiting at the front desk in slot {}. \
                 Show this verification code when you pick it up: {}",
                parcel.id, parcel.category, parcel.slot_id, parcel.token.url
            ),
            Self::Collected => format!(
                "Your parcel {} was collected by {} on {}.",
                parcel.id,
                parcel.collected_by.as_deref().unwrap_or("an authorised person"),
                parcel
                    .collected_at
                    .map_or_else(String::new, |at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            ),
        }
    }
}

/// Owns parcel creation and every status transition.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    store: Arc<dyn Store>,
    sequence: SequenceGenerator,
    tokens: Arc<TokenService>,
    events: Arc<dyn EventBroadcaster>,
    residents: Arc<dyn ResidentDirectory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    id_prefix: String,
}

impl LifecycleManager {
    /// Creates a manager using the default `P` identifier prefix.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        tokens: Arc<TokenService>,
        events: Arc<dyn EventBroadcaster>,
        residents: Arc<dyn ResidentDirectory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sequence: SequenceGenerator::new(Arc::clone(&store)),
            store,
            tokens,
            events,
            residents,
            dispatcher,
            clock,
            id_prefix: DEFAULT_PARCEL_PREFIX.to_owned(),
        }
    }

    /// Replaces the parcel identifier prefix.
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Registers a new parcel in the requested slot.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] listing every missing field and an
    ///   out-of-range slot
    /// - [`LifecycleError::SlotConflict`] if the slot holds an active parcel
    /// - [`LifecycleError::DependencyUnavailable`] if the counter or the
    ///   store fails; nothing is persisted in that case
    pub async fn intake(&self, details: &IntakeDetails) -> Result<Parcel, LifecycleError> {
        let valid = details
            .validate()
            .map_err(|issues| LifecycleError::Validation { issues })?;

        if let Some(holder) = self.store.active_parcel_in(&valid.slot_id).await? {
            debug!(slot = %valid.slot_id, holder = %holder, "intake rejected by pre-check");
            metrics::record_slot_conflict();
            return Err(LifecycleError::SlotConflict {
                slot: valid.slot_id,
            });
        }

        let id = ParcelId::new(
            self.sequence
                .next_identifier(PARCEL_COUNTER, &self.id_prefix)
                .await?,
        );
        let now = self.clock.now();
        let token = self
            .tokens
            .mint(&id, &valid.slot_id, now)
            .map_err(|e| LifecycleError::DependencyUnavailable(format!("clock: {e}")))?;

        let parcel = Parcel {
            id,
            resident_id: valid.resident_id,
            apartment: valid.apartment,
            category: valid.category,
            description: valid.description,
            courier: valid.courier,
            notes: valid.notes,
            slot_id: valid.slot_id,
            received_by: valid.received_by,
            arrived_at: now,
            status: ParcelStatus::AwaitingPickup,
            collected_at: None,
            collected_by: None,
            removed_at: None,
            token,
        };

        match self.store.insert_parcel(&parcel).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation {
                index: UniqueIndex::ActiveSlot,
                ..
            }) => {
                debug!(slot = %parcel.slot_id, parcel_id = %parcel.id, "intake lost the slot race");
                metrics::record_slot_conflict();
                return Err(LifecycleError::SlotConflict {
                    slot: parcel.slot_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            parcel_id = %parcel.id,
            slot = %parcel.slot_id,
            apartment = %parcel.apartment,
            received_by = %parcel.received_by,
            "parcel received"
        );
        metrics::record_intake();
        publish_slot_update(self.events.as_ref(), &parcel.slot_id, SlotStatus::Occupied);
        self.notify_resident(&parcel, Notice::Arrived).await;

        Ok(parcel)
    }

    /// Marks a parcel as collected by `collector`.
    ///
    /// `collected_at` defaults to the clock's current time.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] if `collector` is blank or
    ///   `collected_at` precedes the arrival
    /// - [`LifecycleError::NotFound`] for an unknown parcel
    /// - [`LifecycleError::InvalidTransition`] if the parcel is terminal
    /// - [`LifecycleError::DependencyUnavailable`] if the store fails
    pub async fn mark_collected(
        &self,
        id: &ParcelId,
        collector: &str,
        collected_at: Option<DateTime<Utc>>,
    ) -> Result<Parcel, LifecycleError> {
        let collector = collector.trim();
        if collector.is_empty() {
            return Err(LifecycleError::Validation {
                issues: vec![ValidationIssue::error("collector", "collector is required")],
            });
        }

        let mut parcel = self.load_active(id, ParcelStatus::Collected).await?;
        let at = collected_at.unwrap_or_else(|| self.clock.now());
        if at < parcel.arrived_at {
            return Err(LifecycleError::Validation {
                issues: vec![ValidationIssue::error(
                    "collectedAt",
                    format!(
                        "collection time {} precedes arrival {}",
                        at.to_rfc3339(),
                        parcel.arrived_at.to_rfc3339()
                    ),
                )],
            });
        }

        parcel.status = ParcelStatus::Collected;
        parcel.collected_by = Some(collector.to_owned());
        parcel.collected_at = Some(at);
        self.persist_transition(&parcel).await?;

        info!(parcel_id = %parcel.id, slot = %parcel.slot_id, collector, "parcel collected");
        self.notify_resident(&parcel, Notice::Collected).await;
        Ok(parcel)
    }

    /// Takes a parcel out of its slot without a pickup.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] for an unknown parcel
    /// - [`LifecycleError::InvalidTransition`] if the parcel is terminal
    /// - [`LifecycleError::DependencyUnavailable`] if the store fails
    pub async fn mark_removed(&self, id: &ParcelId) -> Result<Parcel, LifecycleError> {
        let mut parcel = self.load_active(id, ParcelStatus::Removed).await?;
        parcel.status = ParcelStatus::Removed;
        parcel.removed_at = Some(self.clock.now());
        self.persist_transition(&parcel).await?;

        info!(parcel_id = %parcel.id, slot = %parcel.slot_id, "parcel removed from slot");
        Ok(parcel)
    }

    /// Checks a verification token's signature and expiry. Never reads the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidToken`] for a malformed, tampered,
    /// or expired token.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, LifecycleError> {
        self.tokens
            .validate(token, self.clock.now())
            .map_err(|e| {
                debug!(reason = e.reason(), "verification token rejected");
                metrics::record_token_rejection(e.reason());
                LifecycleError::InvalidToken(e)
            })
    }

    /// Fetches one parcel.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for an unknown id.
    pub async fn get(&self, id: &ParcelId) -> Result<Parcel, LifecycleError> {
        self.store
            .get_parcel(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    /// Lists parcels matching `filter`, oldest arrival first.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DependencyUnavailable`] if the store fails.
    pub async fn list(&self, filter: &ParcelFilter) -> Result<Vec<Parcel>, LifecycleError> {
        Ok(self.store.list_parcels(filter).await?)
    }

    /// Lists parcels with their escalation state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DependencyUnavailable`] if the store fails.
    pub async fn list_with_escalation(
        &self,
        filter: &ParcelFilter,
    ) -> Result<Vec<ParcelListing>, LifecycleError> {
        let parcels = self.store.list_parcels(filter).await?;
        let records = self.store.list_notifications(None).await?;
        Ok(parcels
            .into_iter()
            .map(|parcel| ParcelListing {
                escalation: escalation_state(&parcel, &records),
                parcel,
            })
            .collect())
    }

    /// Loads a parcel that is about to move to `to`, rejecting terminal ones.
    async fn load_active(&self, id: &ParcelId, to: ParcelStatus) -> Result<Parcel, LifecycleError> {
        let parcel = self.get(id).await?;
        if parcel.status.is_terminal() {
            warn!(parcel_id = %id, from = %parcel.status, to = %to, "transition on terminal parcel rejected");
            return Err(LifecycleError::InvalidTransition {
                parcel: id.clone(),
                from: parcel.status,
                to,
            });
        }
        Ok(parcel)
    }

    async fn persist_transition(&self, parcel: &Parcel) -> Result<(), LifecycleError> {
        self.store
            .update_parcel(parcel)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => LifecycleError::NotFound(parcel.id.clone()),
                other => other.into(),
            })?;
        metrics::record_transition(parcel.status);
        publish_slot_update(self.events.as_ref(), &parcel.slot_id, SlotStatus::Available);
        Ok(())
    }

    /// Sends `notice` to the parcel's resident. Failures are logged only.
    async fn notify_resident(&self, parcel: &Parcel, notice: Notice) {
        let resident = match resolve_resident(
            self.residents.as_ref(),
            parcel.resident_id.as_ref(),
            &parcel.apartment,
        )
        .await
        {
            Ok(Some(resident)) => resident,
            Ok(None) => {
                warn!(parcel_id = %parcel.id, apartment = %parcel.apartment, "no resident on file, notice skipped");
                metrics::record_notification(notice.label(), NotificationOutcome::Skipped);
                return;
            }
            Err(e) => {
                warn!(parcel_id = %parcel.id, error = %e, "resident lookup failed, notice skipped");
                metrics::record_notification(notice.label(), NotificationOutcome::Failed);
                return;
            }
        };

        let title = notice.title(parcel);
        let body = notice.body(parcel);

        if let Err(e) = self
            .dispatcher
            .create_in_app(&InAppMessage {
                user_id: RecipientId::from(&resident.id),
                title: title.clone(),
                message: body.clone(),
            })
            .await
        {
            warn!(parcel_id = %parcel.id, recipient = %resident.id, error = %e, "in-app notice failed");
        }

        let Some(email) = resident.email else {
            debug!(parcel_id = %parcel.id, recipient = %resident.id, "resident has no email");
            metrics::record_notification(notice.label(), NotificationOutcome::Skipped);
            return;
        };
        let outcome = match self
            .dispatcher
            .send_email(&EmailMessage {
                to: email,
                subject: title,
                body,
            })
            .await
        {
            Ok(()) => NotificationOutcome::Sent,
            Err(e) => {
                warn!(parcel_id = %parcel.id, recipient = %resident.id, error = %e, "email failed");
                NotificationOutcome::Failed
            }
        };
        metrics::record_notification(notice.label(), outcome);
    }
}
