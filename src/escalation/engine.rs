//! The escalation sweep.
//!
//! For every parcel awaiting pickup the sweep computes whole days elapsed
//! and walks the milestones in order. Each send follows the same steps:
//!
//! 1. resolve the recipient
//! 2. skip if the notification log already holds `(recipient, milestone, parcel)`
//! 3. send the email; on failure stop here so a later sweep can retry
//! 4. create the in-app notice (failure is logged only)
//! 5. append the log record
//!
//! A crash between 3 and 5 can send the same milestone twice; that window
//! is accepted. Milestones are isolated from each other: a failed resident
//! lookup does not hold back the staff alert for the same parcel. A parcel
//! with any failed milestone is counted once in [`SweepReport::failed`].
//!
//! Final warnings and removal alerts are only due on their exact day, so a
//! delivery that fails on that day is retried only by another sweep on the
//! same day. Reminders keep retrying until they succeed.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::milestone::{
    Audience, Milestone, NotificationKey, NotificationRecord, RecipientId, days_elapsed,
};
use crate::clock::Clock;
use crate::directory::{ResidentDirectory, Staff, StaffDirectory, resolve_resident};
use crate::error::{EscalationError, StoreError};
use crate::notify::{Dispatcher, EmailMessage, InAppMessage};
use crate::observability::metrics::{self, NotificationOutcome};
use crate::parcel::{Parcel, ParcelFilter};
use crate::store::Store;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Instant the sweep evaluated elapsed days against.
    pub at: DateTime<Utc>,
    /// Parcels awaiting pickup that were examined.
    pub scanned: usize,
    /// Reminders sent.
    pub reminders: usize,
    /// Final warnings sent.
    pub final_warnings: usize,
    /// Staff removal alerts sent.
    pub removal_alerts: usize,
    /// Due notifications already present in the log.
    pub already_sent: usize,
    /// Due notifications skipped for a missing recipient or email.
    pub skipped: usize,
    /// Emails that failed or timed out. Nothing is recorded, so a reminder
    /// goes out again on the next sweep; final warnings and removal alerts
    /// are only retried by another sweep on the same day.
    pub delivery_failures: usize,
    /// Parcels where at least one milestone hit a store or directory error.
    pub failed: usize,
}

impl SweepReport {
    /// Total notifications sent in this sweep.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.reminders + self.final_warnings + self.removal_alerts
    }

    const fn count_sent(&mut self, milestone: Milestone) {
        match milestone {
            Milestone::ReminderSent => self.reminders += 1,
            Milestone::FinalWarningSent => self.final_warnings += 1,
            Milestone::RemovalAlert => self.removal_alerts += 1,
        }
    }
}

/// One notification ready to go out.
struct Outgoing {
    key: NotificationKey,
    email: String,
    subject: String,
    body: String,
}

/// Drives the day-4 / day-10 / day-14 notification sequence.
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    store: Arc<dyn Store>,
    residents: Arc<dyn ResidentDirectory>,
    staff: Arc<dyn StaffDirectory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

impl EscalationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        residents: Arc<dyn ResidentDirectory>,
        staff: Arc<dyn StaffDirectory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            residents,
            staff,
            dispatcher,
            clock,
        }
    }

    /// Runs a sweep at the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only if the active parcels cannot be listed.
    pub async fn run_once(&self) -> Result<SweepReport, StoreError> {
        self.sweep(self.clock.now()).await
    }

    /// Runs a sweep evaluating elapsed days at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only if the active parcels cannot be listed;
    /// per-parcel failures are counted in [`SweepReport::failed`].
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let parcels = self.store.list_parcels(&ParcelFilter::active()).await?;
        let mut report = SweepReport {
            at: now,
            ..SweepReport::default()
        };
        let mut staff: Option<Vec<Staff>> = None;

        for parcel in &parcels {
            report.scanned += 1;
            if !self.escalate(parcel, now, &mut staff, &mut report).await {
                report.failed += 1;
            }
        }

        metrics::record_sweep(started.elapsed());
        info!(
            at = %now,
            scanned = report.scanned,
            reminders = report.reminders,
            final_warnings = report.final_warnings,
            removal_alerts = report.removal_alerts,
            skipped = report.skipped,
            delivery_failures = report.delivery_failures,
            failed = report.failed,
            "escalation sweep finished"
        );
        Ok(report)
    }

    /// Runs every due milestone for one parcel. A failing milestone does
    /// not stop the others; returns `false` if any of them failed.
    async fn escalate(
        &self,
        parcel: &Parcel,
        now: DateTime<Utc>,
        staff: &mut Option<Vec<Staff>>,
        report: &mut SweepReport,
    ) -> bool {
        let days = days_elapsed(parcel.arrived_at, now);
        let mut clean = true;
        for milestone in Milestone::ALL.into_iter().filter(|m| m.is_due(days)) {
            let outcome = match milestone.audience() {
                Audience::Resident => {
                    self.notify_resident(parcel, milestone, days, now, report)
                        .await
                }
                Audience::Staff => self.alert_staff(parcel, staff, days, now, report).await,
            };
            if let Err(e) = outcome {
                clean = false;
                metrics::record_notification(milestone.label(), NotificationOutcome::Failed);
                warn!(
                    parcel_id = %parcel.id,
                    milestone = %milestone,
                    error = %e,
                    "escalation milestone failed for parcel"
                );
            }
        }
        clean
    }

    async fn notify_resident(
        &self,
        parcel: &Parcel,
        milestone: Milestone,
        days: i64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EscalationError> {
        // A resident code on the parcel is the log key; checking it first
        // keeps an already-sent milestone off the directory.
        if let Some(resident_id) = &parcel.resident_id {
            let key = NotificationKey {
                recipient_id: RecipientId::from(resident_id),
                milestone,
                parcel_id: parcel.id.clone(),
            };
            if self.already_recorded(&key, report).await? {
                return Ok(());
            }
        }

        let Some(resident) = resolve_resident(
            self.residents.as_ref(),
            parcel.resident_id.as_ref(),
            &parcel.apartment,
        )
        .await?
        else {
            warn!(
                parcel_id = %parcel.id,
                apartment = %parcel.apartment,
                milestone = %milestone,
                "no resident on file, skipping this sweep"
            );
            report.skipped += 1;
            metrics::record_notification(milestone.label(), NotificationOutcome::Skipped);
            return Ok(());
        };

        let key = NotificationKey {
            recipient_id: RecipientId::from(&resident.id),
            milestone,
            parcel_id: parcel.id.clone(),
        };
        if parcel.resident_id.as_ref() != Some(&resident.id)
            && self.already_recorded(&key, report).await?
        {
            return Ok(());
        }

        let Some(email) = resident.email.clone() else {
            warn!(
                parcel_id = %parcel.id,
                recipient = %resident.id,
                milestone = %milestone,
                "resident has no email, skipping this sweep"
            );
            report.skipped += 1;
            metrics::record_notification(milestone.label(), NotificationOutcome::Skipped);
            return Ok(());
        };

        let outgoing = Outgoing {
            key,
            email,
            subject: milestone.subject(parcel),
            body: milestone.resident_body(parcel, &resident, days),
        };
        self.deliver(outgoing, now, report).await?;
        Ok(())
    }

    async fn alert_staff(
        &self,
        parcel: &Parcel,
        staff: &mut Option<Vec<Staff>>,
        days: i64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EscalationError> {
        if staff.is_none() {
            *staff = Some(self.staff.find_all_staff().await?);
        }
        let staff = staff.as_deref().unwrap_or_default();
        if staff.is_empty() {
            warn!(parcel_id = %parcel.id, "removal alert due but no staff accounts exist");
            report.skipped += 1;
            return Ok(());
        }

        let mut last_error = None;
        for member in staff {
            let key = NotificationKey {
                recipient_id: RecipientId::from(&member.id),
                milestone: Milestone::RemovalAlert,
                parcel_id: parcel.id.clone(),
            };
            match self.already_recorded(&key, report).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "removal alert check failed");
                    last_error = Some(e);
                    continue;
                }
            }
            let Some(email) = member.email.clone() else {
                warn!(parcel_id = %parcel.id, recipient = %member.id, "staff member has no email");
                report.skipped += 1;
                metrics::record_notification(
                    Milestone::RemovalAlert.label(),
                    NotificationOutcome::Skipped,
                );
                continue;
            };

            let outgoing = Outgoing {
                key,
                email,
                subject: Milestone::RemovalAlert.subject(parcel),
                body: Milestone::staff_body(parcel, days),
            };
            if let Err(e) = self.deliver(outgoing, now, report).await {
                warn!(parcel_id = %parcel.id, recipient = %member.id, error = %e, "removal alert not recorded");
                last_error = Some(e);
            }
        }
        last_error.map_or(Ok(()), |e| Err(e.into()))
    }

    async fn already_recorded(
        &self,
        key: &NotificationKey,
        report: &mut SweepReport,
    ) -> Result<bool, StoreError> {
        if self.store.notification_exists(key).await? {
            debug!(key = %key, "notification already recorded");
            report.already_sent += 1;
            metrics::record_notification(key.milestone.label(), NotificationOutcome::Duplicate);
            return Ok(true);
        }
        Ok(false)
    }

    async fn deliver(
        &self,
        outgoing: Outgoing,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), StoreError> {
        let Outgoing {
            key,
            email,
            subject,
            body,
        } = outgoing;
        let label = key.milestone.label();

        if let Err(e) = self
            .dispatcher
            .send_email(&EmailMessage {
                to: email,
                subject: subject.clone(),
                body: body.clone(),
            })
            .await
        {
            warn!(key = %key, error = %e, "escalation email failed, nothing recorded");
            report.delivery_failures += 1;
            metrics::record_notification(label, NotificationOutcome::Failed);
            return Ok(());
        }

        if let Err(e) = self
            .dispatcher
            .create_in_app(&InAppMessage {
                user_id: key.recipient_id.clone(),
                title: subject,
                message: body,
            })
            .await
        {
            warn!(key = %key, error = %e, "in-app notice failed after email went out");
        }

        let record = NotificationRecord {
            recipient_id: key.recipient_id.clone(),
            milestone: key.milestone,
            parcel_id: key.parcel_id.clone(),
            sent_at: now,
        };
        match self.store.insert_notification(&record).await {
            Ok(()) => {
                info!(
                    parcel_id = %record.parcel_id,
                    recipient = %record.recipient_id,
                    milestone = %record.milestone,
                    "escalation notification sent"
                );
                report.count_sent(record.milestone);
                metrics::record_notification(label, NotificationOutcome::Sent);
                Ok(())
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(key = %key, "another sweep recorded this notification first");
                report.already_sent += 1;
                metrics::record_notification(label, NotificationOutcome::Duplicate);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
