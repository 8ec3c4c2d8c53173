//! Prometheus metrics.
//!
//! Every label value comes from a closed set (`ParcelStatus`, milestone
//! labels, fixed outcome strings), so no caller-controlled text can grow
//! label cardinality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ParcelKeepError;
use crate::parcel::ParcelStatus;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Outcome of one notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Email delivered and record written.
    Sent,
    /// A record already existed; nothing was sent.
    Duplicate,
    /// Recipient could not be resolved or has no email.
    Skipped,
    /// Delivery failed or timed out.
    Failed,
}

impl NotificationOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Duplicate => "duplicate",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Installs the global metrics recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint listens on
/// `127.0.0.1:<port>`. With `None` the recorder is installed without a
/// listener. A second call is a no-op.
///
/// # Errors
///
/// Returns `ParcelKeepError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), ParcelKeepError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| ParcelKeepError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("parcelkeep_intakes_total", "Parcels registered at the desk");
    describe_counter!(
        "parcelkeep_slot_conflicts_total",
        "Intakes rejected because the slot was occupied"
    );
    describe_counter!(
        "parcelkeep_transitions_total",
        "Parcel status transitions by target status"
    );
    describe_counter!(
        "parcelkeep_notifications_total",
        "Notification attempts by kind and outcome"
    );
    describe_counter!(
        "parcelkeep_token_rejections_total",
        "Verification tokens rejected by reason"
    );
    describe_counter!("parcelkeep_sweeps_total", "Completed escalation sweeps");
    describe_histogram!(
        "parcelkeep_sweep_duration_ms",
        "Escalation sweep duration in milliseconds"
    );
    describe_gauge!("parcelkeep_slots_occupied", "Slots holding an active parcel");
}

/// Records a successful intake.
pub fn record_intake() {
    counter!("parcelkeep_intakes_total").increment(1);
}

/// Records an intake rejected by the slot constraint.
pub fn record_slot_conflict() {
    counter!("parcelkeep_slot_conflicts_total").increment(1);
}

/// Records a status transition.
pub fn record_transition(to: ParcelStatus) {
    counter!("parcelkeep_transitions_total", "to" => to.to_string()).increment(1);
}

/// Records one notification attempt. `kind` is a milestone label or a
/// lifecycle notice (`"intake"`, `"collected"`).
pub fn record_notification(kind: &'static str, outcome: NotificationOutcome) {
    counter!(
        "parcelkeep_notifications_total",
        "milestone" => kind,
        "outcome" => outcome.label(),
    )
    .increment(1);
}

/// Records a rejected verification token.
pub fn record_token_rejection(reason: &'static str) {
    counter!("parcelkeep_token_rejections_total", "reason" => reason).increment(1);
}

/// Records a completed sweep.
pub fn record_sweep(duration: Duration) {
    counter!("parcelkeep_sweeps_total").increment(1);
    histogram!("parcelkeep_sweep_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Sets the occupied-slot gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_slots_occupied(count: usize) {
    gauge!("parcelkeep_slots_occupied").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_intake();
        record_slot_conflict();
        record_transition(ParcelStatus::Collected);
        record_notification("reminder", NotificationOutcome::Sent);
        record_notification("intake", NotificationOutcome::Failed);
        record_token_rejection("expired");
        record_sweep(Duration::from_millis(12));
        set_slots_occupied(3);
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(NotificationOutcome::Sent.label(), "sent");
        assert_eq!(NotificationOutcome::Duplicate.label(), "duplicate");
        assert_eq!(NotificationOutcome::Skipped.label(), "skipped");
        assert_eq!(NotificationOutcome::Failed.label(), "failed");
    }
}
