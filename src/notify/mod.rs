//! Outbound notifications.
//!
//! The [`Notifier`] trait is the boundary to the platform's email and
//! in-app notification services. Callers go through a [`Dispatcher`],
//! which bounds every call with a timeout; delivery is always best-effort
//! and failures come back as [`NotifyError`] for the caller to log.

pub mod log;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotifyError;
use crate::escalation::RecipientId;

pub use log::{InAppNotice, LogNotifier};
pub use webhook::WebhookNotifier;

/// Default bound on a single delivery call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// An in-app notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppMessage {
    /// Resident code or staff id.
    pub user_id: RecipientId,
    /// Notice title.
    pub title: String,
    /// Notice text.
    pub message: String,
}

/// Email and in-app delivery.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Creates an in-app notice and returns its record id.
    async fn create_in_app(&self, message: &InAppMessage) -> Result<String, NotifyError>;

    /// Sends an email.
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Wraps a [`Notifier`] with a per-call timeout.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Configured per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends an email within the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Timeout`] when the call does not finish in
    /// time, or the notifier's own error.
    pub async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        tokio::time::timeout(self.timeout, self.notifier.send_email(message))
            .await
            .map_err(|_| NotifyError::Timeout)?
    }

    /// Creates an in-app notice within the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Timeout`] when the call does not finish in
    /// time, or the notifier's own error.
    pub async fn create_in_app(&self, message: &InAppMessage) -> Result<String, NotifyError> {
        tokio::time::timeout(self.timeout, self.notifier.create_in_app(message))
            .await
            .map_err(|_| NotifyError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaffId;

    #[derive(Debug)]
    struct Stalled;

    #[async_trait]
    impl Notifier for Stalled {
        async fn create_in_app(&self, _: &InAppMessage) -> Result<String, NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_owned())
        }

        async fn send_email(&self, _: &EmailMessage) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_delivery_times_out() {
        let dispatcher = Dispatcher::new(Arc::new(Stalled), Duration::from_secs(10));
        let email = EmailMessage {
            to: "a@example.org".to_owned(),
            subject: "s".to_owned(),
            body: "b".to_owned(),
        };
        assert!(matches!(
            dispatcher.send_email(&email).await,
            Err(NotifyError::Timeout)
        ));

        let notice = InAppMessage {
            user_id: RecipientId::from(&StaffId::new("S-1")),
            title: "t".to_owned(),
            message: "m".to_owned(),
        };
        assert!(matches!(
            dispatcher.create_in_app(&notice).await,
            Err(NotifyError::Timeout)
        ));
    }

    #[test]
    fn in_app_message_serializes_camel_case() {
        let notice = InAppMessage {
            user_id: RecipientId::from(&StaffId::new("S-1")),
            title: "t".to_owned(),
            message: "m".to_owned(),
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["userId"], "S-1");
    }
}
