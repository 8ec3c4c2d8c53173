//! Notifier that logs emails and keeps in-app notices in memory.
//!
//! Used when no webhook is configured, so a desk can run standalone with
//! notifications visible in the log stream.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use super::{EmailMessage, InAppMessage, Notifier};
use crate::error::NotifyError;
use crate::escalation::RecipientId;

/// A stored in-app notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppNotice {
    /// Record id.
    pub id: String,
    /// Notice title.
    pub title: String,
    /// Notice text.
    pub message: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Logging notifier with an in-memory inbox per recipient.
#[derive(Debug, Default)]
pub struct LogNotifier {
    inbox: DashMap<RecipientId, Vec<InAppNotice>>,
    emails_sent: AtomicU64,
}

impl LogNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices created for `recipient`, oldest first.
    #[must_use]
    pub fn inbox(&self, recipient: &RecipientId) -> Vec<InAppNotice> {
        self.inbox
            .get(recipient)
            .map(|notices| notices.value().clone())
            .unwrap_or_default()
    }

    /// Number of emails logged so far.
    #[must_use]
    pub fn emails_sent(&self) -> u64 {
        self.emails_sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn create_in_app(&self, message: &InAppMessage) -> Result<String, NotifyError> {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            recipient = %message.user_id,
            notice_id = %id,
            title = %message.title,
            "in-app notice created"
        );
        self.inbox
            .entry(message.user_id.clone())
            .or_default()
            .push(InAppNotice {
                id: id.clone(),
                title: message.title.clone(),
                message: message.message.clone(),
                created_at: Utc::now(),
            });
        Ok(id)
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        info!(to = %message.to, subject = %message.subject, "email sent");
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
