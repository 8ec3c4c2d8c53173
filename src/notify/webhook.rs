//! Notifier that forwards every delivery to an HTTP endpoint.
//!
//! Each call is a `POST` of a JSON document tagged with `kind`:
//!
//! ```json
//! {"kind": "email", "to": "...", "subject": "...", "body": "..."}
//! {"kind": "inApp", "userId": "...", "title": "...", "message": "..."}
//! ```
//!
//! For in-app notices the endpoint may answer `{"id": "..."}`; otherwise a
//! local id is generated. Any non-2xx status is a delivery failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmailMessage, InAppMessage, Notifier};
use crate::error::{ConfigError, NotifyError};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Envelope<'a> {
    Email(&'a EmailMessage),
    InApp(&'a InAppMessage),
}

#[derive(Deserialize)]
struct CreatedNotice {
    id: String,
}

/// HTTP webhook notifier.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Creates a notifier posting to `url`. Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the HTTP client cannot be
    /// built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "notifier.url".to_owned(),
                value: "<client>".to_owned(),
                expected: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Posts `envelope` and returns the response body.
    async fn post(&self, envelope: &Envelope<'_>) -> Result<String, NotifyError> {
        debug!(url = %self.url, "posting notification");
        let request = self.client.post(&self.url).json(envelope).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| NotifyError::Timeout)?
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook answered HTTP {}",
                status.as_u16()
            )));
        }

        tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| NotifyError::Timeout)?
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn create_in_app(&self, message: &InAppMessage) -> Result<String, NotifyError> {
        let body = self.post(&Envelope::InApp(message)).await?;
        Ok(serde_json::from_str::<CreatedNotice>(&body)
            .map_or_else(|_| uuid::Uuid::new_v4().to_string(), |created| created.id))
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        self.post(&Envelope::Email(message)).await.map(|_| ())
    }
}
