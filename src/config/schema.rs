//! Configuration file schema.
//!
//! ```yaml
//! desk:
//!   verify_base_url: https://desk.example.org
//!   parcel_id_prefix: P
//! token:
//!   secret: ${PARCELKEEP_TOKEN_SECRET:?token secret is required}
//!   ttl: 7d
//! store:
//!   kind: file
//!   path: /var/lib/parcelkeep/store.json
//! notifier:
//!   kind: webhook
//!   url: https://notify.internal/hooks/desk
//!   timeout: 10s
//! sweep:
//!   interval: 24h
//!   run_on_start: true
//! http:
//!   bind: 0.0.0.0:8080
//! events:
//!   sink: stderr
//! directory:
//!   residents:
//!     - { id: R-100, apartment: 4B, email: ana@example.org, display_name: Ana }
//!   staff:
//!     - { id: S-1, email: desk@example.org }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::{Resident, Staff};

/// Root of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParcelKeepConfig {
    /// Desk identity.
    #[serde(default)]
    pub desk: DeskConfig,
    /// Verification token signing.
    pub token: TokenConfig,
    /// Durable store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Outbound notifications.
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Escalation scheduling.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// HTTP API.
    #[serde(default)]
    pub http: HttpConfig,
    /// Slot event stream.
    #[serde(default)]
    pub events: EventsConfig,
    /// Residents and staff.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// `desk` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeskConfig {
    /// Base URL verification links point to.
    pub verify_base_url: String,
    /// Prefix of generated parcel identifiers.
    pub parcel_id_prefix: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            verify_base_url: "http://localhost:8080".to_owned(),
            parcel_id_prefix: crate::sequence::DEFAULT_PARCEL_PREFIX.to_owned(),
        }
    }
}

/// `token` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// HMAC signing secret, at least 32 bytes.
    pub secret: String,
    /// Token lifetime.
    #[serde(default = "default_token_ttl", with = "humantime_duration")]
    pub ttl: Duration,
}

const fn default_token_ttl() -> Duration {
    crate::token::DEFAULT_TTL
}

/// `store` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum StoreConfig {
    /// Process memory; contents are lost on exit.
    #[default]
    Memory,
    /// JSON snapshot file.
    File {
        /// Snapshot path.
        path: PathBuf,
    },
}

/// Notifier backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Log emails and keep in-app notices in memory.
    #[default]
    Log,
    /// POST every delivery to `url`.
    Webhook,
}

/// `notifier` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotifierConfig {
    /// Backend.
    pub kind: NotifierKind,
    /// Webhook endpoint, required for `kind: webhook`.
    pub url: Option<String>,
    /// Bound on each delivery call.
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            url: None,
            timeout: crate::notify::DEFAULT_TIMEOUT,
        }
    }
}

/// `sweep` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SweepConfig {
    /// Run the scheduler under `serve`.
    pub enabled: bool,
    /// Time between sweeps.
    #[serde(with = "humantime_duration")]
    pub interval: Duration,
    /// Sweep once as soon as `serve` starts.
    pub run_on_start: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: crate::escalation::scheduler::DEFAULT_INTERVAL,
            run_on_start: false,
        }
    }
}

/// `http` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    /// Listen address for `serve`.
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Where slot events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSink {
    /// JSONL on stderr.
    #[default]
    Stderr,
    /// JSONL on stdout.
    Stdout,
    /// JSONL appended to `events.path`.
    File,
    /// Dropped.
    Discard,
}

/// `events` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EventsConfig {
    /// Sink.
    pub sink: EventSink,
    /// File path for `sink: file`.
    pub path: Option<PathBuf>,
}

/// `directory` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DirectoryConfig {
    /// Residents.
    pub residents: Vec<Resident>,
    /// Staff accounts.
    pub staff: Vec<Staff>,
}

/// Serde adapter for `humantime` strings such as `10s`, `24h`, `7d`.
pub mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes as a humantime string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Deserializes from a humantime string.
    ///
    /// # Errors
    ///
    /// Fails on strings humantime cannot parse.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: ParcelKeepConfig =
            serde_yaml::from_str("token:\n  secret: abc\n").unwrap();
        assert_eq!(config.token.ttl, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.notifier.kind, NotifierKind::Log);
        assert_eq!(config.notifier.timeout, Duration::from_secs(10));
        assert_eq!(config.sweep.interval, Duration::from_secs(24 * 3600));
        assert!(config.sweep.enabled);
        assert_eq!(config.desk.parcel_id_prefix, "P");
        assert_eq!(config.http.bind.port(), 8080);
    }

    #[test]
    fn humantime_fields_parse() {
        let yaml = "\
token:
  secret: abc
  ttl: 3d 12h
notifier:
  timeout: 1500ms
sweep:
  interval: 6h
store:
  kind: file
  path: /tmp/store.json
";
        let config: ParcelKeepConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.token.ttl, Duration::from_secs(84 * 3600));
        assert_eq!(config.notifier.timeout, Duration::from_millis(1500));
        assert_eq!(config.sweep.interval, Duration::from_secs(6 * 3600));
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: PathBuf::from("/tmp/store.json")
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ParcelKeepConfig, _> =
            serde_yaml::from_str("token:\n  secret: abc\n  sekret: typo\n");
        assert!(result.is_err());
    }

    #[test]
    fn bad_duration_is_rejected() {
        let result: Result<ParcelKeepConfig, _> =
            serde_yaml::from_str("token:\n  secret: abc\n  ttl: soon\n");
        assert!(result.is_err());
    }
}
