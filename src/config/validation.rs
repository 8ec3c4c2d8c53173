//! Configuration validation.
//!
//! Runs on the deserialized [`ParcelKeepConfig`] and collects every issue
//! instead of stopping at the first, so `config validate` can report a
//! broken file in one pass.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::schema::{EventSink, NotifierKind, ParcelKeepConfig, StoreConfig};
use crate::error::{Severity, ValidationIssue};
use crate::token::{MAX_TTL, MIN_SECRET_LEN};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that prevent loading.
    pub errors: Vec<ValidationIssue>,
    /// Informational issues.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`, collecting all errors and warnings.
    pub fn validate(&mut self, config: &ParcelKeepConfig) -> ValidationResult {
        self.issues.clear();

        self.validate_desk(config);
        self.validate_token(config);
        self.validate_store(config);
        self.validate_notifier(config);
        self.validate_sweep(config);
        self.validate_events(config);
        self.validate_residents(config);
        self.validate_staff(config);

        let (errors, warnings) = std::mem::take(&mut self.issues)
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        ValidationResult { errors, warnings }
    }

    fn validate_desk(&mut self, config: &ParcelKeepConfig) {
        let url = config.desk.verify_base_url.trim();
        if !is_http_url(url) {
            self.error(
                "desk.verify_base_url",
                format!("'{url}' must be an http:// or https:// URL"),
            );
        }

        let prefix = &config.desk.parcel_id_prefix;
        if prefix.is_empty() {
            self.error("desk.parcel_id_prefix", "prefix must not be empty");
        } else if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.error(
                "desk.parcel_id_prefix",
                format!("'{prefix}' may only contain ASCII letters, digits, '-' and '_'"),
            );
        }
    }

    fn validate_token(&mut self, config: &ParcelKeepConfig) {
        let secret = &config.token.secret;
        if secret.len() < MIN_SECRET_LEN {
            self.error(
                "token.secret",
                format!(
                    "secret is {} bytes, at least {MIN_SECRET_LEN} are required",
                    secret.len()
                ),
            );
        }
        if config.token.ttl.is_zero() {
            self.error("token.ttl", "token lifetime must be positive");
        } else if config.token.ttl > MAX_TTL {
            self.error(
                "token.ttl",
                format!(
                    "token lifetime is {}, at most {} is allowed",
                    humantime::format_duration(config.token.ttl),
                    humantime::format_duration(MAX_TTL)
                ),
            );
        } else if config.token.ttl < Duration::from_secs(24 * 60 * 60) {
            self.warning(
                "token.ttl",
                "tokens expire in under a day; residents may not reach the desk in time",
            );
        }
    }

    fn validate_store(&mut self, config: &ParcelKeepConfig) {
        match &config.store {
            StoreConfig::Memory => self.warning(
                "store.kind",
                "memory store loses every parcel on exit; use `kind: file` for a real desk",
            ),
            StoreConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    self.error("store.path", "file store needs a path");
                }
            }
        }
    }

    fn validate_notifier(&mut self, config: &ParcelKeepConfig) {
        let notifier = &config.notifier;
        match (notifier.kind, notifier.url.as_deref()) {
            (NotifierKind::Webhook, None) => {
                self.error("notifier.url", "webhook notifier needs a url");
            }
            (NotifierKind::Webhook, Some(url)) if !is_http_url(url) => {
                self.error(
                    "notifier.url",
                    format!("'{url}' must be an http:// or https:// URL"),
                );
            }
            (NotifierKind::Log, Some(_)) => {
                self.warning("notifier.url", "url is ignored by the log notifier");
            }
            _ => {}
        }

        if notifier.timeout.is_zero() {
            self.error("notifier.timeout", "timeout must be positive");
        } else if notifier.timeout > Duration::from_secs(60) {
            self.warning(
                "notifier.timeout",
                "timeouts over a minute hold up intake and sweeps on a slow notifier",
            );
        }
    }

    fn validate_sweep(&mut self, config: &ParcelKeepConfig) {
        let interval = config.sweep.interval;
        if interval < Duration::from_secs(1) {
            self.error("sweep.interval", "interval must be at least one second");
        } else if interval < Duration::from_secs(60 * 60) {
            self.warning(
                "sweep.interval",
                "sweeping more than hourly only repeats the same idempotency checks",
            );
        }
    }

    fn validate_events(&mut self, config: &ParcelKeepConfig) {
        match (config.events.sink, &config.events.path) {
            (EventSink::File, None) => self.error("events.path", "file sink needs a path"),
            (EventSink::Stderr | EventSink::Stdout | EventSink::Discard, Some(_)) => {
                self.warning("events.path", "path is only used by the file sink");
            }
            _ => {}
        }
    }

    fn validate_residents(&mut self, config: &ParcelKeepConfig) {
        let mut ids = HashSet::new();
        let mut apartments = HashSet::new();

        for (i, resident) in config.directory.residents.iter().enumerate() {
            let path = format!("directory.residents[{i}]");
            if resident.id.as_str().trim().is_empty() {
                self.error(format!("{path}.id"), "resident id must not be empty");
            } else if !ids.insert(resident.id.as_str()) {
                self.error(
                    format!("{path}.id"),
                    format!("duplicate resident id '{}'", resident.id),
                );
            }
            if resident.apartment.trim().is_empty() {
                self.error(format!("{path}.apartment"), "apartment must not be empty");
            } else if !apartments.insert(resident.apartment.trim().to_ascii_lowercase()) {
                self.warning(
                    format!("{path}.apartment"),
                    format!(
                        "apartment '{}' is listed twice; lookups by apartment use the first",
                        resident.apartment
                    ),
                );
            }
            if resident.display_name.trim().is_empty() {
                self.error(format!("{path}.display_name"), "display name must not be empty");
            }
            if resident.email.is_none() {
                self.warning(
                    format!("{path}.email"),
                    format!(
                        "resident '{}' has no email and will miss reminders",
                        resident.id
                    ),
                );
            }
        }
    }

    fn validate_staff(&mut self, config: &ParcelKeepConfig) {
        let staff = &config.directory.staff;
        if staff.is_empty() {
            self.warning("directory.staff", "no staff configured; removal alerts go nowhere");
        }

        let mut ids = HashSet::new();
        for (i, member) in staff.iter().enumerate() {
            let path = format!("directory.staff[{i}]");
            if !ids.insert(member.id.as_str()) {
                self.error(
                    format!("{path}.id"),
                    format!("duplicate staff id '{}'", member.id),
                );
            }
            if member.email.is_none() {
                self.warning(
                    format!("{path}.email"),
                    format!("staff '{}' has no email and will miss removal alerts", member.id),
                );
            }
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::error(path, message));
    }

    fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::warning(path, message));
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ParcelKeepConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    const VALID: &str = "\
token:
  secret: 0123456789abcdef0123456789abcdef
store:
  kind: file
  path: /var/lib/parcelkeep/store.json
directory:
  residents:
    - { id: R-1, apartment: 4B, email: ana@example.org, display_name: Ana }
  staff:
    - { id: S-1, email: desk@example.org }
";

    #[test]
    fn valid_config_has_no_issues() {
        let result = Validator::new().validate(&parse(VALID));
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn collects_every_error() {
        let config = parse(
            "\
desk:
  verify_base_url: ftp://desk
  parcel_id_prefix: 'P#'
token:
  secret: short
notifier:
  kind: webhook
events:
  sink: file
",
        );
        let result = Validator::new().validate(&config);
        assert_eq!(
            paths(&result.errors),
            [
                "desk.verify_base_url",
                "desk.parcel_id_prefix",
                "token.secret",
                "notifier.url",
                "events.path",
            ]
        );
    }

    #[test]
    fn duplicate_directory_entries() {
        let config = parse(
            "\
token:
  secret: 0123456789abcdef0123456789abcdef
directory:
  residents:
    - { id: R-1, apartment: 4B, email: a@example.org, display_name: Ana }
    - { id: R-1, apartment: 4b, display_name: Ben }
  staff:
    - { id: S-1, email: s@example.org }
    - { id: S-1 }
",
        );
        let result = Validator::new().validate(&config);
        assert_eq!(
            paths(&result.errors),
            ["directory.residents[1].id", "directory.staff[1].id"]
        );
        let warnings = paths(&result.warnings);
        assert!(warnings.contains(&"directory.residents[1].apartment"));
        assert!(warnings.contains(&"directory.residents[1].email"));
        assert!(warnings.contains(&"directory.staff[1].email"));
        assert!(warnings.contains(&"store.kind"));
    }

    #[test]
    fn short_intervals_and_ttls_warn() {
        let config = parse(
            "\
token:
  secret: 0123456789abcdef0123456789abcdef
  ttl: 2h
sweep:
  interval: 5m
",
        );
        let result = Validator::new().validate(&config);
        assert!(result.is_valid());
        let warnings = paths(&result.warnings);
        assert!(warnings.contains(&"token.ttl"));
        assert!(warnings.contains(&"sweep.interval"));
    }

    #[test]
    fn zero_durations_are_errors() {
        let config = parse(
            "\
token:
  secret: 0123456789abcdef0123456789abcdef
  ttl: 0s
notifier:
  timeout: 0s
sweep:
  interval: 0s
",
        );
        let result = Validator::new().validate(&config);
        assert_eq!(
            paths(&result.errors),
            ["token.ttl", "notifier.timeout", "sweep.interval"]
        );
    }

    #[test]
    fn ttl_beyond_a_year_is_an_error() {
        let config = parse(
            "\
token:
  secret: 0123456789abcdef0123456789abcdef
  ttl: 1000000years
",
        );
        let result = Validator::new().validate(&config);
        assert_eq!(paths(&result.errors), ["token.ttl"]);
    }

    #[test]
    fn url_check() {
        assert!(is_http_url("https://desk.example.org"));
        assert!(is_http_url("http://localhost:8080"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("desk.example.org"));
    }
}
