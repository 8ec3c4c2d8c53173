//! Error types for `parcelkeep`.
//!
//! Each layer owns a `thiserror` enum; [`ParcelKeepError`] aggregates them
//! for the binary and maps every variant to a process exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::parcel::{ParcelId, ParcelStatus};
use crate::slot::SlotId;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `parcelkeep` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Durable store unavailable or corrupt
    pub const STORE_ERROR: i32 = 4;

    /// Lifecycle rule rejected the operation (validation, conflict, transition)
    pub const LIFECYCLE_ERROR: i32 = 5;

    /// Verification token rejected
    pub const TOKEN_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `parcelkeep` operations.
#[derive(Debug, Error)]
pub enum ParcelKeepError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Durable store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Parcel lifecycle error
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Verification token error
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParcelKeepError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Lifecycle(LifecycleError::DependencyUnavailable(_)) => ExitCode::STORE_ERROR,
            Self::Lifecycle(LifecycleError::InvalidToken(_)) | Self::Token(_) => {
                ExitCode::TOKEN_ERROR
            }
            Self::Lifecycle(_) => ExitCode::LIFECYCLE_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message attached to the `${VAR:?message}` reference
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue, used for both configuration files and
/// intake payloads.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g. `"token.secret"`, `"slotId"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl ValidationIssue {
    /// Creates an error-severity issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - validation failure that blocks the operation
    Error,
    /// Warning - potential issue that does not block the operation
    Warning,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Store Errors
// ============================================================================

/// Uniqueness constraints enforced by the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueIndex {
    /// Parcel identifier
    ParcelId,
    /// `(slot_id, active)`: at most one active parcel per slot
    ActiveSlot,
    /// `(recipient_id, milestone, parcel_id)` notification log key
    NotificationKey,
}

impl std::fmt::Display for UniqueIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ParcelId => "parcel_id",
            Self::ActiveSlot => "slot_id+active",
            Self::NotificationKey => "recipient_id+milestone+parcel_id",
        })
    }
}

/// Durable store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert or update would violate a uniqueness constraint
    #[error("unique constraint {index} violated by '{key}'")]
    UniqueViolation {
        /// The constraint that rejected the write
        index: UniqueIndex,
        /// The conflicting key
        key: String,
    },

    /// The referenced document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// The store cannot serve requests (poisoned lock, unreachable backend)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file I/O failed
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed
    #[error("store snapshot corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Token Errors
// ============================================================================

/// Verification token failures.
///
/// Every validation variant renders as "invalid or expired token" to
/// callers; the variant itself is kept for logs and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not `<payload>.<signature>` or either part fails to decode
    #[error("invalid or expired token")]
    Malformed,

    /// Signature does not match the payload
    #[error("invalid or expired token")]
    InvalidSignature,

    /// Signature is valid but the token is past its expiry
    #[error("invalid or expired token")]
    Expired,

    /// Mint time plus lifetime is past the last representable instant
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
}

impl TokenError {
    /// Short machine-readable reason, for logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::InvalidSignature => "bad_signature",
            Self::Expired => "expired",
            Self::ExpiryOutOfRange => "expiry_out_of_range",
        }
    }
}

// ============================================================================
// Lifecycle Errors
// ============================================================================

/// Parcel lifecycle errors surfaced to the caller of a staff operation.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Intake or transition input failed validation
    #[error("validation failed: {}", summarize(issues))]
    Validation {
        /// All issues found in the input
        issues: Vec<ValidationIssue>,
    },

    /// The requested slot already holds an active parcel
    #[error("slot {slot} is already occupied by an active parcel")]
    SlotConflict {
        /// Slot that was requested
        slot: SlotId,
    },

    /// No parcel with this identifier exists
    #[error("parcel not found: {0}")]
    NotFound(ParcelId),

    /// The parcel's current status does not allow the transition
    #[error("cannot move parcel {parcel} from {from} to {to}")]
    InvalidTransition {
        /// Parcel the transition was attempted on
        parcel: ParcelId,
        /// Current status
        from: ParcelStatus,
        /// Requested status
        to: ParcelStatus,
    },

    /// Verification token rejected
    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    /// A dependency (store, counter) failed; the operation may be retried
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl LifecycleError {
    /// Returns `true` when retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable(_))
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        Self::DependencyUnavailable(err.to_string())
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Resident or staff directory failures.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Directory backend unreachable
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Failure while escalating a single parcel. Caught per parcel by the
/// sweep and counted as failed.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// Store read or write failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Resident or staff lookup failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Notification delivery failures. Always logged, never propagated out of
/// the transition that triggered the notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Delivery did not complete within the configured timeout
    #[error("notification delivery timed out")]
    Timeout,

    /// Delivery backend rejected or failed the message
    #[error("notification delivery failed: {0}")]
    Delivery(String),

}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `parcelkeep` operations.
pub type Result<T> = std::result::Result<T, ParcelKeepError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::STORE_ERROR, 4);
        assert_eq!(ExitCode::LIFECYCLE_ERROR, 5);
        assert_eq!(ExitCode::TOKEN_ERROR, 6);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_lifecycle_exit_codes() {
        let conflict: ParcelKeepError = LifecycleError::SlotConflict {
            slot: SlotId::parse("L5").unwrap(),
        }
        .into();
        assert_eq!(conflict.exit_code(), ExitCode::LIFECYCLE_ERROR);

        let unavailable: ParcelKeepError =
            LifecycleError::DependencyUnavailable("counter".into()).into();
        assert_eq!(unavailable.exit_code(), ExitCode::STORE_ERROR);

        let token: ParcelKeepError = LifecycleError::InvalidToken(TokenError::Expired).into();
        assert_eq!(token.exit_code(), ExitCode::TOKEN_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: ParcelKeepError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_store_error_becomes_dependency_unavailable() {
        let err: LifecycleError = StoreError::Unavailable("lock poisoned".into()).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn test_token_errors_share_caller_message() {
        for err in [
            TokenError::Malformed,
            TokenError::InvalidSignature,
            TokenError::Expired,
        ] {
            assert_eq!(err.to_string(), "invalid or expired token");
        }
        assert_eq!(TokenError::Expired.reason(), "expired");
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue::error("slotId", "unknown slot 'L51'");
        assert_eq!(issue.to_string(), "error: unknown slot 'L51' at slotId");
        let warn = ValidationIssue::warning("directory.staff", "no staff configured");
        assert_eq!(
            warn.to_string(),
            "warning: no staff configured at directory.staff"
        );
    }

    #[test]
    fn test_validation_error_lists_every_issue() {
        let err = LifecycleError::Validation {
            issues: vec![
                ValidationIssue::error("apartment", "required"),
                ValidationIssue::error("category", "required"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("apartment"));
        assert!(msg.contains("category"));
    }

    #[test]
    fn test_config_error_env_var_display() {
        let err = ConfigError::EnvVarNotSet {
            var: "PARCELKEEP_TOKEN_SECRET".to_string(),
            location: "token secret is required".to_string(),
        };
        assert!(err.to_string().contains("PARCELKEEP_TOKEN_SECRET"));
    }
}
