//! Verification tokens.
//!
//! A token is a self-contained capability binding a parcel id to a slot id:
//!
//! ```text
//! base64url(payload JSON) "." base64url(HMAC-SHA256(secret, payload JSON))
//! ```
//!
//! Validation is a pure signature and expiry check. It never reads the
//! store, so a printed QR code stays verifiable on its own; a token for a
//! parcel that has since been collected still validates, and callers that
//! care must cross-check the parcel's status themselves.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ConfigError, TokenError};
use crate::parcel::ParcelId;
use crate::slot::SlotId;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted token lifetime.
pub const MAX_TTL: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 60 * 60);

/// The token bundle stored on a parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationToken {
    /// Opaque signed token.
    pub token: String,
    /// Verification URL encoded into the QR label.
    pub url: String,
    /// Instant after which the token no longer validates.
    pub expires_at: DateTime<Utc>,
}

/// What a valid token proves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Parcel the token was minted for.
    pub parcel_id: ParcelId,
    /// Slot the parcel was stored in at mint time.
    pub slot_id: SlotId,
    /// Mint time.
    pub issued_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

/// Signed payload. Field names are short to keep QR codes small.
#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    pid: ParcelId,
    sid: SlotId,
    iat: i64,
    exp: i64,
}

/// Mints and validates verification tokens.
#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
    ttl: Duration,
    verify_base_url: String,
}

// The keyed MAC must never end up in logs.
impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("verify_base_url", &self.verify_base_url)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes or the TTL is zero or longer than
    /// [`MAX_TTL`].
    pub fn new(
        secret: &[u8],
        ttl: std::time::Duration,
        verify_base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                field: "token.secret".to_owned(),
                value: format!("{} bytes", secret.len()),
                expected: format!("at least {MIN_SECRET_LEN} bytes"),
            });
        }
        let ttl = Duration::from_std(ttl)
            .ok()
            .filter(|d| *d > Duration::zero() && ttl <= MAX_TTL)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "token.ttl".to_owned(),
                value: humantime::format_duration(ttl).to_string(),
                expected: format!(
                    "a positive duration of at most {}",
                    humantime::format_duration(MAX_TTL)
                ),
            })?;
        let mac = HmacSha256::new_from_slice(secret).map_err(|e| ConfigError::InvalidValue {
            field: "token.secret".to_owned(),
            value: "<redacted>".to_owned(),
            expected: e.to_string(),
        })?;

        Ok(Self {
            mac,
            ttl,
            verify_base_url: verify_base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Returns the configured lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a token for `parcel_id` stored in `slot_id`, valid from `now`
    /// for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::ExpiryOutOfRange`] if `now` plus the lifetime
    /// is not a representable instant.
    pub fn mint(
        &self,
        parcel_id: &ParcelId,
        slot_id: &SlotId,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let payload = Payload {
            pid: parcel_id.clone(),
            sid: slot_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        // Serializing two strings and two integers cannot fail.
        let body = serde_json::to_vec(&payload).unwrap_or_default();
        let signature = self.sign(&body);

        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(signature)
        );
        let url = format!("{}/verify/{token}", self.verify_base_url);

        Ok(VerificationToken {
            token,
            url,
            expires_at: Utc
                .timestamp_opt(payload.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Validates a token's signature and expiry at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if the token cannot be decoded,
    /// [`TokenError::InvalidSignature`] if it was not signed with this
    /// service's secret or was altered, and [`TokenError::Expired`] once
    /// `now` reaches the expiry.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let (body_b64, sig_b64) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let body = URL_SAFE_NO_PAD
            .decode(body_b64)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(&body);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload: Payload = serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;
        let issued_at = Utc
            .timestamp_opt(payload.iat, 0)
            .single()
            .ok_or(TokenError::Malformed)?;
        let expires_at = Utc
            .timestamp_opt(payload.exp, 0)
            .single()
            .ok_or(TokenError::Malformed)?;

        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        Ok(TokenClaims {
            parcel_id: payload.pid,
            slot_id: payload.sid,
            issued_at,
            expires_at,
        })
    }

    fn sign(&self, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}
