//! Rotating api key entity and secret format.
//!
//! Secrets are exactly [`API_KEY_SECRET_HEX_LENGTH`] hexadecimal characters.
//! Credential classification depends on that width, so key generation and
//! detection must never drift apart.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rpcguard_core::{AppError, AppResult, AuthFailure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CallerId;

/// Number of random bytes in a generated secret.
pub const API_KEY_SECRET_BYTES: usize = 32;

/// Number of hexadecimal characters in a secret.
pub const API_KEY_SECRET_HEX_LENGTH: usize = API_KEY_SECRET_BYTES * 2;

/// Default validity horizon for newly issued keys.
pub const DEFAULT_API_KEY_VALIDITY_DAYS: u32 = 30;

#[allow(clippy::expect_used)]
static API_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{64}$").expect("api key pattern is a valid regex")
});

/// Unique identifier for an api key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Creates a new random api key identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an api key identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Plaintext api key secret. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeySecret(String);

impl ApiKeySecret {
    /// Parses a secret when the value has the exact api key shape.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        is_api_key_shape(value).then(|| Self(value.to_owned()))
    }

    /// Returns the secret exactly as presented.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for ApiKeySecret {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("ApiKeySecret(<redacted>)")
    }
}

/// Returns whether a value is a 64-character case-insensitive hex string.
#[must_use]
pub fn is_api_key_shape(value: &str) -> bool {
    API_KEY_PATTERN.is_match(value)
}

/// Rotating credential owned by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    /// Record identifier.
    pub id: ApiKeyId,
    /// SHA-256 hex digest of the secret.
    pub secret_hash: String,
    /// Caller the key authenticates as.
    pub owner_id: CallerId,
    /// Expiry instant; the key is usable strictly before it.
    pub expires_at: DateTime<Utc>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last successful use, if any.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Soft-revocation flag.
    pub revoked: bool,
}

impl ApiKey {
    /// Builds a fresh, unrevoked key record expiring `validity` after `created_at`.
    pub fn issue(
        owner_id: CallerId,
        secret_hash: impl Into<String>,
        created_at: DateTime<Utc>,
        validity: Duration,
    ) -> AppResult<Self> {
        if validity <= Duration::zero() {
            return Err(AppError::Validation(
                "api key validity must be positive".to_owned(),
            ));
        }
        let expires_at = created_at.checked_add_signed(validity).ok_or_else(|| {
            AppError::Validation(format!(
                "api key validity of {} days is out of range",
                validity.num_days()
            ))
        })?;

        Ok(Self {
            id: ApiKeyId::new(),
            secret_hash: secret_hash.into(),
            owner_id,
            expires_at,
            created_at,
            last_used_at: None,
            revoked: false,
        })
    }

    /// Returns whether the key is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Checks revocation first, then expiry.
    pub fn ensure_usable_at(&self, now: DateTime<Utc>) -> Result<(), AuthFailure> {
        if self.revoked {
            return Err(AuthFailure::RevokedCredential);
        }

        if self.is_expired_at(now) {
            return Err(AuthFailure::ExpiredCredential);
        }

        Ok(())
    }
}
