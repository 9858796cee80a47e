//! Structural classification of presented credentials.
//!
//! Two kinds share one metadata entry without a type tag: a value with the
//! exact api key shape is an api key, anything else must be a compact
//! three-segment signed token. A future explicit prefix would have to keep
//! accepting untagged values for existing integrations.

use rpcguard_core::AuthFailure;

use crate::ApiKeySecret;

const BEARER_SCHEME: &str = "bearer ";

/// Credential after kind detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCredential<'a> {
    /// Rotating api key, looked up verbatim.
    ApiKey(ApiKeySecret),
    /// Legacy `header.payload.signature` token.
    SignedToken(&'a str),
}

impl<'a> PresentedCredential<'a> {
    /// Classifies a raw credential string with the `Bearer ` prefix removed.
    pub fn classify(raw: &'a str) -> Result<Self, AuthFailure> {
        if let Some(secret) = ApiKeySecret::parse(raw) {
            return Ok(Self::ApiKey(secret));
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|segment| segment.is_empty()) {
            return Err(AuthFailure::MalformedCredential {
                reason: "expected a 64-character hex api key or a three-segment signed token"
                    .to_owned(),
            });
        }

        Ok(Self::SignedToken(raw))
    }
}

/// Extracts the credential from a metadata value, dropping a `Bearer ` prefix.
///
/// Returns `None` when nothing remains after trimming.
#[must_use]
pub fn credential_from_metadata_value(value: &str) -> Option<&str> {
    let value = value.trim_start();
    let credential = match value.get(..BEARER_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_SCHEME) => {
            &value[BEARER_SCHEME.len()..]
        }
        _ => value,
    }
    .trim();

    (!credential.is_empty()).then_some(credential)
}
