use std::fmt::Write;

use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{API_KEY_SECRET_BYTES, API_KEY_SECRET_HEX_LENGTH, ApiKeySecret};
use sha2::{Digest, Sha256};

/// Generates a cryptographically random api key secret and its SHA-256 digest.
pub(crate) fn generate_secret() -> AppResult<(ApiKeySecret, String)> {
    let mut bytes = [0u8; API_KEY_SECRET_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate api key: {error}")))?;

    let raw_secret = to_lower_hex(&bytes);
    let secret = ApiKeySecret::parse(raw_secret.as_str()).ok_or_else(|| {
        AppError::Internal("generated api key does not have the expected shape".to_owned())
    })?;

    let hash = hash_secret(secret.expose());
    Ok((secret, hash))
}

/// Computes the SHA-256 digest of a secret exactly as presented.
pub(crate) fn hash_secret(raw_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_secret.as_bytes());
    to_lower_hex(&hasher.finalize())
}

fn to_lower_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(
        String::with_capacity(API_KEY_SECRET_HEX_LENGTH),
        |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        },
    )
}
