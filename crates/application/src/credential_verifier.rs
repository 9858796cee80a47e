//! Credential classification and validation.
//!
//! The verifier only establishes identity; it never reports a permission
//! denial. Store failures surface as internal errors, never as rejections.

mod signed_token;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::DecodingKey;
use rpcguard_core::{AppResult, AuthFailure, AuthenticatedCaller, CredentialKind};
use rpcguard_domain::{ApiKeySecret, PresentedCredential, credential_from_metadata_value};
use tracing::{debug, warn};

use crate::api_key_crypto::hash_secret;
use crate::{AccessGraphRepository, ApiKeyRepository, AuthSettings, RpcMetadata};

/// Application service that turns a presented credential into a caller.
#[derive(Clone)]
pub struct CredentialVerifier {
    access_repository: Arc<dyn AccessGraphRepository>,
    api_key_repository: Arc<dyn ApiKeyRepository>,
    decoding_key: DecodingKey,
    token_audience: String,
    metadata_key: String,
}

impl CredentialVerifier {
    /// Creates a verifier from repositories and explicit settings.
    #[must_use]
    pub fn new(
        access_repository: Arc<dyn AccessGraphRepository>,
        api_key_repository: Arc<dyn ApiKeyRepository>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            access_repository,
            api_key_repository,
            decoding_key: DecodingKey::from_secret(settings.token_secret()),
            token_audience: settings.token_audience().to_owned(),
            metadata_key: settings.metadata_key().to_owned(),
        }
    }

    /// Returns the metadata entry this verifier reads credentials from.
    #[must_use]
    pub fn metadata_key(&self) -> &str {
        self.metadata_key.as_str()
    }

    /// Extracts the credential from call metadata and verifies it.
    pub async fn verify_metadata(&self, metadata: &RpcMetadata) -> AppResult<AuthenticatedCaller> {
        let credential = metadata
            .get(self.metadata_key.as_str())
            .and_then(credential_from_metadata_value)
            .ok_or_else(|| AuthFailure::MissingCredential {
                metadata_key: self.metadata_key.clone(),
            })?;

        self.verify(credential).await
    }

    /// Classifies and validates a credential with any `Bearer ` prefix removed.
    pub async fn verify(&self, raw_credential: &str) -> AppResult<AuthenticatedCaller> {
        match PresentedCredential::classify(raw_credential)? {
            PresentedCredential::ApiKey(secret) => self.verify_api_key(&secret).await,
            PresentedCredential::SignedToken(token) => self.verify_signed_token(token).await,
        }
    }

    async fn verify_api_key(&self, secret: &ApiKeySecret) -> AppResult<AuthenticatedCaller> {
        let secret_hash = hash_secret(secret.expose());
        let key = self
            .api_key_repository
            .find_api_key_by_hash(secret_hash.as_str())
            .await?
            .ok_or(AuthFailure::UnknownCredential)?;

        let now = Utc::now();
        if let Err(failure) = key.ensure_usable_at(now) {
            debug!(key_id = %key.id, %failure, "rejected api key");
            return Err(failure.into());
        }

        let owner = self
            .access_repository
            .find_caller_by_id(key.owner_id)
            .await?
            .ok_or_else(|| AuthFailure::UnknownCaller {
                caller: key.owner_id.to_string(),
            })?;

        // Losing this write must never change the outcome of the call.
        if let Err(error) = self.api_key_repository.record_api_key_use(key.id, now).await {
            warn!(key_id = %key.id, %error, "failed to record api key use");
        }

        Ok(AuthenticatedCaller::new(owner.name(), CredentialKind::ApiKey))
    }

    async fn verify_signed_token(&self, token: &str) -> AppResult<AuthenticatedCaller> {
        let subject =
            signed_token::decode_subject(token, &self.decoding_key, self.token_audience.as_str())?;

        let caller = self
            .access_repository
            .find_caller_by_name(subject.as_str())
            .await?;
        let Some(caller) = caller else {
            return Err(AuthFailure::UnknownCaller { caller: subject }.into());
        };

        Ok(AuthenticatedCaller::new(
            caller.name(),
            CredentialKind::SignedToken,
        ))
    }
}
