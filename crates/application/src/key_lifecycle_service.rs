use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{ApiKey, ApiKeyId, ApiKeySecret};
use tracing::info;

use crate::api_key_crypto::{generate_secret, hash_secret};
use crate::{AccessGraphRepository, ApiKeyRepository};

/// Result of a successful issue. The secret is not retrievable afterwards.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    /// Record identifier of the new key.
    pub key_id: ApiKeyId,
    /// Owner caller name.
    pub owner: String,
    /// Plaintext secret, returned exactly once.
    pub secret: ApiKeySecret,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// What a revoke call found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The key was active and is now revoked.
    Revoked,
    /// The key had already been revoked; nothing changed.
    AlreadyRevoked,
    /// No key matches the secret; nothing changed.
    NotFound,
}

/// Issues and revokes rotating api keys.
#[derive(Clone)]
pub struct KeyLifecycleService {
    access_repository: Arc<dyn AccessGraphRepository>,
    api_key_repository: Arc<dyn ApiKeyRepository>,
    default_validity_days: u32,
}

impl KeyLifecycleService {
    /// Creates a new service. `default_validity_days` applies when an issue
    /// call does not override it.
    #[must_use]
    pub fn new(
        access_repository: Arc<dyn AccessGraphRepository>,
        api_key_repository: Arc<dyn ApiKeyRepository>,
        default_validity_days: u32,
    ) -> Self {
        Self {
            access_repository,
            api_key_repository,
            default_validity_days,
        }
    }

    /// Issues a key for an existing caller.
    ///
    /// `validity_days` overrides the configured horizon for this key only.
    pub async fn issue(
        &self,
        owner_name: &str,
        validity_days: Option<u32>,
    ) -> AppResult<IssuedApiKey> {
        let validity_days = validity_days.unwrap_or(self.default_validity_days);
        if validity_days == 0 {
            return Err(AppError::Validation(
                "api key validity must be at least one day".to_owned(),
            ));
        }

        let owner = self
            .access_repository
            .find_caller_by_name(owner_name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("caller '{owner_name}' does not exist")))?;

        let (secret, secret_hash) = generate_secret()?;
        let key = ApiKey::issue(
            owner.id(),
            secret_hash,
            Utc::now(),
            Duration::days(i64::from(validity_days)),
        )?;
        let issued = IssuedApiKey {
            key_id: key.id,
            owner: owner.name().to_owned(),
            secret,
            expires_at: key.expires_at,
        };

        self.api_key_repository.insert_api_key(key).await?;
        info!(
            key_id = %issued.key_id,
            owner = %issued.owner,
            expires_at = %issued.expires_at,
            "issued api key"
        );

        Ok(issued)
    }

    /// Revokes the key matching the secret. Never fails for unknown or
    /// already revoked keys.
    pub async fn revoke(&self, raw_secret: &str) -> AppResult<RevokeOutcome> {
        let secret_hash = hash_secret(raw_secret.trim());
        let Some(key) = self
            .api_key_repository
            .find_api_key_by_hash(secret_hash.as_str())
            .await?
        else {
            return Ok(RevokeOutcome::NotFound);
        };

        if key.revoked {
            return Ok(RevokeOutcome::AlreadyRevoked);
        }

        self.api_key_repository.revoke_api_key(key.id).await?;
        info!(key_id = %key.id, "revoked api key");

        Ok(RevokeOutcome::Revoked)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rpcguard_core::{AppError, AuthFailure};

    use super::{KeyLifecycleService, RevokeOutcome};
    use crate::api_key_crypto::hash_secret;
    use crate::test_support::FakeAccessStore;
    use crate::{AuthSettings, CredentialVerifier};

    fn settings() -> AuthSettings {
        match AuthSettings::new("s".repeat(32)) {
            Ok(settings) => settings,
            Err(error) => panic!("invalid test settings: {error}"),
        }
    }

    fn services(store: &Arc<FakeAccessStore>) -> (KeyLifecycleService, CredentialVerifier) {
        let settings = settings();
        (
            KeyLifecycleService::new(
                store.clone(),
                store.clone(),
                settings.default_key_validity_days(),
            ),
            CredentialVerifier::new(store.clone(), store.clone(), &settings),
        )
    }

    #[tokio::test]
    async fn issued_key_verifies_as_its_owner() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, verifier) = services(&store);

        let issued = lifecycle.issue("svc-a", None).await;
        assert!(issued.is_ok());
        let Ok(issued) = issued else {
            return;
        };
        assert_eq!(issued.owner, "svc-a");

        let caller = verifier.verify(issued.secret.expose()).await;
        assert_eq!(
            caller.map(|caller| caller.name().to_owned()).ok(),
            Some("svc-a".to_owned())
        );
    }

    #[tokio::test]
    async fn issue_uses_default_horizon_unless_overridden() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, _) = services(&store);

        let before = Utc::now();
        let default_key = lifecycle.issue("svc-a", None).await;
        let short_key = lifecycle.issue("svc-a", Some(2)).await;
        let (Ok(default_key), Ok(short_key)) = (default_key, short_key) else {
            panic!("issue failed");
        };

        assert!(default_key.expires_at >= before + Duration::days(30));
        assert!(default_key.expires_at <= Utc::now() + Duration::days(30));
        assert!(short_key.expires_at <= Utc::now() + Duration::days(2));
        assert!(short_key.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn only_the_digest_is_persisted() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, _) = services(&store);

        let issued = lifecycle.issue("svc-a", None).await;
        let Ok(issued) = issued else {
            panic!("issue failed");
        };

        let keys = store.api_keys().await;
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].secret_hash, hash_secret(issued.secret.expose()));
        assert_ne!(keys[0].secret_hash, issued.secret.expose());
        assert!(!keys[0].revoked);
    }

    #[tokio::test]
    async fn issue_for_unknown_owner_is_not_found() {
        let store = Arc::new(FakeAccessStore::default());
        let (lifecycle, _) = services(&store);

        let result = lifecycle.issue("ghost", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.api_keys().await.is_empty());
    }

    #[tokio::test]
    async fn zero_day_validity_is_rejected() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, _) = services(&store);

        let result = lifecycle.issue("svc-a", Some(0)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn horizon_past_the_calendar_is_rejected() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, _) = services(&store);

        let result = lifecycle.issue("svc-a", Some(u32::MAX)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.api_keys().await.is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = Arc::new(FakeAccessStore::default());
        store.add_caller("svc-a", &[]).await;
        let (lifecycle, verifier) = services(&store);
        let Ok(issued) = lifecycle.issue("svc-a", None).await else {
            panic!("issue failed");
        };

        let first = lifecycle.revoke(issued.secret.expose()).await;
        let second = lifecycle.revoke(issued.secret.expose()).await;
        assert_eq!(first.ok(), Some(RevokeOutcome::Revoked));
        assert_eq!(second.ok(), Some(RevokeOutcome::AlreadyRevoked));

        let keys = store.api_keys().await;
        assert!(keys.iter().all(|key| key.revoked));

        let result = verifier.verify(issued.secret.expose()).await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthFailure::RevokedCredential))
        ));
    }

    #[tokio::test]
    async fn revoking_an_unknown_key_reports_not_found() {
        let store = Arc::new(FakeAccessStore::default());
        let (lifecycle, _) = services(&store);

        let outcome = lifecycle.revoke(&"ab".repeat(32)).await;
        assert_eq!(outcome.ok(), Some(RevokeOutcome::NotFound));
    }
}
