use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use rpcguard_core::{AppError, AuthFailure, CredentialKind};
use rpcguard_domain::{ApiKey, CallerId};
use serde_json::{Value, json};

use crate::api_key_crypto::hash_secret;
use crate::test_support::FakeAccessStore;
use crate::{AuthSettings, CredentialVerifier, RpcMetadata};

const TOKEN_SECRET: &str = "0123456789abcdef0123456789abcdef";

fn settings() -> AuthSettings {
    match AuthSettings::new(TOKEN_SECRET) {
        Ok(settings) => settings,
        Err(error) => panic!("invalid test settings: {error}"),
    }
}

fn verifier(store: &Arc<FakeAccessStore>) -> CredentialVerifier {
    CredentialVerifier::new(store.clone(), store.clone(), &settings())
}

fn mint(claims: Value, secret: &str) -> String {
    match jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    ) {
        Ok(token) => token,
        Err(error) => panic!("failed to mint token: {error}"),
    }
}

async fn store_key(
    store: &FakeAccessStore,
    owner_id: CallerId,
    secret: &str,
    validity: Duration,
) -> ApiKey {
    let key = match ApiKey::issue(owner_id, hash_secret(secret), Utc::now(), validity) {
        Ok(key) => key,
        Err(error) => panic!("failed to build key: {error}"),
    };
    store.put_api_key(key.clone()).await;
    key
}

fn auth_failure(result: Result<rpcguard_core::AuthenticatedCaller, AppError>) -> AuthFailure {
    match result {
        Err(AppError::Auth(failure)) => failure,
        Err(other) => panic!("expected auth failure, got {other}"),
        Ok(caller) => panic!("expected auth failure, got caller '{}'", caller.name()),
    }
}

#[tokio::test]
async fn valid_api_key_resolves_owner_and_records_use() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "ab".repeat(32);
    let key = store_key(&store, owner_id, &secret, Duration::days(30)).await;

    let caller = verifier(&store).verify(&secret).await;
    assert!(caller.is_ok());
    let Ok(caller) = caller else {
        return;
    };
    assert_eq!(caller.name(), "svc-a");
    assert_eq!(caller.credential_kind(), CredentialKind::ApiKey);

    let stored = store.api_key_by_hash(&key.secret_hash).await;
    assert!(stored.and_then(|stored| stored.last_used_at).is_some());
}

#[tokio::test]
async fn expired_api_key_is_rejected_even_when_not_revoked() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "cd".repeat(32);
    let issued_at = Utc::now() - Duration::days(2);
    let key = match ApiKey::issue(owner_id, hash_secret(&secret), issued_at, Duration::days(1)) {
        Ok(key) => key,
        Err(error) => panic!("failed to build key: {error}"),
    };
    store.put_api_key(key).await;

    let failure = auth_failure(verifier(&store).verify(&secret).await);
    assert_eq!(failure, AuthFailure::ExpiredCredential);
}

#[tokio::test]
async fn revoked_api_key_is_rejected_before_expiry() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "ef".repeat(32);
    let mut key = match ApiKey::issue(owner_id, hash_secret(&secret), Utc::now(), Duration::days(30))
    {
        Ok(key) => key,
        Err(error) => panic!("failed to build key: {error}"),
    };
    key.revoked = true;
    store.put_api_key(key).await;

    let failure = auth_failure(verifier(&store).verify(&secret).await);
    assert_eq!(failure, AuthFailure::RevokedCredential);
}

#[tokio::test]
async fn well_formed_unknown_api_key_is_unknown_not_malformed() {
    let store = Arc::new(FakeAccessStore::default());

    let failure = auth_failure(verifier(&store).verify(&"0".repeat(64)).await);
    assert_eq!(failure, AuthFailure::UnknownCredential);
}

#[tokio::test]
async fn api_keys_are_matched_verbatim() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "ab".repeat(32);
    store_key(&store, owner_id, &secret, Duration::days(30)).await;

    let failure = auth_failure(verifier(&store).verify(&secret.to_ascii_uppercase()).await);
    assert_eq!(failure, AuthFailure::UnknownCredential);
}

#[tokio::test]
async fn unrecognized_shapes_are_malformed() {
    let store = Arc::new(FakeAccessStore::default());

    for raw in ["", "plain-password", "only.two"] {
        let failure = auth_failure(verifier(&store).verify(raw).await);
        assert!(
            matches!(failure, AuthFailure::MalformedCredential { .. }),
            "{raw}"
        );
    }
}

#[tokio::test]
async fn failing_last_used_write_does_not_fail_the_call() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "12".repeat(32);
    store_key(&store, owner_id, &secret, Duration::days(30)).await;
    store.fail_key_use_updates(true);

    let caller = verifier(&store).verify(&secret).await;
    assert_eq!(caller.map(|caller| caller.name().to_owned()).ok(), Some("svc-a".to_owned()));
}

#[tokio::test]
async fn unreachable_store_is_an_internal_error() {
    let store = Arc::new(FakeAccessStore::default());
    store.fail_reads(true);

    let result = verifier(&store).verify(&"34".repeat(32)).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}

#[tokio::test]
async fn signed_token_with_reserved_audience_resolves_subject() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({
            "sub": "legacy-billing",
            "aud": "rpc_auth",
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        }),
        TOKEN_SECRET,
    );

    let caller = verifier(&store).verify(&token).await;
    assert!(caller.is_ok());
    let Ok(caller) = caller else {
        return;
    };
    assert_eq!(caller.name(), "legacy-billing");
    assert_eq!(caller.credential_kind(), CredentialKind::SignedToken);
}

#[tokio::test]
async fn signed_token_audience_may_be_a_list() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({ "sub": "legacy-billing", "aud": ["web", "rpc_auth"] }),
        TOKEN_SECRET,
    );

    assert!(verifier(&store).verify(&token).await.is_ok());
}

#[tokio::test]
async fn validly_signed_token_for_another_audience_is_rejected() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;

    for claims in [
        json!({ "sub": "legacy-billing", "aud": "end_user_auth" }),
        json!({ "sub": "legacy-billing" }),
    ] {
        let token = mint(claims, TOKEN_SECRET);
        let failure = auth_failure(verifier(&store).verify(&token).await);
        assert_eq!(
            failure,
            AuthFailure::WrongAudience {
                expected: "rpc_auth".to_owned()
            }
        );
    }
}

#[tokio::test]
async fn token_signed_with_another_key_is_rejected() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({ "sub": "legacy-billing", "aud": "rpc_auth" }),
        "another-shared-key-another-shared-key",
    );

    let failure = auth_failure(verifier(&store).verify(&token).await);
    assert_eq!(failure, AuthFailure::InvalidSignature);
}

#[tokio::test]
async fn foreign_audience_is_reported_before_a_bad_signature() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({ "sub": "legacy-billing", "aud": "end_user_auth" }),
        "another-shared-key-another-shared-key",
    );

    let failure = auth_failure(verifier(&store).verify(&token).await);
    assert_eq!(
        failure,
        AuthFailure::WrongAudience {
            expected: "rpc_auth".to_owned()
        }
    );
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({
            "sub": "legacy-billing",
            "aud": "rpc_auth",
            "exp": (Utc::now() - Duration::hours(2)).timestamp(),
        }),
        TOKEN_SECRET,
    );

    let failure = auth_failure(verifier(&store).verify(&token).await);
    assert_eq!(failure, AuthFailure::ExpiredCredential);
}

#[tokio::test]
async fn token_expired_seconds_ago_gets_no_grace_period() {
    let store = Arc::new(FakeAccessStore::default());
    store.add_caller("legacy-billing", &[]).await;
    let token = mint(
        json!({
            "sub": "legacy-billing",
            "aud": "rpc_auth",
            "exp": (Utc::now() - Duration::seconds(5)).timestamp(),
        }),
        TOKEN_SECRET,
    );

    let failure = auth_failure(verifier(&store).verify(&token).await);
    assert_eq!(failure, AuthFailure::ExpiredCredential);
}

#[tokio::test]
async fn token_for_unregistered_subject_is_rejected() {
    let store = Arc::new(FakeAccessStore::default());
    let token = mint(json!({ "sub": "ghost", "aud": "rpc_auth" }), TOKEN_SECRET);

    let failure = auth_failure(verifier(&store).verify(&token).await);
    assert_eq!(
        failure,
        AuthFailure::UnknownCaller {
            caller: "ghost".to_owned()
        }
    );
}

#[tokio::test]
async fn garbage_segments_are_malformed() {
    let store = Arc::new(FakeAccessStore::default());

    let failure = auth_failure(verifier(&store).verify("aaa.bbb.ccc").await);
    assert!(matches!(failure, AuthFailure::MalformedCredential { .. }));
}

#[tokio::test]
async fn metadata_without_credential_is_missing() {
    let store = Arc::new(FakeAccessStore::default());
    let verifier = verifier(&store);

    for metadata in [
        RpcMetadata::new(),
        [("service-authorization", "Bearer ")].into_iter().collect(),
        [("authorization", "Bearer abc")].into_iter().collect(),
    ] {
        let failure = auth_failure(verifier.verify_metadata(&metadata).await);
        assert_eq!(
            failure,
            AuthFailure::MissingCredential {
                metadata_key: "service-authorization".to_owned()
            }
        );
    }
}

#[tokio::test]
async fn metadata_bearer_prefix_is_stripped() {
    let store = Arc::new(FakeAccessStore::default());
    let owner_id = store.add_caller("svc-a", &[]).await;
    let secret = "9f".repeat(32);
    store_key(&store, owner_id, &secret, Duration::days(30)).await;

    let metadata: RpcMetadata = [("Service-Authorization", format!("Bearer {secret}"))]
        .into_iter()
        .collect();
    let caller = verifier(&store).verify_metadata(&metadata).await;
    assert_eq!(caller.map(|caller| caller.name().to_owned()).ok(), Some("svc-a".to_owned()));
}
