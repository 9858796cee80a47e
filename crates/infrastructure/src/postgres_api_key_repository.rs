//! PostgreSQL-backed rotating api key repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use rpcguard_application::ApiKeyRepository;
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{ApiKey, ApiKeyId, CallerId};

use crate::postgres_access_repository::map_unique_violation;

/// PostgreSQL implementation of the api key repository port.
#[derive(Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn insert_api_key(&self, key: ApiKey) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_api_keys (id, secret_hash, owner_id, expires_at, created_at, last_used_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.id.as_uuid())
        .bind(key.secret_hash.as_str())
        .bind(key.owner_id.as_uuid())
        .bind(key.expires_at)
        .bind(key.created_at)
        .bind(key.last_used_at)
        .bind(key.revoked)
        .execute(&self.pool)
        .await
        .map_err(|error| map_unique_violation(error, || "api key digest already exists".to_owned()))?;

        Ok(())
    }

    async fn find_api_key_by_hash(&self, secret_hash: &str) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, secret_hash, owner_id, expires_at, created_at, last_used_at, revoked
            FROM rpc_api_keys
            WHERE secret_hash = $1
            "#,
        )
        .bind(secret_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find api key: {error}")))?;

        Ok(row.map(ApiKey::from))
    }

    async fn record_api_key_use(&self, key_id: ApiKeyId, used_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE rpc_api_keys
            SET last_used_at = $2
            WHERE id = $1
            "#,
        )
        .bind(key_id.as_uuid())
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record api key use for '{key_id}': {error}"))
        })?;

        Ok(())
    }

    async fn revoke_api_key(&self, key_id: ApiKeyId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE rpc_api_keys
            SET revoked = TRUE
            WHERE id = $1
            "#,
        )
        .bind(key_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to revoke api key '{key_id}': {error}"))
        })?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    secret_hash: String,
    owner_id: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked: bool,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: ApiKeyId::from_uuid(row.id),
            secret_hash: row.secret_hash,
            owner_id: CallerId::from_uuid(row.owner_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked: row.revoked,
        }
    }
}
