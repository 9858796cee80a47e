//! PostgreSQL-backed endpoint policy lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use rpcguard_application::EndpointPolicyRepository;
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::EndpointPolicy;

/// PostgreSQL implementation of the endpoint policy port.
#[derive(Clone)]
pub struct PostgresEndpointPolicyRepository {
    pool: PgPool,
}

impl PostgresEndpointPolicyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EndpointPolicyRepository for PostgresEndpointPolicyRepository {
    async fn find_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<Option<EndpointPolicy>> {
        let row = sqlx::query_as::<_, EndpointPolicyRow>(
            r#"
            SELECT policy.service_name, policy.endpoint_name, permission.name AS required_permission
            FROM rpc_endpoint_policies policy
            INNER JOIN rpc_permissions permission ON permission.id = policy.required_permission_id
            WHERE policy.service_name = $1 AND policy.endpoint_name = $2
            "#,
        )
        .bind(service_name)
        .bind(endpoint_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find endpoint policy for '{service_name}.{endpoint_name}': {error}"
            ))
        })?;

        row.map(EndpointPolicy::try_from).transpose()
    }

    async fn list_endpoint_policies(&self, service_name: &str) -> AppResult<Vec<EndpointPolicy>> {
        let rows = sqlx::query_as::<_, EndpointPolicyRow>(
            r#"
            SELECT policy.service_name, policy.endpoint_name, permission.name AS required_permission
            FROM rpc_endpoint_policies policy
            INNER JOIN rpc_permissions permission ON permission.id = policy.required_permission_id
            WHERE policy.service_name = $1
            ORDER BY policy.endpoint_name
            "#,
        )
        .bind(service_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list endpoint policies for '{service_name}': {error}"
            ))
        })?;

        rows.into_iter().map(EndpointPolicy::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EndpointPolicyRow {
    service_name: String,
    endpoint_name: String,
    required_permission: String,
}

impl TryFrom<EndpointPolicyRow> for EndpointPolicy {
    type Error = AppError;

    fn try_from(row: EndpointPolicyRow) -> Result<Self, Self::Error> {
        EndpointPolicy::new(row.service_name, row.endpoint_name, row.required_permission)
    }
}
