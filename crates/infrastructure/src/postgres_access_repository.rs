//! PostgreSQL-backed caller, role, and permission graph.

mod admin;


use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use rpcguard_application::AccessGraphRepository;
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{CallerId, CallerIdentity, Permission, PermissionId, Role, RoleId};

/// PostgreSQL implementation of the access graph and administration ports.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessGraphRepository for PostgresAccessRepository {
    async fn find_caller_by_name(&self, name: &str) -> AppResult<Option<CallerIdentity>> {
        let row = sqlx::query_as::<_, CallerRow>(
            r#"
            SELECT id, name, default_role_id
            FROM rpc_callers
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find caller '{name}': {error}")))?;

        row.map(CallerIdentity::try_from).transpose()
    }

    async fn find_caller_by_id(&self, caller_id: CallerId) -> AppResult<Option<CallerIdentity>> {
        let row = sqlx::query_as::<_, CallerRow>(
            r#"
            SELECT id, name, default_role_id
            FROM rpc_callers
            WHERE id = $1
            "#,
        )
        .bind(caller_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find caller '{caller_id}': {error}"))
        })?;

        row.map(CallerIdentity::try_from).transpose()
    }

    async fn list_roles_for_caller(&self, caller_id: CallerId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role.id, role.name
            FROM rpc_caller_roles membership
            INNER JOIN rpc_roles role ON role.id = membership.role_id
            WHERE membership.caller_id = $1
            ORDER BY role.name
            "#,
        )
        .bind(caller_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list caller roles: {error}")))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn list_permissions_for_role(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT permission.id, permission.name, permission.description
            FROM rpc_role_permissions grant_row
            INNER JOIN rpc_permissions permission ON permission.id = grant_row.permission_id
            WHERE grant_row.role_id = $1
            ORDER BY permission.name
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role grants: {error}")))?;

        rows.into_iter().map(Permission::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CallerRow {
    id: Uuid,
    name: String,
    default_role_id: Option<Uuid>,
}

impl TryFrom<CallerRow> for CallerIdentity {
    type Error = AppError;

    fn try_from(row: CallerRow) -> Result<Self, Self::Error> {
        CallerIdentity::new(
            CallerId::from_uuid(row.id),
            row.name,
            row.default_role_id.map(RoleId::from_uuid),
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RoleRow {
    id: Uuid,
    name: String,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Role::new(RoleId::from_uuid(row.id), row.name)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PermissionRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        Permission::new(PermissionId::from_uuid(row.id), row.name, row.description)
    }
}

pub(crate) fn map_unique_violation(error: sqlx::Error, conflict: impl FnOnce() -> String) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(conflict());
    }

    AppError::Internal(format!("database write failed: {error}"))
}
