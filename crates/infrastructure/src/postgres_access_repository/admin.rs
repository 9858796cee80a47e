use async_trait::async_trait;

use rpcguard_application::AccessAdminRepository;
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{
    CallerId, CallerIdentity, EndpointPolicy, Permission, PermissionId, Role, RoleId,
};

use super::{PermissionRow, PostgresAccessRepository, RoleRow, map_unique_violation};

#[async_trait]
impl AccessAdminRepository for PostgresAccessRepository {
    async fn create_role(&self, role: Role) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_roles (id, name)
            VALUES ($1, $2)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(error, || format!("role '{}' already exists", role.name()))
        })?;

        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name
            FROM rpc_roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role '{name}': {error}")))?;

        row.map(Role::try_from).transpose()
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_permissions (id, name, description)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.name())
        .bind(permission.description())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(error, || {
                format!("permission '{}' already exists", permission.name())
            })
        })?;

        Ok(())
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, name, description
            FROM rpc_permissions
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find permission '{name}': {error}"))
        })?;

        row.map(Permission::try_from).transpose()
    }

    async fn create_caller(&self, caller: CallerIdentity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_callers (id, name, default_role_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(caller.id().as_uuid())
        .bind(caller.name())
        .bind(caller.default_role_id().map(|role_id| role_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(error, || format!("caller '{}' already exists", caller.name()))
        })?;

        Ok(())
    }

    async fn assign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_caller_roles (caller_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (caller_id, role_id) DO NOTHING
            "#,
        )
        .bind(caller_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn unassign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM rpc_caller_roles
            WHERE caller_id = $1 AND role_id = $2
            "#,
        )
        .bind(caller_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign role: {error}")))?;

        Ok(())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rpc_role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to grant permission: {error}")))?;

        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM rpc_role_permissions
            WHERE role_id = $1 AND permission_id = $2
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke permission: {error}")))?;

        Ok(())
    }

    async fn save_endpoint_policy(&self, policy: EndpointPolicy) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO rpc_endpoint_policies (service_name, endpoint_name, required_permission_id)
            SELECT $1, $2, permission.id
            FROM rpc_permissions permission
            WHERE permission.name = $3
            ON CONFLICT (service_name, endpoint_name)
            DO UPDATE SET required_permission_id = EXCLUDED.required_permission_id
            "#,
        )
        .bind(policy.service_name())
        .bind(policy.endpoint_name())
        .bind(policy.required_permission())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save endpoint policy: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "permission '{}' does not exist",
                policy.required_permission()
            )));
        }

        Ok(())
    }

    async fn delete_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM rpc_endpoint_policies
            WHERE service_name = $1 AND endpoint_name = $2
            "#,
        )
        .bind(service_name)
        .bind(endpoint_name)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete endpoint policy: {error}"))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
