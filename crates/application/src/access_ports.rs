use async_trait::async_trait;

use rpcguard_core::AppResult;
use rpcguard_domain::{
    ApiKey, ApiKeyId, CallerId, CallerIdentity, EndpointPolicy, Permission, PermissionId, Role,
    RoleId,
};

/// Read port over the caller/role/permission graph.
#[async_trait]
pub trait AccessGraphRepository: Send + Sync {
    /// Finds a caller by its unique name.
    async fn find_caller_by_name(&self, name: &str) -> AppResult<Option<CallerIdentity>>;

    /// Finds a caller by identifier.
    async fn find_caller_by_id(&self, caller_id: CallerId) -> AppResult<Option<CallerIdentity>>;

    /// Lists roles held by a caller through memberships.
    async fn list_roles_for_caller(&self, caller_id: CallerId) -> AppResult<Vec<Role>>;

    /// Lists permissions granted by a role.
    async fn list_permissions_for_role(&self, role_id: RoleId) -> AppResult<Vec<Permission>>;
}

/// Write port used by administrators and seed processes.
#[async_trait]
pub trait AccessAdminRepository: Send + Sync {
    /// Creates a role. Fails with a conflict when the name is taken.
    async fn create_role(&self, role: Role) -> AppResult<()>;

    /// Finds a role by its unique name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Creates a permission. Fails with a conflict when the name is taken.
    async fn create_permission(&self, permission: Permission) -> AppResult<()>;

    /// Finds a permission by its unique name.
    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>>;

    /// Creates a caller. Fails with a conflict when the name is taken.
    async fn create_caller(&self, caller: CallerIdentity) -> AppResult<()>;

    /// Adds a role membership. Existing memberships are left untouched.
    async fn assign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()>;

    /// Removes a role membership if present.
    async fn unassign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()>;

    /// Grants a permission to a role. Existing grants are left untouched.
    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId)
    -> AppResult<()>;

    /// Removes a permission grant if present.
    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()>;

    /// Inserts or replaces the policy for one `(service, endpoint)` pair.
    async fn save_endpoint_policy(&self, policy: EndpointPolicy) -> AppResult<()>;

    /// Removes the policy for one endpoint. Returns whether a row existed.
    async fn delete_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<bool>;
}

/// Persistence port for rotating api keys.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Stores a newly issued key. Fails with a conflict on duplicate digests.
    async fn insert_api_key(&self, key: ApiKey) -> AppResult<()>;

    /// Finds a key by the digest of its secret, revoked or not.
    async fn find_api_key_by_hash(&self, secret_hash: &str) -> AppResult<Option<ApiKey>>;

    /// Records the last successful use. Last write wins.
    async fn record_api_key_use(
        &self,
        key_id: ApiKeyId,
        used_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()>;

    /// Soft-revokes a key.
    async fn revoke_api_key(&self, key_id: ApiKeyId) -> AppResult<()>;
}

/// Read port for endpoint permission requirements.
#[async_trait]
pub trait EndpointPolicyRepository: Send + Sync {
    /// Finds the policy for one endpoint of a service.
    async fn find_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<Option<EndpointPolicy>>;

    /// Lists every policy scoped to a service.
    async fn list_endpoint_policies(&self, service_name: &str) -> AppResult<Vec<EndpointPolicy>>;
}
