
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rpcguard_application::{
    AccessAdminRepository, AccessGraphRepository, ApiKeyRepository, EndpointPolicyRepository,
};
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{
    ApiKey, ApiKeyId, CallerId, CallerIdentity, EndpointPolicy, Permission, PermissionId, Role,
    RoleId,
};
use tokio::sync::RwLock;

/// In-memory implementation of every access port.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    roles: RwLock<HashMap<RoleId, Role>>,
    permissions: RwLock<HashMap<PermissionId, Permission>>,
    callers: RwLock<HashMap<CallerId, CallerIdentity>>,
    memberships: RwLock<HashSet<(CallerId, RoleId)>>,
    grants: RwLock<HashSet<(RoleId, PermissionId)>>,
    endpoint_policies: RwLock<HashMap<(String, String), EndpointPolicy>>,
    api_keys: RwLock<HashMap<ApiKeyId, ApiKey>>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessGraphRepository for InMemoryAccessStore {
    async fn find_caller_by_name(&self, name: &str) -> AppResult<Option<CallerIdentity>> {
        Ok(self
            .callers
            .read()
            .await
            .values()
            .find(|caller| caller.name() == name)
            .cloned())
    }

    async fn find_caller_by_id(&self, caller_id: CallerId) -> AppResult<Option<CallerIdentity>> {
        Ok(self.callers.read().await.get(&caller_id).cloned())
    }

    async fn list_roles_for_caller(&self, caller_id: CallerId) -> AppResult<Vec<Role>> {
        let memberships = self.memberships.read().await;
        let roles = self.roles.read().await;

        let mut values: Vec<Role> = memberships
            .iter()
            .filter(|(member, _)| *member == caller_id)
            .filter_map(|(_, role_id)| roles.get(role_id).cloned())
            .collect();
        values.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(values)
    }

    async fn list_permissions_for_role(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let grants = self.grants.read().await;
        let permissions = self.permissions.read().await;

        let mut values: Vec<Permission> = grants
            .iter()
            .filter(|(granted_role, _)| *granted_role == role_id)
            .filter_map(|(_, permission_id)| permissions.get(permission_id).cloned())
            .collect();
        values.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(values)
    }
}

#[async_trait]
impl AccessAdminRepository for InMemoryAccessStore {
    async fn create_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| existing.name() == role.name()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        roles.insert(role.id(), role);
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .values()
            .find(|role| role.name() == name)
            .cloned())
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        let mut permissions = self.permissions.write().await;
        if permissions
            .values()
            .any(|existing| existing.name() == permission.name())
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.name()
            )));
        }

        permissions.insert(permission.id(), permission);
        Ok(())
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        Ok(self
            .permissions
            .read()
            .await
            .values()
            .find(|permission| permission.name() == name)
            .cloned())
    }

    async fn create_caller(&self, caller: CallerIdentity) -> AppResult<()> {
        let mut callers = self.callers.write().await;
        if callers
            .values()
            .any(|existing| existing.name() == caller.name())
        {
            return Err(AppError::Conflict(format!(
                "caller '{}' already exists",
                caller.name()
            )));
        }

        callers.insert(caller.id(), caller);
        Ok(())
    }

    async fn assign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        if !self.callers.read().await.contains_key(&caller_id) {
            return Err(AppError::NotFound(format!(
                "caller '{caller_id}' does not exist"
            )));
        }
        if !self.roles.read().await.contains_key(&role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        }

        self.memberships.write().await.insert((caller_id, role_id));
        Ok(())
    }

    async fn unassign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        self.memberships.write().await.remove(&(caller_id, role_id));
        Ok(())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        if !self.roles.read().await.contains_key(&role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        }
        if !self.permissions.read().await.contains_key(&permission_id) {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' does not exist"
            )));
        }

        self.grants.write().await.insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.grants.write().await.remove(&(role_id, permission_id));
        Ok(())
    }

    async fn save_endpoint_policy(&self, policy: EndpointPolicy) -> AppResult<()> {
        let permission_exists = self
            .permissions
            .read()
            .await
            .values()
            .any(|permission| permission.name() == policy.required_permission());
        if !permission_exists {
            return Err(AppError::NotFound(format!(
                "permission '{}' does not exist",
                policy.required_permission()
            )));
        }

        let key = (
            policy.service_name().to_owned(),
            policy.endpoint_name().to_owned(),
        );
        self.endpoint_policies.write().await.insert(key, policy);
        Ok(())
    }

    async fn delete_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<bool> {
        Ok(self
            .endpoint_policies
            .write()
            .await
            .remove(&(service_name.to_owned(), endpoint_name.to_owned()))
            .is_some())
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryAccessStore {
    async fn insert_api_key(&self, key: ApiKey) -> AppResult<()> {
        let mut api_keys = self.api_keys.write().await;
        if api_keys.contains_key(&key.id)
            || api_keys
                .values()
                .any(|existing| existing.secret_hash == key.secret_hash)
        {
            return Err(AppError::Conflict(
                "api key digest already exists".to_owned(),
            ));
        }

        api_keys.insert(key.id, key);
        Ok(())
    }

    async fn find_api_key_by_hash(&self, secret_hash: &str) -> AppResult<Option<ApiKey>> {
        Ok(self
            .api_keys
            .read()
            .await
            .values()
            .find(|key| key.secret_hash == secret_hash)
            .cloned())
    }

    async fn record_api_key_use(&self, key_id: ApiKeyId, used_at: DateTime<Utc>) -> AppResult<()> {
        if let Some(key) = self.api_keys.write().await.get_mut(&key_id) {
            key.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn revoke_api_key(&self, key_id: ApiKeyId) -> AppResult<()> {
        if let Some(key) = self.api_keys.write().await.get_mut(&key_id) {
            key.revoked = true;
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointPolicyRepository for InMemoryAccessStore {
    async fn find_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<Option<EndpointPolicy>> {
        Ok(self
            .endpoint_policies
            .read()
            .await
            .get(&(service_name.to_owned(), endpoint_name.to_owned()))
            .cloned())
    }

    async fn list_endpoint_policies(&self, service_name: &str) -> AppResult<Vec<EndpointPolicy>> {
        let mut values: Vec<EndpointPolicy> = self
            .endpoint_policies
            .read()
            .await
            .values()
            .filter(|policy| policy.service_name() == service_name)
            .cloned()
            .collect();
        values.sort_by(|left, right| left.endpoint_name().cmp(right.endpoint_name()));

        Ok(values)
    }
}
