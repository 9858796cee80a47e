use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{
    ApiKey, ApiKeyId, CallerId, CallerIdentity, EndpointPolicy, Permission, PermissionId, Role,
    RoleId,
};
use tokio::sync::Mutex;

use crate::{
    AccessAdminRepository, AccessGraphRepository, ApiKeyRepository, EndpointPolicyRepository,
};

#[derive(Default)]
struct FakeState {
    roles: BTreeMap<String, Role>,
    permissions: BTreeMap<String, Permission>,
    callers: BTreeMap<String, CallerIdentity>,
    memberships: BTreeSet<(CallerId, RoleId)>,
    grants: BTreeSet<(RoleId, PermissionId)>,
    policies: BTreeMap<(String, String), EndpointPolicy>,
    api_keys: Vec<ApiKey>,
}

/// Access store fake shared by service tests.
#[derive(Default)]
pub(crate) struct FakeAccessStore {
    state: Mutex<FakeState>,
    fail_reads: AtomicBool,
    fail_key_use_updates: AtomicBool,
}

impl FakeAccessStore {
    pub(crate) fn fail_reads(&self, value: bool) {
        self.fail_reads.store(value, Ordering::SeqCst);
    }

    pub(crate) fn fail_key_use_updates(&self, value: bool) {
        self.fail_key_use_updates.store(value, Ordering::SeqCst);
    }

    pub(crate) async fn add_role(&self, name: &str, permissions: &[&str]) -> RoleId {
        let role_id = {
            let mut state = self.state.lock().await;
            let role = match Role::new(RoleId::new(), name) {
                Ok(role) => role,
                Err(error) => panic!("invalid fake role: {error}"),
            };
            let role_id = role.id();
            state.roles.insert(name.to_owned(), role);
            role_id
        };

        for permission in permissions {
            self.add_permission_to_role(name, permission).await;
        }

        role_id
    }

    pub(crate) async fn add_permission_to_role(&self, role_name: &str, permission_name: &str) {
        let mut state = self.state.lock().await;
        let Some(role_id) = state.roles.get(role_name).map(Role::id) else {
            panic!("fake role '{role_name}' is missing");
        };

        let permission_id = match state.permissions.get(permission_name) {
            Some(permission) => permission.id(),
            None => {
                let permission = match Permission::new(PermissionId::new(), permission_name, None)
                {
                    Ok(permission) => permission,
                    Err(error) => panic!("invalid fake permission: {error}"),
                };
                let permission_id = permission.id();
                state
                    .permissions
                    .insert(permission_name.to_owned(), permission);
                permission_id
            }
        };

        state.grants.insert((role_id, permission_id));
    }

    pub(crate) async fn add_caller(&self, name: &str, roles: &[&str]) -> CallerId {
        let mut state = self.state.lock().await;
        let caller = match CallerIdentity::new(CallerId::new(), name, None) {
            Ok(caller) => caller,
            Err(error) => panic!("invalid fake caller: {error}"),
        };
        let caller_id = caller.id();
        state.callers.insert(name.to_owned(), caller);

        for role_name in roles {
            let Some(role_id) = state.roles.get(*role_name).map(Role::id) else {
                panic!("fake role '{role_name}' is missing");
            };
            state.memberships.insert((caller_id, role_id));
        }

        caller_id
    }

    pub(crate) async fn add_endpoint_policy(&self, service: &str, endpoint: &str, permission: &str) {
        let policy = match EndpointPolicy::new(service, endpoint, permission) {
            Ok(policy) => policy,
            Err(error) => panic!("invalid fake policy: {error}"),
        };
        self.state
            .lock()
            .await
            .policies
            .insert((service.to_owned(), endpoint.to_owned()), policy);
    }

    pub(crate) async fn api_key_by_hash(&self, secret_hash: &str) -> Option<ApiKey> {
        self.state
            .lock()
            .await
            .api_keys
            .iter()
            .find(|key| key.secret_hash == secret_hash)
            .cloned()
    }

    pub(crate) async fn api_keys(&self) -> Vec<ApiKey> {
        self.state.lock().await.api_keys.clone()
    }

    pub(crate) async fn put_api_key(&self, key: ApiKey) {
        self.state.lock().await.api_keys.push(key);
    }

    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("fake store is unreachable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessGraphRepository for FakeAccessStore {
    async fn find_caller_by_name(&self, name: &str) -> AppResult<Option<CallerIdentity>> {
        self.check_reads()?;
        Ok(self.state.lock().await.callers.get(name).cloned())
    }

    async fn find_caller_by_id(&self, caller_id: CallerId) -> AppResult<Option<CallerIdentity>> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .await
            .callers
            .values()
            .find(|caller| caller.id() == caller_id)
            .cloned())
    }

    async fn list_roles_for_caller(&self, caller_id: CallerId) -> AppResult<Vec<Role>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .roles
            .values()
            .filter(|role| state.memberships.contains(&(caller_id, role.id())))
            .cloned()
            .collect())
    }

    async fn list_permissions_for_role(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .values()
            .filter(|permission| state.grants.contains(&(role_id, permission.id())))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ApiKeyRepository for FakeAccessStore {
    async fn insert_api_key(&self, key: ApiKey) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .api_keys
            .iter()
            .any(|existing| existing.secret_hash == key.secret_hash)
        {
            return Err(AppError::Conflict("api key digest already exists".to_owned()));
        }
        state.api_keys.push(key);
        Ok(())
    }

    async fn find_api_key_by_hash(&self, secret_hash: &str) -> AppResult<Option<ApiKey>> {
        self.check_reads()?;
        Ok(self.api_key_by_hash(secret_hash).await)
    }

    async fn record_api_key_use(
        &self,
        key_id: ApiKeyId,
        used_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        if self.fail_key_use_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("fake last-used write failed".to_owned()));
        }

        let mut state = self.state.lock().await;
        if let Some(key) = state.api_keys.iter_mut().find(|key| key.id == key_id) {
            key.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn revoke_api_key(&self, key_id: ApiKeyId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(key) = state.api_keys.iter_mut().find(|key| key.id == key_id) {
            key.revoked = true;
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointPolicyRepository for FakeAccessStore {
    async fn find_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<Option<EndpointPolicy>> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .await
            .policies
            .get(&(service_name.to_owned(), endpoint_name.to_owned()))
            .cloned())
    }

    async fn list_endpoint_policies(&self, service_name: &str) -> AppResult<Vec<EndpointPolicy>> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .await
            .policies
            .values()
            .filter(|policy| policy.service_name() == service_name)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccessAdminRepository for FakeAccessStore {
    async fn create_role(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.roles.contains_key(role.name()) {
            return Err(AppError::Conflict(format!("role '{}' exists", role.name())));
        }
        state.roles.insert(role.name().to_owned(), role);
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.check_reads()?;
        Ok(self.state.lock().await.roles.get(name).cloned())
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.permissions.contains_key(permission.name()) {
            return Err(AppError::Conflict(format!(
                "permission '{}' exists",
                permission.name()
            )));
        }
        state
            .permissions
            .insert(permission.name().to_owned(), permission);
        Ok(())
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        self.check_reads()?;
        Ok(self.state.lock().await.permissions.get(name).cloned())
    }

    async fn create_caller(&self, caller: CallerIdentity) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.callers.contains_key(caller.name()) {
            return Err(AppError::Conflict(format!(
                "caller '{}' exists",
                caller.name()
            )));
        }
        state.callers.insert(caller.name().to_owned(), caller);
        Ok(())
    }

    async fn assign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        self.state
            .lock()
            .await
            .memberships
            .insert((caller_id, role_id));
        Ok(())
    }

    async fn unassign_role(&self, caller_id: CallerId, role_id: RoleId) -> AppResult<()> {
        self.state
            .lock()
            .await
            .memberships
            .remove(&(caller_id, role_id));
        Ok(())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.state
            .lock()
            .await
            .grants
            .insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.state
            .lock()
            .await
            .grants
            .remove(&(role_id, permission_id));
        Ok(())
    }

    async fn save_endpoint_policy(&self, policy: EndpointPolicy) -> AppResult<()> {
        self.state.lock().await.policies.insert(
            (
                policy.service_name().to_owned(),
                policy.endpoint_name().to_owned(),
            ),
            policy,
        );
        Ok(())
    }

    async fn delete_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .policies
            .remove(&(service_name.to_owned(), endpoint_name.to_owned()))
            .is_some())
    }
}
