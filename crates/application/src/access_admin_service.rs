use std::sync::Arc;

use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::{
    CallerId, CallerIdentity, EndpointPolicy, Permission, PermissionId, Role, RoleId,
};
use tracing::info;

use crate::{AccessAdminRepository, AccessGraphRepository};

/// Administrative workflows over the role and permission graph.
#[derive(Clone)]
pub struct AccessAdminService {
    admin_repository: Arc<dyn AccessAdminRepository>,
    graph_repository: Arc<dyn AccessGraphRepository>,
}

impl AccessAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        admin_repository: Arc<dyn AccessAdminRepository>,
        graph_repository: Arc<dyn AccessGraphRepository>,
    ) -> Self {
        Self {
            admin_repository,
            graph_repository,
        }
    }

    /// Creates a uniquely named role.
    pub async fn create_role(&self, name: &str) -> AppResult<Role> {
        let role = Role::new(RoleId::new(), name)?;
        if self
            .admin_repository
            .find_role_by_name(role.name())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        self.admin_repository.create_role(role.clone()).await?;
        info!(role = role.name(), "created role");
        Ok(role)
    }

    /// Creates a uniquely named `resource:action` permission.
    pub async fn create_permission(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Permission> {
        let permission = Permission::new(
            PermissionId::new(),
            name.trim(),
            description.map(str::to_owned),
        )?;
        if self
            .admin_repository
            .find_permission_by_name(permission.name())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.name()
            )));
        }

        self.admin_repository
            .create_permission(permission.clone())
            .await?;
        info!(permission = permission.name(), "created permission");
        Ok(permission)
    }

    /// Registers a caller. A default role is also recorded as a membership.
    pub async fn register_caller(
        &self,
        name: &str,
        default_role: Option<&str>,
    ) -> AppResult<CallerIdentity> {
        let default_role = match default_role {
            Some(role_name) => Some(self.require_role(role_name).await?),
            None => None,
        };
        let caller = CallerIdentity::new(
            CallerId::new(),
            name,
            default_role.as_ref().map(Role::id),
        )?;

        if self
            .graph_repository
            .find_caller_by_name(caller.name())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "caller '{}' already exists",
                caller.name()
            )));
        }

        self.admin_repository.create_caller(caller.clone()).await?;
        if let Some(role) = &default_role {
            self.admin_repository
                .assign_role(caller.id(), role.id())
                .await?;
        }

        info!(
            caller = caller.name(),
            default_role = default_role.as_ref().map(Role::name),
            "registered caller"
        );
        Ok(caller)
    }

    /// Adds a role membership to a caller.
    pub async fn assign_role(&self, caller_name: &str, role_name: &str) -> AppResult<()> {
        let caller = self.require_caller(caller_name).await?;
        let role = self.require_role(role_name).await?;

        self.admin_repository
            .assign_role(caller.id(), role.id())
            .await?;
        info!(caller = caller.name(), role = role.name(), "assigned role");
        Ok(())
    }

    /// Removes a role membership from a caller.
    pub async fn unassign_role(&self, caller_name: &str, role_name: &str) -> AppResult<()> {
        let caller = self.require_caller(caller_name).await?;
        let role = self.require_role(role_name).await?;

        self.admin_repository
            .unassign_role(caller.id(), role.id())
            .await?;
        info!(caller = caller.name(), role = role.name(), "unassigned role");
        Ok(())
    }

    /// Grants a permission to a role.
    pub async fn grant_permission(&self, role_name: &str, permission_name: &str) -> AppResult<()> {
        let role = self.require_role(role_name).await?;
        let permission = self.require_permission(permission_name).await?;

        self.admin_repository
            .grant_permission(role.id(), permission.id())
            .await?;
        info!(
            role = role.name(),
            permission = permission.name(),
            "granted permission"
        );
        Ok(())
    }

    /// Removes a permission grant from a role.
    pub async fn revoke_permission(&self, role_name: &str, permission_name: &str) -> AppResult<()> {
        let role = self.require_role(role_name).await?;
        let permission = self.require_permission(permission_name).await?;

        self.admin_repository
            .revoke_permission(role.id(), permission.id())
            .await?;
        info!(
            role = role.name(),
            permission = permission.name(),
            "revoked permission"
        );
        Ok(())
    }

    /// Maps an endpoint to an existing permission, replacing any prior mapping.
    pub async fn set_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
        permission_name: &str,
    ) -> AppResult<EndpointPolicy> {
        let permission = self.require_permission(permission_name).await?;
        let policy = EndpointPolicy::new(service_name, endpoint_name, permission.name())?;

        self.admin_repository
            .save_endpoint_policy(policy.clone())
            .await?;
        info!(
            service = policy.service_name(),
            endpoint = policy.endpoint_name(),
            permission = policy.required_permission(),
            "set endpoint policy"
        );
        Ok(policy)
    }

    /// Removes an endpoint mapping. Returns whether one existed.
    pub async fn remove_endpoint_policy(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<bool> {
        let removed = self
            .admin_repository
            .delete_endpoint_policy(service_name.trim(), endpoint_name.trim())
            .await?;
        if removed {
            info!(
                service = service_name,
                endpoint = endpoint_name,
                "removed endpoint policy"
            );
        }
        Ok(removed)
    }

    async fn require_caller(&self, name: &str) -> AppResult<CallerIdentity> {
        self.graph_repository
            .find_caller_by_name(name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("caller '{name}' does not exist")))
    }

    async fn require_role(&self, name: &str) -> AppResult<Role> {
        self.admin_repository
            .find_role_by_name(name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{name}' does not exist")))
    }

    async fn require_permission(&self, name: &str) -> AppResult<Permission> {
        self.admin_repository
            .find_permission_by_name(name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission '{name}' does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use rpcguard_core::AppError;

    use super::AccessAdminService;
    use crate::test_support::FakeAccessStore;
    use crate::{EndpointPolicyStore, PermissionResolver};

    fn service(store: &Arc<FakeAccessStore>) -> AccessAdminService {
        AccessAdminService::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn seeded_graph_is_visible_to_the_resolver() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);

        assert!(admin.create_role("admin").await.is_ok());
        assert!(
            admin
                .create_permission("user:get", Some("Read users"))
                .await
                .is_ok()
        );
        assert!(admin.grant_permission("admin", "user:get").await.is_ok());
        let caller = admin.register_caller("svc-a", Some("admin")).await;
        assert!(caller.is_ok());
        assert!(caller.ok().and_then(|caller| caller.default_role_id()).is_some());

        let resolver = PermissionResolver::new(store.clone());
        assert_eq!(
            resolver.resolve_all_permissions("svc-a").await.ok(),
            Some(BTreeSet::from(["user:get".to_owned()]))
        );
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);

        assert!(admin.create_role("admin").await.is_ok());
        assert!(matches!(
            admin.create_role(" admin ").await,
            Err(AppError::Conflict(_))
        ));
        assert!(admin.create_permission("user:get", None).await.is_ok());
        assert!(matches!(
            admin.create_permission("user:get", None).await,
            Err(AppError::Conflict(_))
        ));
        assert!(admin.register_caller("svc-a", None).await.is_ok());
        assert!(matches!(
            admin.register_caller("svc-a", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn malformed_permission_names_are_rejected() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);

        for name in ["user", "user:", ":get", "user:get:all", "user get:x"] {
            assert!(
                matches!(
                    admin.create_permission(name, None).await,
                    Err(AppError::Validation(_))
                ),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_references_are_not_found() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);
        assert!(admin.create_role("admin").await.is_ok());

        assert!(matches!(
            admin.register_caller("svc-a", Some("missing")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            admin.assign_role("ghost", "admin").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            admin.grant_permission("admin", "user:get").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            admin
                .set_endpoint_policy("UserService", "getUser", "user:get")
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn memberships_and_grants_can_be_withdrawn() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);
        let resolver = PermissionResolver::new(store.clone());

        assert!(admin.create_role("reader").await.is_ok());
        assert!(admin.create_permission("user:list", None).await.is_ok());
        assert!(admin.grant_permission("reader", "user:list").await.is_ok());
        assert!(admin.register_caller("svc-r", None).await.is_ok());
        assert!(admin.assign_role("svc-r", "reader").await.is_ok());
        assert!(matches!(
            resolver.has_permission("svc-r", "user:list").await,
            Ok(true)
        ));

        assert!(admin.revoke_permission("reader", "user:list").await.is_ok());
        assert!(matches!(
            resolver.has_permission("svc-r", "user:list").await,
            Ok(false)
        ));

        assert!(admin.unassign_role("svc-r", "reader").await.is_ok());
        assert_eq!(
            resolver.resolve_roles("svc-r").await.ok(),
            Some(BTreeSet::new())
        );
    }

    #[tokio::test]
    async fn endpoint_policies_are_replaced_and_removed() {
        let store = Arc::new(FakeAccessStore::default());
        let admin = service(&store);
        let policies = EndpointPolicyStore::new(store.clone());

        assert!(admin.create_permission("user:get", None).await.is_ok());
        assert!(admin.create_permission("user:admin", None).await.is_ok());
        assert!(
            admin
                .set_endpoint_policy("UserService", "getUser", "user:get")
                .await
                .is_ok()
        );
        assert!(
            admin
                .set_endpoint_policy("UserService", "getUser", "user:admin")
                .await
                .is_ok()
        );
        assert_eq!(
            policies
                .required_permission("UserService", "getUser")
                .await
                .ok(),
            Some(Some("user:admin".to_owned()))
        );

        assert!(matches!(
            admin.remove_endpoint_policy("UserService", "getUser").await,
            Ok(true)
        ));
        assert!(matches!(
            admin.remove_endpoint_policy("UserService", "getUser").await,
            Ok(false)
        ));
    }
}
