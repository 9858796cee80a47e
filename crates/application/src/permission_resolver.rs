use std::collections::BTreeSet;
use std::sync::Arc;

use rpcguard_core::{AppResult, AuthFailure};
use tracing::debug;

use crate::AccessGraphRepository;

/// Resolves effective roles and permissions for callers.
///
/// Every call reads the current graph; nothing is cached between calls.
#[derive(Clone)]
pub struct PermissionResolver {
    repository: Arc<dyn AccessGraphRepository>,
}

impl PermissionResolver {
    /// Creates a resolver over the access graph.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessGraphRepository>) -> Self {
        Self { repository }
    }

    /// Returns the names of all roles held by the caller.
    ///
    /// Unknown callers hold no roles.
    pub async fn resolve_roles(&self, caller_name: &str) -> AppResult<BTreeSet<String>> {
        let Some(caller) = self.repository.find_caller_by_name(caller_name).await? else {
            debug!(caller = caller_name, "resolving roles for unknown caller");
            return Ok(BTreeSet::new());
        };

        Ok(self
            .repository
            .list_roles_for_caller(caller.id())
            .await?
            .into_iter()
            .map(|role| role.name().to_owned())
            .collect())
    }

    /// Returns the union of permission names across all roles of the caller.
    pub async fn resolve_all_permissions(&self, caller_name: &str) -> AppResult<BTreeSet<String>> {
        let Some(caller) = self.repository.find_caller_by_name(caller_name).await? else {
            debug!(caller = caller_name, "resolving permissions for unknown caller");
            return Ok(BTreeSet::new());
        };

        let roles = self.repository.list_roles_for_caller(caller.id()).await?;

        let mut permissions = BTreeSet::new();
        for role in roles {
            let grants = self.repository.list_permissions_for_role(role.id()).await?;
            permissions.extend(grants.into_iter().map(|grant| grant.name().to_owned()));
        }

        Ok(permissions)
    }

    /// Returns whether any role of the caller grants the permission.
    pub async fn has_permission(&self, caller_name: &str, permission_name: &str) -> AppResult<bool> {
        Ok(self
            .resolve_all_permissions(caller_name)
            .await?
            .contains(permission_name))
    }

    /// Ensures the caller holds the permission.
    pub async fn require_permission(
        &self,
        caller_name: &str,
        permission_name: &str,
    ) -> AppResult<()> {
        if self.has_permission(caller_name, permission_name).await? {
            return Ok(());
        }

        Err(AuthFailure::InsufficientPermission {
            caller: caller_name.to_owned(),
            permission: permission_name.to_owned(),
        }
        .into())
    }
}
