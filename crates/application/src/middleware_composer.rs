//! Wraps service handler maps with authorization guards.
//!
//! Each guarded entry runs credential verification and the policy check to
//! completion before the business handler is invoked; on failure the
//! business handler never runs.

mod guards;


use std::collections::BTreeMap;
use std::sync::Arc;

use rpcguard_core::AppResult;
use tracing::debug;

use crate::{
    CredentialVerifier, EndpointPolicyStore, HandlerMap, PermissionResolver, SharedHandler,
};

use guards::{PermissionGuardedHandler, RoleGuardedHandler};

/// How a service's handlers are guarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionPolicy {
    /// Every handler requires a caller holding one fixed role.
    Global {
        /// Role name the caller must hold.
        required_role: String,
    },
    /// One switch for the whole service.
    WholeService {
        /// Disabled services pass through unmodified.
        enabled: bool,
        /// When non-empty, the caller must hold at least one of these roles.
        allowed_roles: Vec<String>,
    },
    /// Each endpoint is guarded by its own required permission, if any.
    PerEndpoint {
        /// Service name used to scope persisted endpoint policies.
        service_name: String,
        /// Explicit endpoint to permission entries that win over persisted ones.
        overrides: Option<BTreeMap<String, String>>,
    },
}

impl CompositionPolicy {
    /// Per-endpoint policy discovered from persisted endpoint policies only.
    #[must_use]
    pub fn per_endpoint(service_name: impl Into<String>) -> Self {
        Self::PerEndpoint {
            service_name: service_name.into(),
            overrides: None,
        }
    }
}

/// Applies a [`CompositionPolicy`] to a handler map.
#[derive(Clone)]
pub struct MiddlewareComposer {
    verifier: CredentialVerifier,
    resolver: PermissionResolver,
    endpoint_policies: EndpointPolicyStore,
}

impl MiddlewareComposer {
    /// Creates a composer from the authorization services.
    #[must_use]
    pub fn new(
        verifier: CredentialVerifier,
        resolver: PermissionResolver,
        endpoint_policies: EndpointPolicyStore,
    ) -> Self {
        Self {
            verifier,
            resolver,
            endpoint_policies,
        }
    }

    /// Returns a map with the same endpoint names whose entries are guarded
    /// according to `policy`.
    ///
    /// Only the per-endpoint policy reads the store here; a failed read is
    /// returned to the caller and nothing is composed. The persisted mappings
    /// are always read, so this holds even when `overrides` name every
    /// endpoint in `handlers`.
    pub async fn compose(
        &self,
        handlers: HandlerMap,
        policy: &CompositionPolicy,
    ) -> AppResult<HandlerMap> {
        match policy {
            CompositionPolicy::Global { required_role } => {
                Ok(self.guard_with_roles(handlers, std::slice::from_ref(required_role)))
            }
            CompositionPolicy::WholeService {
                enabled: false,
                ..
            } => Ok(handlers),
            CompositionPolicy::WholeService {
                enabled: true,
                allowed_roles,
            } => Ok(self.guard_with_roles(handlers, allowed_roles)),
            CompositionPolicy::PerEndpoint {
                service_name,
                overrides,
            } => {
                let persisted = self.endpoint_policies.permission_map(service_name).await?;
                Ok(self.guard_with_permissions(
                    handlers,
                    service_name,
                    &persisted,
                    overrides.as_ref(),
                ))
            }
        }
    }

    fn guard_with_roles(&self, handlers: HandlerMap, allowed_roles: &[String]) -> HandlerMap {
        handlers
            .into_iter()
            .map(|(endpoint, inner)| {
                let guarded: SharedHandler = Arc::new(RoleGuardedHandler::new(
                    inner,
                    self.verifier.clone(),
                    self.resolver.clone(),
                    allowed_roles.to_vec(),
                ));
                (endpoint, guarded)
            })
            .collect()
    }

    fn guard_with_permissions(
        &self,
        handlers: HandlerMap,
        service_name: &str,
        persisted: &BTreeMap<String, String>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> HandlerMap {
        handlers
            .into_iter()
            .map(|(endpoint, inner)| {
                let required = overrides
                    .and_then(|overrides| overrides.get(&endpoint))
                    .or_else(|| persisted.get(&endpoint));

                let Some(required_permission) = required else {
                    debug!(service = service_name, %endpoint, "endpoint left public");
                    return (endpoint, inner);
                };

                let guarded: SharedHandler = Arc::new(PermissionGuardedHandler::new(
                    inner,
                    self.verifier.clone(),
                    self.resolver.clone(),
                    required_permission.clone(),
                ));
                (endpoint, guarded)
            })
            .collect()
    }
}
