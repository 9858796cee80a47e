use async_trait::async_trait;
use rpcguard_core::{AppError, AppResult, AuthFailure, AuthenticatedCaller};
use tracing::debug;

use crate::{
    CredentialVerifier, PermissionResolver, RpcCall, RpcHandler, RpcReply, SharedHandler,
};

fn log_denial(call: &RpcCall, error: &AppError) {
    if let Some(failure) = error.auth_failure() {
        debug!(
            service = %call.service,
            endpoint = %call.endpoint,
            code = failure.code().as_str(),
            %failure,
            "call denied"
        );
    }
}

async fn authenticate(verifier: &CredentialVerifier, call: &RpcCall) -> AppResult<AuthenticatedCaller> {
    verifier
        .verify_metadata(&call.metadata)
        .await
        .inspect_err(|error| log_denial(call, error))
}

/// Requires a valid credential and, when roles are listed, membership in
/// at least one of them.
pub(super) struct RoleGuardedHandler {
    inner: SharedHandler,
    verifier: CredentialVerifier,
    resolver: PermissionResolver,
    allowed_roles: Vec<String>,
}

impl RoleGuardedHandler {
    pub(super) fn new(
        inner: SharedHandler,
        verifier: CredentialVerifier,
        resolver: PermissionResolver,
        allowed_roles: Vec<String>,
    ) -> Self {
        Self {
            inner,
            verifier,
            resolver,
            allowed_roles,
        }
    }
}

#[async_trait]
impl RpcHandler for RoleGuardedHandler {
    async fn call(&self, mut call: RpcCall) -> AppResult<RpcReply> {
        let caller = authenticate(&self.verifier, &call).await?;
        let roles = self.resolver.resolve_roles(caller.name()).await?;

        let role_allowed = self.allowed_roles.is_empty()
            || self.allowed_roles.iter().any(|role| roles.contains(role));
        if !role_allowed {
            let error = AppError::from(AuthFailure::InsufficientRole {
                caller: caller.name().to_owned(),
                required_roles: self.allowed_roles.clone(),
            });
            log_denial(&call, &error);
            return Err(error);
        }

        call.caller = Some(caller.with_roles(roles));
        self.inner.call(call).await
    }
}

/// Requires a valid credential whose caller holds one permission.
pub(super) struct PermissionGuardedHandler {
    inner: SharedHandler,
    verifier: CredentialVerifier,
    resolver: PermissionResolver,
    required_permission: String,
}

impl PermissionGuardedHandler {
    pub(super) fn new(
        inner: SharedHandler,
        verifier: CredentialVerifier,
        resolver: PermissionResolver,
        required_permission: String,
    ) -> Self {
        Self {
            inner,
            verifier,
            resolver,
            required_permission,
        }
    }
}

#[async_trait]
impl RpcHandler for PermissionGuardedHandler {
    async fn call(&self, mut call: RpcCall) -> AppResult<RpcReply> {
        let caller = authenticate(&self.verifier, &call).await?;
        let permissions = self.resolver.resolve_all_permissions(caller.name()).await?;

        if !permissions.contains(&self.required_permission) {
            let error = AppError::from(AuthFailure::InsufficientPermission {
                caller: caller.name().to_owned(),
                permission: self.required_permission.clone(),
            });
            log_denial(&call, &error);
            return Err(error);
        }

        call.caller = Some(caller.with_permissions(permissions));
        self.inner.call(call).await
    }
}
