//! Application services and ports.

#![forbid(unsafe_code)]

mod access_admin_service;
mod access_ports;
mod api_key_crypto;
mod auth_settings;
mod credential_verifier;
mod endpoint_policy_store;
mod key_lifecycle_service;
mod middleware_composer;
mod permission_resolver;
mod rpc_handler;

#[cfg(test)]
mod test_support;

pub use access_admin_service::AccessAdminService;
pub use access_ports::{
    AccessAdminRepository, AccessGraphRepository, ApiKeyRepository, EndpointPolicyRepository,
};
pub use auth_settings::{
    AuthSettings, DEFAULT_METADATA_KEY, DEFAULT_TOKEN_AUDIENCE, MIN_TOKEN_SECRET_LENGTH,
};
pub use credential_verifier::CredentialVerifier;
pub use endpoint_policy_store::EndpointPolicyStore;
pub use key_lifecycle_service::{IssuedApiKey, KeyLifecycleService, RevokeOutcome};
pub use middleware_composer::{CompositionPolicy, MiddlewareComposer};
pub use permission_resolver::PermissionResolver;
pub use rpc_handler::{
    FnHandler, HandlerMap, RpcCall, RpcHandler, RpcMetadata, RpcReply, SharedHandler, handler_fn,
};
