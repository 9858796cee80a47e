//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod api_key;
mod caller;
mod credential;
mod endpoint_policy;

pub use access::{Permission, PermissionId, Role, RoleId, validate_permission_name};
pub use api_key::{
    API_KEY_SECRET_BYTES, API_KEY_SECRET_HEX_LENGTH, ApiKey, ApiKeyId, ApiKeySecret,
    DEFAULT_API_KEY_VALIDITY_DAYS, is_api_key_shape,
};
pub use caller::{CallerId, CallerIdentity};
pub use credential::{PresentedCredential, credential_from_metadata_value};
pub use endpoint_policy::EndpointPolicy;
