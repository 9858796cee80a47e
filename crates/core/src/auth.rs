use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standardized RPC status kinds surfaced by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    /// Request payload or argument was invalid.
    InvalidArgument,
    /// Referenced resource does not exist.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// Caller is authenticated but not allowed to invoke the method.
    PermissionDenied,
    /// Operation rejected because of the server lifecycle state.
    FailedPrecondition,
    /// Method is not registered.
    Unimplemented,
    /// Server-side failure unrelated to the caller.
    Internal,
    /// Caller could not be authenticated.
    Unauthenticated,
}

impl RpcCode {
    /// Returns the canonical upper-case status name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Returns the conventional gRPC numeric status code.
    #[must_use]
    pub fn grpc_code(&self) -> u16 {
        match self {
            Self::InvalidArgument => 3,
            Self::NotFound => 5,
            Self::AlreadyExists => 6,
            Self::PermissionDenied => 7,
            Self::FailedPrecondition => 9,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unauthenticated => 16,
        }
    }
}

/// Typed reasons a call was refused by the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// No credential was present in the metadata channel.
    #[error("missing credential in metadata entry '{metadata_key}'")]
    MissingCredential {
        /// Metadata entry that was expected to carry the credential.
        metadata_key: String,
    },

    /// Credential could not be parsed as any supported kind.
    #[error("malformed credential: {reason}")]
    MalformedCredential {
        /// Parser diagnostic, never containing the credential itself.
        reason: String,
    },

    /// Well-formed api key that matches no stored credential.
    #[error("api key is not recognized")]
    UnknownCredential,

    /// Api key was revoked.
    #[error("api key has been revoked")]
    RevokedCredential,

    /// Credential is past its expiry.
    #[error("credential has expired")]
    ExpiredCredential,

    /// Signed token failed signature verification.
    #[error("signed token failed signature verification")]
    InvalidSignature,

    /// Signed token was issued for a different audience.
    #[error("signed token audience is not '{expected}'")]
    WrongAudience {
        /// Audience reserved for RPC authorization.
        expected: String,
    },

    /// Credential subject does not resolve to a registered caller.
    #[error("caller '{caller}' is not registered")]
    UnknownCaller {
        /// Subject named by the credential.
        caller: String,
    },

    /// Caller holds none of the roles the service requires.
    #[error("caller '{caller}' holds none of the required roles: {}", .required_roles.join(", "))]
    InsufficientRole {
        /// Authenticated caller name.
        caller: String,
        /// Roles that would have allowed the call.
        required_roles: Vec<String>,
    },

    /// Caller lacks the permission mapped to the endpoint.
    #[error("caller '{caller}' is missing permission '{permission}'")]
    InsufficientPermission {
        /// Authenticated caller name.
        caller: String,
        /// Permission required by the endpoint policy.
        permission: String,
    },
}

impl AuthFailure {
    /// Returns the status kind this failure maps to.
    #[must_use]
    pub fn code(&self) -> RpcCode {
        match self {
            Self::InsufficientRole { .. } | Self::InsufficientPermission { .. } => {
                RpcCode::PermissionDenied
            }
            _ => RpcCode::Unauthenticated,
        }
    }
}

/// Kind of credential a caller authenticated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Database-backed rotating api key.
    ApiKey,
    /// Legacy compact signed token.
    SignedToken,
}

/// Caller identity attached to a call after successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedCaller {
    name: String,
    credential_kind: CredentialKind,
    roles: Option<BTreeSet<String>>,
    permissions: Option<BTreeSet<String>>,
}

impl AuthenticatedCaller {
    /// Creates an identity for a verified caller.
    #[must_use]
    pub fn new(name: impl Into<String>, credential_kind: CredentialKind) -> Self {
        Self {
            name: name.into(),
            credential_kind,
            roles: None,
            permissions: None,
        }
    }

    /// Attaches the role names resolved for this call.
    #[must_use]
    pub fn with_roles(mut self, roles: BTreeSet<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Attaches the permission set resolved for this call.
    #[must_use]
    pub fn with_permissions(mut self, permissions: BTreeSet<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Returns the caller name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the credential kind used for this call.
    #[must_use]
    pub fn credential_kind(&self) -> CredentialKind {
        self.credential_kind
    }

    /// Returns resolved roles, when the enforcing policy loaded them.
    #[must_use]
    pub fn roles(&self) -> Option<&BTreeSet<String>> {
        self.roles.as_ref()
    }

    /// Returns resolved permissions, when the enforcing policy loaded them.
    #[must_use]
    pub fn permissions(&self) -> Option<&BTreeSet<String>> {
        self.permissions.as_ref()
    }
}
