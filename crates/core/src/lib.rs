//! Shared primitives for all Rust crates in rpcguard.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::{AuthFailure, AuthenticatedCaller, CredentialKind, RpcCode};

/// Result type used across rpcguard crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Requested RPC method is not registered.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Caller failed authentication or authorization.
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the RPC status code this error is reported with.
    #[must_use]
    pub fn code(&self) -> RpcCode {
        match self {
            Self::Validation(_) => RpcCode::InvalidArgument,
            Self::NotFound(_) => RpcCode::NotFound,
            Self::Conflict(_) => RpcCode::AlreadyExists,
            Self::InvalidState(_) => RpcCode::FailedPrecondition,
            Self::Unimplemented(_) => RpcCode::Unimplemented,
            Self::Auth(failure) => failure.code(),
            Self::Internal(_) => RpcCode::Internal,
        }
    }

    /// Returns the authorization failure, if this error is one.
    #[must_use]
    pub fn auth_failure(&self) -> Option<&AuthFailure> {
        match self {
            Self::Auth(failure) => Some(failure),
            _ => None,
        }
    }
}
