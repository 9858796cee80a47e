use rpcguard_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RoleId;

/// Unique identifier for a registered caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallerId(Uuid);

impl CallerId {
    /// Creates a new random caller identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a caller identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Principal (an integrating service) that makes RPC calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    id: CallerId,
    name: NonEmptyString,
    default_role_id: Option<RoleId>,
}

impl CallerIdentity {
    /// Creates a caller identity with a trimmed, non-empty name.
    pub fn new(
        id: CallerId,
        name: impl Into<String>,
        default_role_id: Option<RoleId>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name.into().trim())?,
            default_role_id,
        })
    }

    /// Returns the caller identifier.
    #[must_use]
    pub fn id(&self) -> CallerId {
        self.id
    }

    /// Returns the unique caller name used as token subject.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the role assigned when the caller was registered.
    #[must_use]
    pub fn default_role_id(&self) -> Option<RoleId> {
        self.default_role_id
    }
}
