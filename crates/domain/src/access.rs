//! Role and permission entities of the access graph.

use rpcguard_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
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

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(Uuid);

impl PermissionId {
    /// Creates a new random permission identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a permission identifier from an existing UUID value.
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

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Named bundle of permissions assignable to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
}

impl Role {
    /// Creates a role with a trimmed, non-empty name.
    pub fn new(id: RoleId, name: impl Into<String>) -> AppResult<Self> {
        let name = NonEmptyString::new(name.into().trim())?;
        Ok(Self { id, name })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// Atomic named capability, conventionally `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    name: NonEmptyString,
    description: Option<String>,
}

impl Permission {
    /// Creates a permission after validating the `resource:action` name shape.
    pub fn new(
        id: PermissionId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> AppResult<Self> {
        let name = name.into();
        validate_permission_name(name.as_str())?;

        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description: description.filter(|value| !value.trim().is_empty()),
        })
    }

    /// Returns the permission identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the unique permission name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Validates that a permission name follows `resource:action`.
pub fn validate_permission_name(name: &str) -> AppResult<()> {
    let Some((resource, action)) = name.split_once(':') else {
        return Err(AppError::Validation(format!(
            "permission '{name}' must follow the 'resource:action' convention"
        )));
    };

    let part_is_valid = |part: &str| {
        !part.is_empty()
            && !part.contains(':')
            && part
                .chars()
                .all(|character| !character.is_whitespace() && !character.is_control())
    };

    if !part_is_valid(resource) || !part_is_valid(action) {
        return Err(AppError::Validation(format!(
            "permission '{name}' must follow the 'resource:action' convention"
        )));
    }

    Ok(())
}
