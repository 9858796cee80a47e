use rpcguard_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Mapping from one RPC method to the permission required to invoke it.
///
/// `(service_name, endpoint_name)` is unique; an absent mapping means the
/// endpoint carries no permission requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    service_name: NonEmptyString,
    endpoint_name: NonEmptyString,
    required_permission: NonEmptyString,
}

impl EndpointPolicy {
    /// Creates a policy entry from trimmed names.
    pub fn new(
        service_name: impl Into<String>,
        endpoint_name: impl Into<String>,
        required_permission: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            service_name: NonEmptyString::new(service_name.into().trim())?,
            endpoint_name: NonEmptyString::new(endpoint_name.into().trim())?,
            required_permission: NonEmptyString::new(required_permission.into().trim())?,
        })
    }

    /// Returns the service the endpoint belongs to.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service_name.as_str()
    }

    /// Returns the endpoint (method) name.
    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        self.endpoint_name.as_str()
    }

    /// Returns the permission name required to invoke the endpoint.
    #[must_use]
    pub fn required_permission(&self) -> &str {
        self.required_permission.as_str()
    }
}
