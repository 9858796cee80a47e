use std::collections::BTreeMap;
use std::sync::Arc;

use rpcguard_core::AppResult;

use crate::EndpointPolicyRepository;

/// Lookup of the permission each endpoint requires.
#[derive(Clone)]
pub struct EndpointPolicyStore {
    repository: Arc<dyn EndpointPolicyRepository>,
}

impl EndpointPolicyStore {
    /// Creates a store over persisted endpoint policies.
    #[must_use]
    pub fn new(repository: Arc<dyn EndpointPolicyRepository>) -> Self {
        Self { repository }
    }

    /// Returns the permission required by one endpoint.
    ///
    /// `None` means the endpoint has no permission requirement.
    pub async fn required_permission(
        &self,
        service_name: &str,
        endpoint_name: &str,
    ) -> AppResult<Option<String>> {
        Ok(self
            .repository
            .find_endpoint_policy(service_name, endpoint_name)
            .await?
            .map(|policy| policy.required_permission().to_owned()))
    }

    /// Returns endpoint to required permission for every mapped endpoint of
    /// a service.
    pub async fn permission_map(&self, service_name: &str) -> AppResult<BTreeMap<String, String>> {
        Ok(self
            .repository
            .list_endpoint_policies(service_name)
            .await?
            .into_iter()
            .map(|policy| {
                (
                    policy.endpoint_name().to_owned(),
                    policy.required_permission().to_owned(),
                )
            })
            .collect())
    }
}
