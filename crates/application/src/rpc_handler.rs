//! Transport-neutral RPC call and handler abstractions.
//!
//! A service is a [`HandlerMap`] from endpoint name to handler. Enforcement
//! wraps entries with decorating handlers, so business handlers keep their
//! signature and only their invocation is gated.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rpcguard_core::{AppResult, AuthenticatedCaller};
use serde_json::Value;

/// Response payload produced by a handler.
pub type RpcReply = Value;

/// Shared, type-erased handler.
pub type SharedHandler = Arc<dyn RpcHandler>;

/// Endpoint name to handler map for one service.
pub type HandlerMap = BTreeMap<String, SharedHandler>;

/// Case-insensitive call metadata (the credential channel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcMetadata(BTreeMap<String, String>);

impl RpcMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, replacing any previous value for the same key.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(key.as_ref().trim().to_ascii_lowercase(), value.into());
    }

    /// Returns the value of an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key.trim().to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    /// Returns whether no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RpcMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

/// One inbound call as seen by handlers.
#[derive(Debug, Clone)]
pub struct RpcCall {
    /// Target service name.
    pub service: String,
    /// Target endpoint (method) name.
    pub endpoint: String,
    /// Transport metadata.
    pub metadata: RpcMetadata,
    /// Request payload.
    pub payload: Value,
    /// Caller attached by the enforcing middleware, if any.
    pub caller: Option<AuthenticatedCaller>,
}

impl RpcCall {
    /// Creates an unauthenticated call without metadata.
    #[must_use]
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
            metadata: RpcMetadata::new(),
            payload,
            caller: None,
        }
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Returns the caller attached by authorization middleware.
    #[must_use]
    pub fn caller(&self) -> Option<&AuthenticatedCaller> {
        self.caller.as_ref()
    }
}

/// Business or decorating handler for one endpoint.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Handles one call.
    async fn call(&self, call: RpcCall) -> AppResult<RpcReply>;
}

/// Adapter turning an async closure into a handler.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RpcHandler for FnHandler<F>
where
    F: Fn(RpcCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<RpcReply>> + Send + 'static,
{
    async fn call(&self, call: RpcCall) -> AppResult<RpcReply> {
        (self.0)(call).await
    }
}

/// Wraps an async closure as a shared handler.
pub fn handler_fn<F, Fut>(handler: F) -> SharedHandler
where
    F: Fn(RpcCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<RpcReply>> + Send + 'static,
{
    Arc::new(FnHandler(handler))
}
