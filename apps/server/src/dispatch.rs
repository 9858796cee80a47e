//! RPC server shell: service registration, lifecycle, and call routing.


use std::collections::BTreeMap;
use std::fmt;

use rpcguard_application::{
    CompositionPolicy, HandlerMap, MiddlewareComposer, RpcCall, RpcHandler, RpcReply,
};
use rpcguard_core::{AppError, AppResult};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Lifecycle of the harness. `Stopped` and `ForceShutdown` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Created,
    Started,
    Stopped,
    ForceShutdown,
}

impl HarnessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::ForceShutdown)
    }
}

impl fmt::Display for HarnessState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::ForceShutdown => "force_shutdown",
        };
        formatter.write_str(label)
    }
}

/// How a service is guarded when it is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAuthorization {
    /// Per-endpoint policy discovered under the service's own name.
    Discovered,
    /// Whole service opted out; handlers are registered unmodified.
    Disabled,
    /// Explicit composition policy.
    Policy(CompositionPolicy),
}

/// Registers service handler maps and routes calls to them.
///
/// Registration happens before `start` through `&mut self`; afterwards the
/// service table is only read, so it is shared without locking.
pub struct DispatchHarness {
    composer: MiddlewareComposer,
    strict_policy: bool,
    services: BTreeMap<String, HandlerMap>,
    lifecycle: watch::Sender<HarnessState>,
}

impl DispatchHarness {
    /// Creates a harness. With `strict_policy`, a policy-load failure fails
    /// registration instead of registering unprotected handlers.
    pub fn new(composer: MiddlewareComposer, strict_policy: bool) -> Self {
        let (lifecycle, _) = watch::channel(HarnessState::Created);
        Self {
            composer,
            strict_policy,
            services: BTreeMap::new(),
            lifecycle,
        }
    }

    pub fn state(&self) -> HarnessState {
        *self.lifecycle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HarnessState> {
        self.lifecycle.subscribe()
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub async fn register_service(
        &mut self,
        service_name: &str,
        handlers: HandlerMap,
        authorization: ServiceAuthorization,
    ) -> AppResult<()> {
        let state = self.state();
        if state != HarnessState::Created {
            return Err(AppError::InvalidState(format!(
                "cannot register service '{service_name}' once the harness is {state}"
            )));
        }
        if self.services.contains_key(service_name) {
            return Err(AppError::Conflict(format!(
                "service '{service_name}' is already registered"
            )));
        }

        let policy = match authorization {
            ServiceAuthorization::Disabled => None,
            ServiceAuthorization::Discovered => Some(CompositionPolicy::per_endpoint(service_name)),
            ServiceAuthorization::Policy(policy) => Some(policy),
        };

        let composed = match policy {
            None => {
                warn!(service = service_name, "registering service without authorization");
                handlers
            }
            Some(policy) => match self.composer.compose(handlers.clone(), &policy).await {
                Ok(composed) => composed,
                Err(compose_error) if self.strict_policy => {
                    error!(
                        service = service_name,
                        error = %compose_error,
                        "failed to apply authorization policy; refusing registration"
                    );
                    return Err(compose_error);
                }
                Err(compose_error) => {
                    error!(
                        service = service_name,
                        error = %compose_error,
                        "failed to apply authorization policy; registering unprotected handlers"
                    );
                    handlers
                }
            },
        };

        info!(
            service = service_name,
            endpoints = composed.len(),
            "registered service"
        );
        self.services.insert(service_name.to_owned(), composed);
        Ok(())
    }

    pub fn start(&self) -> AppResult<()> {
        self.transition(&[HarnessState::Created], HarnessState::Started)?;
        info!(services = self.services.len(), "dispatch harness started");
        Ok(())
    }

    /// Stops accepting calls; in-flight calls may finish.
    pub fn stop(&self) -> AppResult<()> {
        self.transition(&[HarnessState::Started], HarnessState::Stopped)?;
        info!("dispatch harness stopped");
        Ok(())
    }

    /// Stops immediately without waiting for in-flight calls.
    pub fn force_shutdown(&self) -> AppResult<()> {
        self.transition(
            &[HarnessState::Created, HarnessState::Started],
            HarnessState::ForceShutdown,
        )?;
        warn!("dispatch harness forced to shut down");
        Ok(())
    }

    /// Routes a call to the registered, possibly guarded, handler.
    pub async fn dispatch(&self, call: RpcCall) -> AppResult<RpcReply> {
        let state = self.state();
        if state != HarnessState::Started {
            return Err(AppError::InvalidState(format!(
                "harness is {state}; calls are not accepted"
            )));
        }

        let handler = self
            .services
            .get(call.service.as_str())
            .and_then(|handlers| handlers.get(call.endpoint.as_str()))
            .cloned()
            .ok_or_else(|| {
                AppError::Unimplemented(format!("method '{}.{}'", call.service, call.endpoint))
            })?;

        handler.call(call).await
    }

    fn transition(&self, allowed_from: &[HarnessState], to: HarnessState) -> AppResult<()> {
        let mut outcome = Ok(());
        self.lifecycle.send_if_modified(|state| {
            if allowed_from.contains(state) {
                *state = to;
                return true;
            }

            outcome = Err(AppError::InvalidState(format!(
                "cannot move harness from {state} to {to}"
            )));
            false
        });
        outcome
    }
}
