//! RPC authorization server composition root.

#![forbid(unsafe_code)]

mod demo_services;
mod dev_seed;
mod dispatch;
mod error;
mod server_config;
mod stores;
mod transport;

use std::sync::Arc;

use rpcguard_application::{
    CredentialVerifier, EndpointPolicyStore, MiddlewareComposer, PermissionResolver,
};
use rpcguard_core::AppError;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::demo_services::{USER_SERVICE, user_service};
use crate::dispatch::{DispatchHarness, ServiceAuthorization};
use crate::server_config::{ServerConfig, StoreBackend, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::load()?;

    if config.migrate_only {
        if let StoreBackend::Postgres { database_url } = &config.store_backend {
            stores::migrate(database_url).await?;
        }
        info!("database migrations applied successfully");
        return Ok(());
    }

    let stores = stores::open(&config.store_backend).await?;
    if config.dev_seed {
        dev_seed::run(&stores, config.auth.default_key_validity_days()).await?;
    }

    let composer = MiddlewareComposer::new(
        CredentialVerifier::new(stores.graph.clone(), stores.api_keys.clone(), &config.auth),
        PermissionResolver::new(stores.graph.clone()),
        EndpointPolicyStore::new(stores.endpoint_policies.clone()),
    );
    let mut harness = DispatchHarness::new(composer, config.strict_policy);
    harness
        .register_service(USER_SERVICE, user_service(), ServiceAuthorization::Discovered)
        .await?;
    harness.start()?;
    info!(
        services = ?harness.service_names().collect::<Vec<_>>(),
        "dispatch harness ready"
    );
    let harness = Arc::new(harness);

    let address = config.socket_address()?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;
    info!(%address, metadata_key = config.auth.metadata_key(), "rpc server listening");

    tokio::spawn(shutdown_on_signals(harness.clone()));
    transport::serve(harness, listener).await
}

/// Interrupt stops gracefully; terminate forces shutdown.
async fn shutdown_on_signals(harness: Arc<DispatchHarness>) {
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => {
            if interrupted.is_err() {
                return;
            }
            if let Err(error) = harness.stop() {
                warn!(%error, "graceful stop rejected");
            }
        }
        () = terminate_signal() => {
            if let Err(error) = harness.force_shutdown() {
                warn!(%error, "force shutdown rejected");
            }
        }
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(error) => {
            warn!(%error, "terminate signal handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
