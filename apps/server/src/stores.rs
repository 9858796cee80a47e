use std::sync::Arc;

use rpcguard_application::{
    AccessAdminRepository, AccessGraphRepository, ApiKeyRepository, EndpointPolicyRepository,
};
use rpcguard_core::AppResult;
use rpcguard_infrastructure::{
    InMemoryAccessStore, PostgresAccessRepository, PostgresApiKeyRepository,
    PostgresEndpointPolicyRepository, connect_and_migrate,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::server_config::StoreBackend;

const MAX_DATABASE_CONNECTIONS: u32 = 10;

/// Port handles shared by every authorization service.
#[derive(Clone)]
pub struct AccessStores {
    pub graph: Arc<dyn AccessGraphRepository>,
    pub admin: Arc<dyn AccessAdminRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub endpoint_policies: Arc<dyn EndpointPolicyRepository>,
}

impl AccessStores {
    pub fn postgres(pool: &PgPool) -> Self {
        let access = Arc::new(PostgresAccessRepository::new(pool.clone()));
        Self {
            graph: access.clone(),
            admin: access,
            api_keys: Arc::new(PostgresApiKeyRepository::new(pool.clone())),
            endpoint_policies: Arc::new(PostgresEndpointPolicyRepository::new(pool.clone())),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryAccessStore::new());
        Self {
            graph: store.clone(),
            admin: store.clone(),
            api_keys: store.clone(),
            endpoint_policies: store,
        }
    }
}

/// Connects the configured backend. Postgres schemas are migrated first.
pub async fn open(backend: &StoreBackend) -> AppResult<AccessStores> {
    match backend {
        StoreBackend::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url, MAX_DATABASE_CONNECTIONS).await?;
            info!("using postgres access store");
            Ok(AccessStores::postgres(&pool))
        }
        StoreBackend::Memory => {
            warn!("using in-memory access store; state is lost on exit");
            Ok(AccessStores::in_memory())
        }
    }
}

/// Applies migrations without building stores.
pub async fn migrate(database_url: &str) -> AppResult<()> {
    connect_and_migrate(database_url, 1).await?.close().await;
    Ok(())
}
