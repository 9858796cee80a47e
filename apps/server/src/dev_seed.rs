//! Development seed: one privileged caller, one permission, one guarded
//! endpoint, and a fresh api key printed to stdout.

use rpcguard_application::{AccessAdminService, KeyLifecycleService};
use rpcguard_core::{AppError, AppResult};
use tracing::info;

use crate::demo_services::USER_SERVICE;
use crate::stores::AccessStores;

const DEV_SEED_CALLER: &str = "svc-a";
const DEV_SEED_ROLE: &str = "admin";
const DEV_SEED_PERMISSION: &str = "user:get";
const DEV_SEED_ENDPOINT: &str = "getUser";

pub async fn run(stores: &AccessStores, default_validity_days: u32) -> AppResult<()> {
    let admin = AccessAdminService::new(stores.admin.clone(), stores.graph.clone());

    ensure_created(admin.create_role(DEV_SEED_ROLE).await)?;
    ensure_created(
        admin
            .create_permission(DEV_SEED_PERMISSION, Some("Read a user record"))
            .await,
    )?;
    admin
        .grant_permission(DEV_SEED_ROLE, DEV_SEED_PERMISSION)
        .await?;
    ensure_created(
        admin
            .register_caller(DEV_SEED_CALLER, Some(DEV_SEED_ROLE))
            .await,
    )?;
    admin.assign_role(DEV_SEED_CALLER, DEV_SEED_ROLE).await?;
    admin
        .set_endpoint_policy(USER_SERVICE, DEV_SEED_ENDPOINT, DEV_SEED_PERMISSION)
        .await?;

    let lifecycle = KeyLifecycleService::new(
        stores.graph.clone(),
        stores.api_keys.clone(),
        default_validity_days,
    );
    let issued = lifecycle.issue(DEV_SEED_CALLER, None).await?;
    info!(
        caller = DEV_SEED_CALLER,
        key_id = %issued.key_id,
        "development seed applied"
    );

    // Printed once and never logged.
    println!(
        "dev api key for {}: {} (expires {})",
        issued.owner,
        issued.secret.expose(),
        issued.expires_at
    );

    Ok(())
}

/// Treats an already existing record as seeded.
fn ensure_created<T>(result: AppResult<T>) -> AppResult<()> {
    match result {
        Ok(_) | Err(AppError::Conflict(_)) => Ok(()),
        Err(error) => Err(error),
    }
}
