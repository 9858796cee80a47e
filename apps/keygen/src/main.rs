//! Operator tool that issues and revokes rotating api keys.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use rpcguard_application::{KeyLifecycleService, RevokeOutcome};
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::DEFAULT_API_KEY_VALIDITY_DAYS;
use rpcguard_infrastructure::{PostgresAccessRepository, PostgresApiKeyRepository, connect};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct KeygenConfig {
    database_url: String,
    default_validity_days: u32,
}

/// Issue and revoke rotating api keys.
#[derive(Parser, Debug)]
#[command(name = "rpcguard-keygen", version)]
struct Cli {
    #[command(subcommand)]
    command: KeygenCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum KeygenCommand {
    /// issue a new key and print its secret once
    Issue {
        /// registered caller that will own the key
        #[arg(value_parser = NonEmptyStringValueParser::new())]
        owner: String,

        /// key lifetime in days (default: API_KEY_VALIDITY_DAYS)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        validity_days: Option<u32>,
    },

    /// revoke the key matching a plaintext secret
    Revoke {
        /// plaintext secret printed at issue time
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let Cli { command } = Cli::parse();
    let config = KeygenConfig::load()?;
    let pool = connect(config.database_url.as_str(), 2).await?;

    let lifecycle = KeyLifecycleService::new(
        Arc::new(PostgresAccessRepository::new(pool.clone())),
        Arc::new(PostgresApiKeyRepository::new(pool.clone())),
        config.default_validity_days,
    );

    match command {
        KeygenCommand::Issue {
            owner,
            validity_days,
        } => {
            let issued = lifecycle.issue(owner.as_str(), validity_days).await?;
            // The secret goes to stdout only; it cannot be recovered later.
            println!("{}", issued.secret.expose());
            info!(
                key_id = %issued.key_id,
                owner = %issued.owner,
                expires_at = %issued.expires_at,
                "api key issued"
            );
        }
        KeygenCommand::Revoke { secret } => {
            let outcome = lifecycle.revoke(secret.as_str()).await?;
            let label = match outcome {
                RevokeOutcome::Revoked => "revoked",
                RevokeOutcome::AlreadyRevoked => "already revoked",
                RevokeOutcome::NotFound => "not found",
            };
            println!("{label}");
        }
    }

    pool.close().await;
    Ok(())
}

impl KeygenConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let default_validity_days =
            parse_env_u32("API_KEY_VALIDITY_DAYS", DEFAULT_API_KEY_VALIDITY_DAYS)?;

        if default_validity_days == 0 {
            return Err(AppError::Validation(
                "API_KEY_VALIDITY_DAYS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            default_validity_days,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
