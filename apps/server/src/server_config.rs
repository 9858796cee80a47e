use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rpcguard_application::{AuthSettings, DEFAULT_METADATA_KEY, DEFAULT_TOKEN_AUDIENCE};
use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::DEFAULT_API_KEY_VALIDITY_DAYS;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub migrate_only: bool,
    pub store_backend: StoreBackend,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub auth: AuthSettings,
    pub strict_policy: bool,
    pub dev_seed: bool,
}

impl ServerConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_owned())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "STORE_BACKEND must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let rpc_host = env::var("RPC_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let rpc_port = parse_env_u16("RPC_PORT", 50051)?;

        let token_secret = required_env("RPC_AUTH_TOKEN_SECRET")?;
        let auth = AuthSettings::new(token_secret)
            .map_err(|_| {
                AppError::Validation(
                    "RPC_AUTH_TOKEN_SECRET must be at least 32 characters".to_owned(),
                )
            })?
            .with_token_audience(
                env::var("RPC_AUTH_TOKEN_AUDIENCE")
                    .unwrap_or_else(|_| DEFAULT_TOKEN_AUDIENCE.to_owned()),
            )?
            .with_metadata_key(
                env::var("RPC_AUTH_METADATA_KEY").unwrap_or_else(|_| DEFAULT_METADATA_KEY.to_owned()),
            )?
            .with_default_key_validity_days(parse_env_u32(
                "API_KEY_VALIDITY_DAYS",
                DEFAULT_API_KEY_VALIDITY_DAYS,
            )?)?;

        let strict_policy = env_flag("RPC_AUTH_STRICT_POLICY");
        let dev_seed = env_flag("RPC_DEV_SEED");
        if migrate_only && store_backend == StoreBackend::Memory {
            return Err(AppError::Validation(
                "migrate requires STORE_BACKEND=postgres".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            store_backend,
            rpc_host,
            rpc_port,
            auth,
            strict_policy,
            dev_seed,
        })
    }

    pub fn socket_address(&self) -> AppResult<SocketAddr> {
        let host = IpAddr::from_str(&self.rpc_host).map_err(|error| {
            AppError::Validation(format!("invalid RPC_HOST '{}': {error}", self.rpc_host))
        })?;
        Ok(SocketAddr::from((host, self.rpc_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
