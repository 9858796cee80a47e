//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod database;
mod in_memory_access_store;
mod postgres_access_repository;
mod postgres_api_key_repository;
mod postgres_endpoint_policy_repository;

pub use database::{connect, connect_and_migrate};
pub use in_memory_access_store::InMemoryAccessStore;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_api_key_repository::PostgresApiKeyRepository;
pub use postgres_endpoint_policy_repository::PostgresEndpointPolicyRepository;
