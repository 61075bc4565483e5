//! Client credential infrastructure

mod generator;
mod postgres_repository;
mod repository;
mod service;

pub use generator::{hash_credential, CredentialGenerator, GeneratedCredential};
pub use postgres_repository::{PostgresClientConfig, PostgresClientRepository};
pub use repository::InMemoryClientRepository;
pub use service::{CreatedClient, CredentialService};
