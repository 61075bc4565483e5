//! PMP Analytics Gateway
//!
//! Front door for a read-heavy analytics API:
//! - Long-lived client credentials exchanged for short-lived RS256 tokens
//! - Per-client fixed-window quotas in a shared store
//! - Memoized query results, invalidated when new data lands

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::{AppState, CredentialServiceTrait};
use config::{AuthConfig, CredentialBackend, CredentialsConfig};
use domain::client::{ClientId, Tier};
use domain::DomainError;
use infrastructure::{
    analytics::{spawn_invalidation_listener, Dataset, DatasetWriter, InMemoryDatasetResolver},
    auth::JwksTokenService,
    cache::{CacheFactory, CacheLayer},
    client::{
        CredentialGenerator, CredentialService, InMemoryClientRepository, PostgresClientRepository,
    },
    gateway::GatewayMiddleware,
    quota::QuotaEnforcer,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Id of the enterprise client registered for `auth.bootstrap_admin_key`
pub const BOOTSTRAP_ADMIN_ID: &str = "bootstrap-admin";

/// New-data signals buffered ahead of the invalidation listener
const SIGNAL_BUFFER: usize = 1024;

/// Create the application state with custom configuration
///
/// Spawns the invalidation listener; it runs until the state is dropped.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let tokens = Arc::new(create_token_service(&config.auth)?);

    let store_config = config.cache.store_config()?;
    info!(backend = %store_config.cache_type, "Shared store backend");
    let store = CacheFactory::create(&store_config).await?;

    let gateway = GatewayMiddleware::new(
        tokens,
        QuotaEnforcer::new(store.clone(), config.quota.quota_config()),
        CacheLayer::new(store, config.cache.layer_config()),
        config.cache.default_query_ttl(),
    );

    let credential_service = create_credential_service(&config.credentials).await?;

    if let Some(secret) = config.auth.bootstrap_admin_key.as_deref() {
        ensure_bootstrap_admin(credential_service.as_ref(), secret).await?;
    }

    let dataset = Dataset::new();
    let (signals, receiver) = mpsc::channel(SIGNAL_BUFFER);
    spawn_invalidation_listener(gateway.cache().clone(), receiver);

    Ok(AppState::new(
        credential_service,
        gateway,
        Arc::new(InMemoryDatasetResolver::new(dataset.clone())),
        DatasetWriter::new(dataset, signals),
    ))
}

/// Load the signing key from a JWKS file, an inline JWKS, or generate one
fn create_token_service(config: &AuthConfig) -> Result<JwksTokenService, DomainError> {
    let key_id = config.key_id.as_deref();

    if let Some(path) = &config.jwks_path {
        info!(path = %path, "Loading signing key from JWKS file");
        return JwksTokenService::from_jwks_path(path, key_id, config.token_config());
    }

    if let Some(jwks_json) = &config.jwks_json {
        info!("Loading signing key from inline JWKS");
        return JwksTokenService::from_jwks_json(jwks_json, key_id, config.token_config());
    }

    warn!("No signing key configured; generating one. Issued tokens will not survive a restart");
    JwksTokenService::generate(config.token_config())
}

async fn create_credential_service(
    config: &CredentialsConfig,
) -> Result<Arc<dyn CredentialServiceTrait>, DomainError> {
    match config.backend()? {
        CredentialBackend::Memory => {
            info!("Using in-memory credential store");
            Ok(Arc::new(CredentialService::new(Arc::new(
                InMemoryClientRepository::new(),
            ))))
        }
        CredentialBackend::Postgres => {
            info!("Connecting to PostgreSQL credential store...");
            let repository = PostgresClientRepository::connect(&config.postgres_config()?).await?;
            info!("PostgreSQL connection established");
            Ok(Arc::new(CredentialService::new(Arc::new(repository))))
        }
    }
}

/// Register the bootstrap admin, replacing it when the configured key changed
pub async fn ensure_bootstrap_admin(
    service: &dyn CredentialServiceTrait,
    secret: &str,
) -> Result<(), DomainError> {
    let id = ClientId::new(BOOTSTRAP_ADMIN_ID).map_err(|e| DomainError::validation(e.to_string()))?;
    let credential = CredentialGenerator::live().from_secret(secret).plaintext;

    if service.get(&id).await?.is_some() {
        let current = service.authenticate(&credential).await?;
        if current.as_ref().is_some_and(|client| client.id() == &id) {
            info!(client_id = %id, "Bootstrap admin already registered");
            return Ok(());
        }

        warn!(client_id = %id, "Bootstrap admin key changed or client suspended; re-registering");
        service.delete(&id).await?;
    }

    service
        .create_client_with_secret(id, "Bootstrap admin", Tier::Enterprise, &credential)
        .await?;

    info!(client_id = BOOTSTRAP_ADMIN_ID, "Bootstrap admin registered");
    Ok(())
}
