//! Application state for shared services

use std::sync::Arc;

use crate::domain::analytics::Resolver;
use crate::domain::client::{ClientId, ClientIdentity, ClientRepository, ClientStatus, Tier};
use crate::domain::DomainError;
use crate::infrastructure::analytics::DatasetWriter;
use crate::infrastructure::client::{CreatedClient, CredentialService};
use crate::infrastructure::gateway::GatewayMiddleware;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub credential_service: Arc<dyn CredentialServiceTrait>,
    pub gateway: GatewayMiddleware,
    pub resolver: Arc<dyn Resolver>,
    pub writer: DatasetWriter,
}

impl AppState {
    pub fn new(
        credential_service: Arc<dyn CredentialServiceTrait>,
        gateway: GatewayMiddleware,
        resolver: Arc<dyn Resolver>,
        writer: DatasetWriter,
    ) -> Self {
        Self {
            credential_service,
            gateway,
            resolver,
            writer,
        }
    }
}

/// Trait for credential service operations
#[async_trait::async_trait]
pub trait CredentialServiceTrait: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<Option<ClientIdentity>, DomainError>;
    async fn create_client(&self, display_name: &str, tier: Tier) -> Result<CreatedClient, DomainError>;
    async fn create_client_with_secret(
        &self,
        id: ClientId,
        display_name: &str,
        tier: Tier,
        secret: &str,
    ) -> Result<CreatedClient, DomainError>;
    async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError>;
    async fn list(&self, status: Option<ClientStatus>) -> Result<Vec<ClientIdentity>, DomainError>;
    async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError>;
    async fn update_status(
        &self,
        id: &ClientId,
        status: ClientStatus,
    ) -> Result<ClientIdentity, DomainError>;
    async fn update_tier(&self, id: &ClientId, tier: Tier) -> Result<ClientIdentity, DomainError>;
    async fn update_quota(
        &self,
        id: &ClientId,
        quota: Option<u32>,
    ) -> Result<ClientIdentity, DomainError>;
    async fn delete(&self, id: &ClientId) -> Result<bool, DomainError>;
}

#[async_trait::async_trait]
impl<R: ClientRepository + 'static> CredentialServiceTrait for CredentialService<R> {
    async fn authenticate(&self, credential: &str) -> Result<Option<ClientIdentity>, DomainError> {
        CredentialService::authenticate(self, credential).await
    }

    async fn create_client(&self, display_name: &str, tier: Tier) -> Result<CreatedClient, DomainError> {
        CredentialService::create_client(self, display_name, tier).await
    }

    async fn create_client_with_secret(
        &self,
        id: ClientId,
        display_name: &str,
        tier: Tier,
        secret: &str,
    ) -> Result<CreatedClient, DomainError> {
        CredentialService::create_client_with_secret(self, id, display_name, tier, secret).await
    }

    async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError> {
        CredentialService::get(self, id).await
    }

    async fn list(&self, status: Option<ClientStatus>) -> Result<Vec<ClientIdentity>, DomainError> {
        CredentialService::list(self, status).await
    }

    async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError> {
        CredentialService::count(self, status).await
    }

    async fn update_status(
        &self,
        id: &ClientId,
        status: ClientStatus,
    ) -> Result<ClientIdentity, DomainError> {
        CredentialService::update_status(self, id, status).await
    }

    async fn update_tier(&self, id: &ClientId, tier: Tier) -> Result<ClientIdentity, DomainError> {
        CredentialService::update_tier(self, id, tier).await
    }

    async fn update_quota(
        &self,
        id: &ClientId,
        quota: Option<u32>,
    ) -> Result<ClientIdentity, DomainError> {
        CredentialService::update_quota(self, id, quota).await
    }

    async fn delete(&self, id: &ClientId) -> Result<bool, DomainError> {
        CredentialService::delete(self, id).await
    }
}
