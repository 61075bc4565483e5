//! Credential service
//!
//! Issues long-lived client credentials, exchanges them for identities and carries
//! the administrative operations on client records.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::client::{
    validate_display_name, ClientId, ClientIdentity, ClientRepository, ClientStatus, Tier,
};
use crate::domain::DomainError;

use super::generator::{hash_credential, CredentialGenerator};

/// Result of registering a client
#[derive(Debug)]
pub struct CreatedClient {
    pub client: ClientIdentity,
    /// Plaintext credential, only returned once
    pub credential: String,
}

#[derive(Debug)]
pub struct CredentialService<R>
where
    R: ClientRepository,
{
    repository: Arc<R>,
    generator: CredentialGenerator,
}

impl<R: ClientRepository> CredentialService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            generator: CredentialGenerator::live(),
        }
    }

    /// Register a client with a freshly generated credential
    pub async fn create_client(
        &self,
        display_name: &str,
        tier: Tier,
    ) -> Result<CreatedClient, DomainError> {
        let generated = self.generator.generate();
        self.register(ClientId::generate(), display_name, tier, generated.plaintext, generated.hash)
            .await
    }

    /// Register a client with a known secret, used for bootstrap credentials
    pub async fn create_client_with_secret(
        &self,
        id: ClientId,
        display_name: &str,
        tier: Tier,
        secret: &str,
    ) -> Result<CreatedClient, DomainError> {
        let generated = self.generator.from_secret(secret);
        self.register(id, display_name, tier, generated.plaintext, generated.hash)
            .await
    }

    async fn register(
        &self,
        id: ClientId,
        display_name: &str,
        tier: Tier,
        plaintext: String,
        hash: String,
    ) -> Result<CreatedClient, DomainError> {
        let display_name = display_name.trim();
        validate_display_name(display_name)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        info!(client_id = %id, tier = %tier, "Creating client");

        let client = self
            .repository
            .create(ClientIdentity::new(id, display_name, hash, tier))
            .await?;

        info!(client_id = %client.id(), "Client created");

        Ok(CreatedClient {
            client,
            credential: plaintext,
        })
    }

    /// Resolve a plaintext credential to an active identity
    ///
    /// Unknown credentials and suspended clients both yield `None`.
    pub async fn authenticate(
        &self,
        credential: &str,
    ) -> Result<Option<ClientIdentity>, DomainError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Ok(None);
        }

        let hash = hash_credential(credential);
        let Some(client) = self.repository.get_by_credential_hash(&hash).await? else {
            debug!("No client registered for presented credential");
            return Ok(None);
        };

        if !client.is_active() {
            debug!(client_id = %client.id(), status = client.status().as_str(), "Client is not active");
            return Ok(None);
        }

        if let Err(e) = self.repository.record_usage(client.id()).await {
            warn!(client_id = %client.id(), error = %e, "Failed to record client usage");
        }

        Ok(Some(client))
    }

    pub async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError> {
        self.repository.get(id).await
    }

    pub async fn list(
        &self,
        status: Option<ClientStatus>,
    ) -> Result<Vec<ClientIdentity>, DomainError> {
        self.repository.list(status).await
    }

    pub async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError> {
        self.repository.count(status).await
    }

    pub async fn update_status(
        &self,
        id: &ClientId,
        status: ClientStatus,
    ) -> Result<ClientIdentity, DomainError> {
        info!(client_id = %id, status = status.as_str(), "Updating client status");

        let mut client = self.require(id).await?;
        match status {
            ClientStatus::Active => client.activate(),
            ClientStatus::Suspended => client.suspend(),
        }

        self.repository.update(&client).await
    }

    /// Move a client to another tier; roles are reset to the tier defaults
    pub async fn update_tier(&self, id: &ClientId, tier: Tier) -> Result<ClientIdentity, DomainError> {
        info!(client_id = %id, tier = %tier, "Updating client tier");

        let mut client = self.require(id).await?;
        client.set_tier(tier);

        self.repository.update(&client).await
    }

    /// Set or clear the per-client quota override
    pub async fn update_quota(
        &self,
        id: &ClientId,
        quota: Option<u32>,
    ) -> Result<ClientIdentity, DomainError> {
        info!(client_id = %id, quota = ?quota, "Updating client quota");

        let mut client = self.require(id).await?;
        client.set_quota_override(quota);

        self.repository.update(&client).await
    }

    pub async fn delete(&self, id: &ClientId) -> Result<bool, DomainError> {
        info!(client_id = %id, "Deleting client");
        self.repository.delete(id).await
    }

    async fn require(&self, id: &ClientId) -> Result<ClientIdentity, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Client '{}' not found", id)))
    }
}
