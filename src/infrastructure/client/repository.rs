//! In-memory client repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::client::{ClientId, ClientIdentity, ClientRepository, ClientStatus};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<String, ClientIdentity>,
    /// credential hash -> client id
    by_hash: HashMap<String, String>,
}

/// Client repository held in process memory, for single-instance deployments and tests
#[derive(Debug, Default, Clone)]
pub struct InMemoryClientRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError> {
        Ok(self.tables.read().await.clients.get(id.as_str()).cloned())
    }

    async fn get_by_credential_hash(
        &self,
        hash: &str,
    ) -> Result<Option<ClientIdentity>, DomainError> {
        let tables = self.tables.read().await;

        Ok(tables
            .by_hash
            .get(hash)
            .and_then(|id| tables.clients.get(id))
            .cloned())
    }

    async fn create(&self, client: ClientIdentity) -> Result<ClientIdentity, DomainError> {
        let mut tables = self.tables.write().await;
        let id = client.id().as_str().to_string();

        if tables.clients.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "Client with ID '{}' already exists",
                id
            )));
        }

        if tables.by_hash.contains_key(client.credential_hash()) {
            return Err(DomainError::conflict(
                "A client with this credential is already registered",
            ));
        }

        tables
            .by_hash
            .insert(client.credential_hash().to_string(), id.clone());
        tables.clients.insert(id, client.clone());

        Ok(client)
    }

    async fn update(&self, client: &ClientIdentity) -> Result<ClientIdentity, DomainError> {
        let mut tables = self.tables.write().await;
        let id = client.id().as_str();

        let Some(existing) = tables.clients.get(id) else {
            return Err(DomainError::not_found(format!("Client '{}' not found", id)));
        };

        if existing.credential_hash() != client.credential_hash() {
            return Err(DomainError::validation(
                "Credential hash cannot be changed by an update",
            ));
        }

        tables.clients.insert(id.to_string(), client.clone());
        Ok(client.clone())
    }

    async fn delete(&self, id: &ClientId) -> Result<bool, DomainError> {
        let mut tables = self.tables.write().await;

        match tables.clients.remove(id.as_str()) {
            Some(client) => {
                tables.by_hash.remove(client.credential_hash());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, status: Option<ClientStatus>) -> Result<Vec<ClientIdentity>, DomainError> {
        let tables = self.tables.read().await;

        let mut clients: Vec<ClientIdentity> = tables
            .clients
            .values()
            .filter(|c| status.is_none_or(|s| c.status() == s))
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.created_at());

        Ok(clients)
    }

    async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError> {
        let tables = self.tables.read().await;

        Ok(tables
            .clients
            .values()
            .filter(|c| status.is_none_or(|s| c.status() == s))
            .count())
    }

    async fn record_usage(&self, id: &ClientId) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;

        match tables.clients.get_mut(id.as_str()) {
            Some(client) => {
                client.record_usage();
                Ok(())
            }
            None => Err(DomainError::not_found(format!("Client '{}' not found", id))),
        }
    }
}
