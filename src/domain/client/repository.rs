//! Client repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{ClientId, ClientIdentity, ClientStatus};
use crate::domain::DomainError;

/// Persistence for client identities
///
/// Implementations must reject a second identity carrying an already registered
/// credential hash with `DomainError::Conflict`.
#[async_trait]
pub trait ClientRepository: Send + Sync + Debug {
    async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError>;

    /// Lookup used during credential exchange
    async fn get_by_credential_hash(
        &self,
        hash: &str,
    ) -> Result<Option<ClientIdentity>, DomainError>;

    async fn create(&self, client: ClientIdentity) -> Result<ClientIdentity, DomainError>;

    async fn update(&self, client: &ClientIdentity) -> Result<ClientIdentity, DomainError>;

    async fn delete(&self, id: &ClientId) -> Result<bool, DomainError>;

    async fn list(&self, status: Option<ClientStatus>) -> Result<Vec<ClientIdentity>, DomainError>;

    async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError>;

    /// Stamp `last_used_at` with the current time
    async fn record_usage(&self, id: &ClientId) -> Result<(), DomainError>;
}
