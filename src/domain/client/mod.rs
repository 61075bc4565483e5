//! Client domain
//!
//! Identities of API consumers: the hashed long-lived credential, commercial tier,
//! role set and status. Tier defaults for quota and roles live here too.

mod entity;
mod repository;
mod validation;

pub use entity::{ClientId, ClientIdentity, ClientStatus, InvalidTier, Role, Tier};
pub use repository::ClientRepository;
pub use validation::{
    validate_client_id, validate_display_name, ClientValidationError, MAX_DISPLAY_NAME_LENGTH,
};

#[cfg(test)]
pub use repository::mock::MockClientRepository;
