//! Client identifier validation

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Errors raised while validating client identifiers and names
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientValidationError {
    #[error("Client ID cannot be empty")]
    EmptyId,

    #[error("Client ID exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("Client ID must start and end with a letter or number and contain only letters, numbers and hyphens")]
    InvalidFormat,

    #[error("Client ID cannot contain consecutive hyphens")]
    ConsecutiveHyphens,

    #[error("Display name must be between 1 and {0} characters")]
    InvalidDisplayName(usize),
}

pub const MAX_CLIENT_ID_LENGTH: usize = 50;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

static CLIENT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?$").unwrap());

/// Validate a client ID
///
/// Rules:
/// - Cannot be empty
/// - Maximum 50 characters
/// - Only ASCII alphanumeric characters and hyphens
/// - Must start and end with alphanumeric
/// - No consecutive hyphens
pub fn validate_client_id(id: &str) -> Result<(), ClientValidationError> {
    if id.is_empty() {
        return Err(ClientValidationError::EmptyId);
    }

    if id.len() > MAX_CLIENT_ID_LENGTH {
        return Err(ClientValidationError::TooLong(MAX_CLIENT_ID_LENGTH));
    }

    if !CLIENT_ID_PATTERN.is_match(id) {
        return Err(ClientValidationError::InvalidFormat);
    }

    if id.contains("--") {
        return Err(ClientValidationError::ConsecutiveHyphens);
    }

    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), ClientValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ClientValidationError::InvalidDisplayName(
            MAX_DISPLAY_NAME_LENGTH,
        ));
    }

    Ok(())
}
