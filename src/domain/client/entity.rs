//! Client identity entity and tier/role lookups

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validation::{validate_client_id, ClientValidationError};

/// Client identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Create a new ClientId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ClientValidationError> {
        let id = id.into();
        validate_client_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = ClientValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a client identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Active,
    Suspended,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for ClientStatus {
    type Err = ClientValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            _ => Err(ClientValidationError::InvalidFormat),
        }
    }
}

/// Role granted to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Read,
    Write,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Roles dropped while a client is suspended
    pub fn is_privileged(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClientValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            _ => Err(ClientValidationError::InvalidFormat),
        }
    }
}

/// Unknown tier name
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid tier '{0}'. Valid tiers: free, standard, enterprise")]
pub struct InvalidTier(pub String);

/// Commercial tier of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Standard,
    Enterprise,
}

impl Tier {
    /// Requests allowed per quota window
    pub fn quota_per_window(&self) -> u32 {
        match self {
            Self::Free => 100,
            Self::Standard => 1_000,
            Self::Enterprise => 10_000,
        }
    }

    pub fn default_roles(&self) -> BTreeSet<Role> {
        match self {
            Self::Free | Self::Standard => BTreeSet::from([Role::Read]),
            Self::Enterprise => BTreeSet::from([Role::Read, Role::Write, Role::Admin]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = InvalidTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(InvalidTier(s.to_string())),
        }
    }
}

/// A registered API consumer
///
/// Only the hash of the long-lived credential is kept. A suspended client keeps its
/// record but loses its quota and every privileged role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    id: ClientId,
    display_name: String,
    /// Format: `sha256$<base64url digest>`
    credential_hash: String,
    tier: Tier,
    roles: BTreeSet<Role>,
    status: ClientStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    quota_override: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
}

impl ClientIdentity {
    /// Create an active client with the roles of its tier
    pub fn new(
        id: ClientId,
        display_name: impl Into<String>,
        credential_hash: impl Into<String>,
        tier: Tier,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            display_name: display_name.into(),
            credential_hash: credential_hash.into(),
            tier,
            roles: tier.default_roles(),
            status: ClientStatus::Active,
            quota_override: None,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: ClientStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_quota_override(mut self, quota: Option<u32>) -> Self {
        self.quota_override = quota;
        self
    }

    /// Restore persisted timestamps
    pub fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_used_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self.last_used_at = last_used_at;
        self
    }

    // Getters

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn credential_hash(&self) -> &str {
        &self.credential_hash
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn quota_override(&self) -> Option<u32> {
        self.quota_override
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.effective_roles().contains(&role)
    }

    /// Configured quota: the override when set, otherwise the tier default
    pub fn quota_per_window(&self) -> u32 {
        self.quota_override
            .unwrap_or_else(|| self.tier.quota_per_window())
    }

    /// Quota embedded in issued tokens; zero while suspended
    pub fn effective_quota(&self) -> u32 {
        match self.status {
            ClientStatus::Active => self.quota_per_window(),
            ClientStatus::Suspended => 0,
        }
    }

    /// Roles embedded in issued tokens; privileged roles are dropped while suspended
    pub fn effective_roles(&self) -> BTreeSet<Role> {
        match self.status {
            ClientStatus::Active => self.roles.clone(),
            ClientStatus::Suspended => self
                .roles
                .iter()
                .copied()
                .filter(|r| !r.is_privileged())
                .collect(),
        }
    }

    // Mutators

    pub fn suspend(&mut self) {
        self.status = ClientStatus::Suspended;
        self.touch();
    }

    pub fn activate(&mut self) {
        self.status = ClientStatus::Active;
        self.touch();
    }

    /// Move to another tier; roles follow the new tier
    pub fn set_tier(&mut self, tier: Tier) {
        self.tier = tier;
        self.roles = tier.default_roles();
        self.touch();
    }

    pub fn set_quota_override(&mut self, quota: Option<u32>) {
        self.quota_override = quota;
        self.touch();
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
        self.touch();
    }

    pub fn record_usage(&mut self) {
        self.last_used_at = Some(Utc::now());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
