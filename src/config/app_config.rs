use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::auth::TokenConfig;
use crate::infrastructure::cache::{CacheLayerConfig, CacheType, StoreConfig};
use crate::infrastructure::client::PostgresClientConfig;
use crate::infrastructure::observability::{MetricsConfig, TracingConfig};
use crate::infrastructure::quota::QuotaConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub quota: QuotaSettings,
    pub cache: CacheSettings,
    pub credentials: CredentialsConfig,
    pub metrics: MetricsConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Token signing and bootstrap settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWKS file holding the private signing key
    pub jwks_path: Option<String>,
    /// Inline JWKS document, used when no path is set
    pub jwks_json: Option<String>,
    /// Key to sign with when the JWKS holds several
    pub key_id: Option<String>,
    pub issuer: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Plaintext credential registered for an enterprise admin client at startup
    pub bootstrap_admin_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub window_secs: u64,
    pub store_timeout_ms: u64,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// "memory" or "redis"
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub default_query_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub prefix_scan_timeout_ms: u64,
    pub max_enumerated_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// "memory" or "postgres"
    pub backend: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

/// Where client records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialBackend {
    Memory,
    Postgres,
}

impl FromStr for CredentialBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(DomainError::configuration(format!(
                "Unknown credentials backend: {}. Valid backends: memory, postgres",
                s
            ))),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_path: None,
            jwks_json: None,
            key_id: None,
            issuer: "pmp-analytics-gateway".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
            bootstrap_admin_key: None,
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            store_timeout_ms: 250,
            key_prefix: "quota".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            default_query_ttl_secs: 30,
            store_timeout_ms: 250,
            prefix_scan_timeout_ms: 5_000,
            max_enumerated_pages: 16,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: None,
            max_connections: 5,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the gateway cannot start with
    pub fn validate(&self) -> Result<(), DomainError> {
        self.auth.validate()?;
        self.quota.validate()?;
        self.cache.validate()?;
        self.credentials.validate()?;
        self.metrics.validate()?;
        self.tracing.validate()
    }
}

fn require_positive(name: &str, value: u64) -> Result<(), DomainError> {
    if value == 0 {
        return Err(DomainError::configuration(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_positive("auth.access_ttl_secs", self.access_ttl_secs)?;
        require_positive("auth.refresh_ttl_secs", self.refresh_ttl_secs)?;

        if self.issuer.trim().is_empty() {
            return Err(DomainError::configuration("auth.issuer must not be empty"));
        }

        if self
            .bootstrap_admin_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(DomainError::configuration(
                "auth.bootstrap_admin_key must not be blank",
            ));
        }

        Ok(())
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(&self.issuer, self.access_ttl_secs, self.refresh_ttl_secs)
    }
}

impl QuotaSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_positive("quota.window_secs", self.window_secs)?;
        require_positive("quota.store_timeout_ms", self.store_timeout_ms)
    }

    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            window: Duration::from_secs(self.window_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            key_prefix: self.key_prefix.clone(),
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        let cache_type = CacheType::from_str(&self.backend)?;

        if cache_type == CacheType::Redis && self.redis_url.is_none() {
            return Err(DomainError::configuration(
                "cache.redis_url is required for the redis backend",
            ));
        }

        require_positive("cache.default_query_ttl_secs", self.default_query_ttl_secs)?;
        require_positive("cache.store_timeout_ms", self.store_timeout_ms)?;
        require_positive("cache.prefix_scan_timeout_ms", self.prefix_scan_timeout_ms)?;
        require_positive("cache.max_capacity", self.max_capacity)
    }

    pub fn store_config(&self) -> Result<StoreConfig, DomainError> {
        Ok(StoreConfig {
            cache_type: CacheType::from_str(&self.backend)?,
            redis_url: self.redis_url.clone(),
            key_prefix: self.key_prefix.clone(),
            max_capacity: self.max_capacity,
        })
    }

    pub fn layer_config(&self) -> CacheLayerConfig {
        CacheLayerConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            prefix_scan_timeout: Duration::from_millis(self.prefix_scan_timeout_ms),
            max_enumerated_pages: self.max_enumerated_pages,
        }
    }

    pub fn default_query_ttl(&self) -> Duration {
        Duration::from_secs(self.default_query_ttl_secs)
    }
}

impl CredentialsConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.backend()? == CredentialBackend::Postgres && self.database_url.is_none() {
            return Err(DomainError::configuration(
                "credentials.database_url is required for the postgres backend",
            ));
        }

        require_positive("credentials.max_connections", u64::from(self.max_connections))
    }

    pub fn backend(&self) -> Result<CredentialBackend, DomainError> {
        CredentialBackend::from_str(&self.backend)
    }

    pub fn postgres_config(&self) -> Result<PostgresClientConfig, DomainError> {
        let url = self.database_url.as_deref().ok_or_else(|| {
            DomainError::configuration("credentials.database_url is required")
        })?;

        Ok(PostgresClientConfig::new(url).with_max_connections(self.max_connections))
    }
}
