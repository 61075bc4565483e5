//! Tracing export and metrics settings

use serde::Deserialize;

use crate::domain::DomainError;

/// OpenTelemetry export settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    /// OTLP gRPC endpoint, e.g. http://localhost:4317
    pub otlp_endpoint: String,
    pub service_name: String,
    /// Fraction of root spans sampled, 0.0 to 1.0
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "pmp-analytics-gateway".to_string(),
            sampling_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.sampling_ratio) {
            return Err(DomainError::configuration(format!(
                "tracing.sampling_ratio must be between 0 and 1, got {}",
                self.sampling_ratio
            )));
        }

        if self.enabled && self.otlp_endpoint.trim().is_empty() {
            return Err(DomainError::configuration(
                "tracing.otlp_endpoint is required when tracing is enabled",
            ));
        }

        Ok(())
    }
}

/// Prometheus exposition settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route serving the exposition
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.enabled && !self.path.starts_with('/') {
            return Err(DomainError::configuration(format!(
                "metrics.path must start with '/', got '{}'",
                self.path
            )));
        }

        Ok(())
    }
}
