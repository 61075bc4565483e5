//! Observability infrastructure - logging, tracing export and metrics

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, TracingConfig};
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_invalidation, record_cache_lookup,
    record_http_request, record_quota_decision, record_token_verification, PrometheusMetrics,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
