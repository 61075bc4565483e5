//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use super::config::MetricsConfig;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Entity routes carry caller-chosen ids; collapse them to keep label cardinality bounded
static ENTITY_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/v1/([^/]+)/[^/]+(/|$)").unwrap());

static ADMIN_CLIENT_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/admin/clients/[^/]+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record a quota decision (`allowed`, `denied` or `degraded_allow`)
pub fn record_quota_decision(outcome: &'static str) {
    counter!("gateway_quota_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a cache lookup (`hit`, `miss` or `error`)
pub fn record_cache_lookup(result: &'static str) {
    counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

/// Record a token verification (`ok`, `expired`, `invalid`)
pub fn record_token_verification(result: &'static str) {
    counter!("gateway_token_verifications_total", "result" => result).increment(1);
}

/// Record keys removed by an invalidation
pub fn record_cache_invalidation(removed: usize) {
    counter!("gateway_cache_invalidations_total").increment(1);
    counter!("gateway_cache_invalidated_keys_total").increment(removed as u64);
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");
    let path = ENTITY_ROUTE.replace(&path, "/v1/$1/{id}$2");
    let path = ADMIN_CLIENT_ROUTE.replace(&path, "/admin/clients/{id}$1");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path.to_string()
    }
}
