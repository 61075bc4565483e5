//! Fixed-window quota enforcement over a shared counter store

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::cache::CacheStore;
use crate::domain::quota::{QuotaDecision, QuotaWindow};
use crate::infrastructure::observability::record_quota_decision;

/// Quota window and store settings
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub window: Duration,
    /// Upper bound for the counter increment before failing open
    pub store_timeout: Duration,
    pub key_prefix: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            store_timeout: Duration::from_millis(250),
            key_prefix: "quota".to_string(),
        }
    }
}

/// Per-client request counter with fail-open semantics
///
/// Each check is one atomic increment-with-expiry on the store; the counter expires
/// with its window. A store error or timeout lets the request through as
/// `DegradedAllow`.
#[derive(Debug, Clone)]
pub struct QuotaEnforcer {
    store: Arc<dyn CacheStore>,
    config: QuotaConfig,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn CacheStore>, config: QuotaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Count one request for `client_id` against `limit`
    pub async fn check(&self, client_id: &str, limit: u32) -> QuotaDecision {
        self.check_at(client_id, limit, Utc::now().timestamp_millis())
            .await
    }

    /// Same as [`check`](Self::check) with an explicit clock reading
    pub async fn check_at(&self, client_id: &str, limit: u32, now_ms: i64) -> QuotaDecision {
        let window = QuotaWindow::containing(now_ms, self.config.window);
        let key = window.counter_key(&self.config.key_prefix, client_id);
        let ttl = window.remaining_ttl(now_ms);

        let increment = self.store.increment_with_ttl(&key, 1, ttl);
        let decision = match tokio::time::timeout(self.config.store_timeout, increment).await {
            Ok(Ok(count)) => QuotaDecision::from_count(count, limit, &window, now_ms),
            Ok(Err(e)) => {
                warn!(
                    client_id,
                    error = %e,
                    event = "quota_fail_open",
                    "Quota store unavailable, allowing request"
                );
                QuotaDecision::degraded(limit, &window, e.to_string())
            }
            Err(_) => {
                warn!(
                    client_id,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    event = "quota_fail_open",
                    "Quota store timed out, allowing request"
                );
                QuotaDecision::degraded(limit, &window, "store timeout")
            }
        };

        record_quota_decision(decision.outcome());
        debug!(
            client_id,
            outcome = decision.outcome(),
            remaining = decision.status().remaining,
            "Quota checked"
        );

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheStore;
    use crate::infrastructure::cache::InMemoryCache;

    const WINDOW_START: i64 = 1_700_000_040_000;

    fn enforcer() -> QuotaEnforcer {
        QuotaEnforcer::new(Arc::new(InMemoryCache::new()), QuotaConfig::default())
    }

    #[tokio::test]
    async fn test_limit_then_reject_then_next_window() {
        let enforcer = enforcer();
        let limit = 5;

        for i in 0..limit {
            let decision = enforcer.check_at("acme", limit, WINDOW_START + 10).await;
            assert!(decision.is_allowed());
            assert_eq!(decision.status().remaining, limit - i - 1);
        }

        let denied = enforcer.check_at("acme", limit, WINDOW_START + 20).await;
        assert!(!denied.is_allowed());
        assert_eq!(denied.status().remaining, 0);
        assert!(denied.retry_after().unwrap() > 0);

        let next = enforcer.check_at("acme", limit, WINDOW_START + 60_000).await;
        assert!(next.is_allowed());
        assert_eq!(next.status().remaining, limit - 1);
    }

    #[tokio::test]
    async fn test_standard_tier_boundary() {
        let enforcer = enforcer();

        for i in 0..1000 {
            let decision = enforcer.check_at("std", 1000, WINDOW_START + 1).await;
            assert!(decision.is_allowed());
            assert_eq!(decision.status().remaining, 999 - i);
        }

        let denied = enforcer.check_at("std", 1000, WINDOW_START + 30_000).await;
        assert!(matches!(denied, QuotaDecision::Denied { retry_after: 30, .. }));
        assert_eq!(denied.status().remaining, 0);
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let enforcer = enforcer();

        assert!(enforcer.check_at("a", 1, WINDOW_START).await.is_allowed());
        assert!(!enforcer.check_at("a", 1, WINDOW_START).await.is_allowed());
        assert!(enforcer.check_at("b", 1, WINDOW_START).await.is_allowed());
    }

    #[tokio::test]
    async fn test_request_at_window_start_counts_in_new_window() {
        let enforcer = enforcer();

        assert!(enforcer.check_at("c", 1, WINDOW_START - 1).await.is_allowed());
        assert!(!enforcer.check_at("c", 1, WINDOW_START - 1).await.is_allowed());

        let decision = enforcer.check_at("c", 1, WINDOW_START).await;
        assert!(decision.is_allowed());
        assert_eq!(
            decision.status().reset_at.timestamp_millis(),
            WINDOW_START + 60_000
        );
    }

    #[tokio::test]
    async fn test_zero_quota_is_always_denied() {
        let enforcer = enforcer();

        assert!(!enforcer.check_at("suspended", 0, WINDOW_START).await.is_allowed());
    }

    #[tokio::test]
    async fn test_counter_ttl_covers_rest_of_window() {
        let store = Arc::new(MockCacheStore::new());
        let enforcer = QuotaEnforcer::new(store.clone(), QuotaConfig::default());

        enforcer.check_at("acme", 10, WINDOW_START + 15_000).await;

        let key = format!("quota:acme:{}", WINDOW_START);
        assert_eq!(
            store.ttl(&key).await.unwrap(),
            Some(Duration::from_millis(45_000))
        );
    }

    #[tokio::test]
    async fn test_store_error_fails_open() {
        let store = Arc::new(MockCacheStore::new().with_error("connection refused"));
        let enforcer = QuotaEnforcer::new(store, QuotaConfig::default());

        let decision = enforcer.check_at("acme", 100, WINDOW_START).await;

        assert!(decision.is_allowed());
        assert!(decision.is_degraded());
        assert_eq!(decision.status().remaining, 100);
        assert_eq!(decision.outcome(), "degraded_allow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_fails_open() {
        let store = Arc::new(MockCacheStore::new().with_delay(Duration::from_secs(5)));
        let enforcer = QuotaEnforcer::new(store, QuotaConfig::default());

        let decision = enforcer.check_at("acme", 100, WINDOW_START).await;

        assert!(matches!(decision, QuotaDecision::DegradedAllow { ref reason, .. } if reason == "store timeout"));
    }

    #[tokio::test]
    async fn test_concurrent_checks_never_exceed_limit() {
        let enforcer = Arc::new(enforcer());
        let limit = 20;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let enforcer = enforcer.clone();
                tokio::spawn(async move { enforcer.check_at("busy", limit, WINDOW_START).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, limit);
    }
}
