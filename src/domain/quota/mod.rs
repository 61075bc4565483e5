//! Quota domain - fixed windows and enforcement decisions

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// A fixed window shared by every client
///
/// Windows are aligned to the epoch: `start = floor(now / length) * length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    start_ms: i64,
    length_ms: i64,
}

impl QuotaWindow {
    /// The window containing `now_ms`
    pub fn containing(now_ms: i64, length: Duration) -> Self {
        let length_ms = (length.as_millis() as i64).max(1);

        Self {
            start_ms: now_ms.div_euclid(length_ms) * length_ms,
            length_ms,
        }
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.length_ms
    }

    /// Counter key for a client in this window
    pub fn counter_key(&self, prefix: &str, client_id: &str) -> String {
        format!("{}:{}:{}", prefix, client_id, self.start_ms)
    }

    /// Lifetime a counter created at `now_ms` needs to cover the rest of the window
    pub fn remaining_ttl(&self, now_ms: i64) -> Duration {
        Duration::from_millis((self.end_ms() - now_ms).max(1) as u64)
    }

    /// Whole seconds until the window resets, at least 1
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let remaining_ms = (self.end_ms() - now_ms).max(1) as u64;
        remaining_ms.div_ceil(1000)
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.end_ms())
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Quota metadata attached to every gated response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaStatus {
    /// Reset instant as Unix seconds, rounded up
    pub fn reset_epoch_secs(&self) -> i64 {
        let millis = self.reset_at.timestamp_millis();
        (millis + 999).div_euclid(1000)
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed(QuotaStatus),
    Denied {
        status: QuotaStatus,
        /// Seconds until the window resets
        retry_after: u64,
    },
    /// The counter store could not be consulted; the request is let through
    DegradedAllow { status: QuotaStatus, reason: String },
}

impl QuotaDecision {
    /// Decision for a counter that now reads `count` after this request's increment
    pub fn from_count(count: i64, limit: u32, window: &QuotaWindow, now_ms: i64) -> Self {
        let reset_at = window.reset_at();

        if count > i64::from(limit) {
            Self::Denied {
                status: QuotaStatus {
                    limit,
                    remaining: 0,
                    reset_at,
                },
                retry_after: window.retry_after_secs(now_ms),
            }
        } else {
            let remaining = (i64::from(limit) - count).max(0) as u32;

            Self::Allowed(QuotaStatus {
                limit,
                remaining,
                reset_at,
            })
        }
    }

    pub fn degraded(limit: u32, window: &QuotaWindow, reason: impl Into<String>) -> Self {
        Self::DegradedAllow {
            status: QuotaStatus {
                limit,
                remaining: limit,
                reset_at: window.reset_at(),
            },
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> &QuotaStatus {
        match self {
            Self::Allowed(status) => status,
            Self::Denied { status, .. } => status,
            Self::DegradedAllow { status, .. } => status,
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::DegradedAllow { .. })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Denied { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Label used for metrics and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Allowed(_) => "allowed",
            Self::Denied { .. } => "denied",
            Self::DegradedAllow { .. } => "degraded_allow",
        }
    }
}
