use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GateError;
use crate::rate_limit::RateLimiter;

/// Running totals of gate outcomes since boot.
#[derive(Debug, Default)]
pub struct GateStats {
    admitted: AtomicU64,
    csrf_rejected: AtomicU64,
    rate_limited: AtomicU64,
    unauthenticated: AtomicU64,
    forbidden: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateStatsSnapshot {
    pub admitted: u64,
    pub csrf_rejected: u64,
    pub rate_limited: u64,
    pub unauthenticated: u64,
    pub forbidden: u64,
    pub backend_fallbacks: u64,
    pub shared_backend: bool,
    pub tracked_keys: usize,
}

impl GateStats {
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, err: &GateError) {
        let counter = match err {
            GateError::CsrfRejected => &self.csrf_rejected,
            GateError::RateLimited => &self.rate_limited,
            GateError::Unauthenticated => &self.unauthenticated,
            GateError::Forbidden => &self.forbidden,
            // Raised by handlers after the gate, not by the gate itself.
            GateError::NotFound(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, limiter: &RateLimiter) -> GateStatsSnapshot {
        GateStatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            csrf_rejected: self.csrf_rejected.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            unauthenticated: self.unauthenticated.load(Ordering::Relaxed),
            forbidden: self.forbidden.load(Ordering::Relaxed),
            backend_fallbacks: limiter.fallbacks(),
            shared_backend: limiter.has_shared_backend(),
            tracked_keys: limiter.tracked_keys(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::LocalCounterStore;

    #[tokio::test]
    async fn test_counts_by_outcome() {
        let stats = GateStats::default();
        stats.record_admitted();
        stats.record_admitted();
        stats.record_rejection(&GateError::RateLimited);
        stats.record_rejection(&GateError::Forbidden);
        stats.record_rejection(&GateError::NotFound("Project"));

        let limiter = RateLimiter::local_only(LocalCounterStore::new());
        limiter.check("k", 5, 60_000).await;
        let snap = stats.snapshot(&limiter);
        assert_eq!(snap.admitted, 2);
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.forbidden, 1);
        assert_eq!(snap.csrf_rejected, 0);
        assert_eq!(snap.backend_fallbacks, 0);
        assert_eq!(snap.tracked_keys, 1);
        assert!(!snap.shared_backend);
    }
}
