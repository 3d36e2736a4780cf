// [[GATEKEEPER]]/apps/gatekeeper/src/rate_limit.rs
// Purpose: Fixed-window request counting per key, shared backend first, in-process fallback.
// Architecture: Infrastructure Layer
// Dependencies: dashmap, tokio, async-trait, chrono

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::RateLimitError;

pub const DEFAULT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_LOCAL_CAP: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

impl RateDecision {
    /// `count` includes this hit. The hit that opens a window always passes,
    /// so a budget of 0 admits one request per window.
    fn from_count(count: u64, max_requests: u64) -> Self {
        if count > 1 && count > max_requests {
            RateDecision::Limited
        } else {
            RateDecision::Allowed
        }
    }
}

/// What to do when the shared backend cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Count this call in-process instead. Limits become per-instance while
    /// the backend is down; traffic is never rejected because of the outage.
    #[default]
    DegradeToLocal,
}

/// Atomic "increment and report count within window" over a store shared by
/// every instance.
#[async_trait]
pub trait SharedCounterStore: Send + Sync {
    /// Returns the count for `key` after this hit. The first hit of a window
    /// returns 1 and starts a window of `window_ms`.
    async fn increment(&self, key: &str, window_ms: u64) -> Result<u64, RateLimitError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u64,
    pub window_start: i64,
    pub window_ms: u64,
}

impl RateLimitEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        let window = i64::try_from(self.window_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.window_start) >= window
    }
}

/// In-process counters. Each key's read-modify-write runs under its shard
/// lock, so concurrent hits on one key are never lost.
pub struct LocalCounterStore {
    entries: DashMap<String, RateLimitEntry>,
    cap: usize,
}

impl LocalCounterStore {
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_LOCAL_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: DashMap::new(),
            cap,
        }
    }

    pub fn hit(&self, key: &str, max_requests: u64, window_ms: u64) -> RateDecision {
        self.hit_at(key, max_requests, window_ms, Utc::now().timestamp_millis())
    }

    pub fn hit_at(&self, key: &str, max_requests: u64, window_ms: u64, now_ms: i64) -> RateDecision {
        // No entry guard may be held while sweeping or evicting.
        self.sweep_expired(now_ms);
        if self.entries.len() > self.cap {
            self.evict_oldest_half();
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now_ms,
                window_ms,
            });

        if entry.is_expired(now_ms) {
            *entry = RateLimitEntry {
                count: 0,
                window_start: now_ms,
                window_ms,
            };
        }

        entry.count += 1;
        RateDecision::from_count(entry.count, max_requests)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_expired(&self, now_ms: i64) {
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
    }

    fn evict_oldest_half(&self) {
        let mut by_age: Vec<(String, i64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().window_start))
            .collect();
        by_age.sort_by_key(|(_, window_start)| *window_start);

        let evict = by_age.len() / 2;
        for (key, _) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        tracing::warn!(
            "Rate limit map exceeded cap of {}; evicted {} oldest entries",
            self.cap,
            evict
        );
    }

    #[cfg(test)]
    fn count_of(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.count)
    }
}

pub struct RateLimiter {
    shared: Option<Arc<dyn SharedCounterStore>>,
    local: LocalCounterStore,
    backend_timeout: Duration,
    policy: FailurePolicy,
    fallbacks: AtomicU64,
}

impl RateLimiter {
    pub fn new(
        shared: Option<Arc<dyn SharedCounterStore>>,
        local: LocalCounterStore,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            shared,
            local,
            backend_timeout,
            policy: FailurePolicy::DegradeToLocal,
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn local_only(local: LocalCounterStore) -> Self {
        Self::new(None, local, Duration::from_millis(0))
    }

    /// Count one request for `key` against `max_requests` per window.
    pub async fn check(&self, key: &str, max_requests: u64, window_ms: u64) -> RateDecision {
        if let Some(shared) = &self.shared {
            let outcome = tokio::time::timeout(self.backend_timeout, shared.increment(key, window_ms)).await;
            let err = match outcome {
                Ok(Ok(count)) => return RateDecision::from_count(count, max_requests),
                Ok(Err(e)) => e,
                Err(_) => RateLimitError::Timeout(self.backend_timeout.as_millis() as u64),
            };

            // Availability over precision: a backend blip must not turn into
            // a full outage. Do not change this to reject. No retry either;
            // the fallback is immediate for this call only.
            match self.policy {
                FailurePolicy::DegradeToLocal => {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Shared rate limit backend unavailable ({}); counting locally", err);
                }
            }
        }

        self.local.hit(key, max_requests, window_ms)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn has_shared_backend(&self) -> bool {
        self.shared.is_some()
    }

    /// Keys currently held by the in-process fallback.
    pub fn tracked_keys(&self) -> usize {
        self.local.len()
    }
}
