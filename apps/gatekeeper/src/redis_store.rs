// [[GATEKEEPER]]/apps/gatekeeper/src/redis_store.rs
// Purpose: Redis-backed shared counters for the rate limiter.
// Architecture: Infrastructure Layer
// Dependencies: redis (connection-manager), async-trait

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use crate::error::RateLimitError;
use crate::rate_limit::SharedCounterStore;

const KEY_PREFIX: &str = "ratelimit:";

// INCR and the window expiry must land together, otherwise a crash between
// them leaves a counter that never resets.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

pub struct RedisCounterStore {
    manager: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    /// Connect to Redis. Returns `None` when the backend is unreachable so the
    /// caller can run local-only.
    pub async fn connect(url: &str) -> Option<Self> {
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to create Redis client: {}. Rate limiting is per-process.", e);
                return None;
            }
        };

        match ConnectionManager::new(client).await {
            Ok(manager) => {
                tracing::info!("Redis rate limit backend connected");
                Some(Self {
                    manager,
                    script: Script::new(INCREMENT_SCRIPT),
                })
            }
            Err(e) => {
                tracing::warn!("Redis connection failed: {}. Rate limiting is per-process.", e);
                None
            }
        }
    }
}

#[async_trait]
impl SharedCounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window_ms: u64) -> Result<u64, RateLimitError> {
        // ConnectionManager is a cheap handle around one multiplexed connection.
        let mut con = self.manager.clone();
        self.script
            .key(format!("{}{}", KEY_PREFIX, key))
            .arg(window_ms)
            .invoke_async(&mut con)
            .await
            .map_err(|e| {
                if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
                    RateLimitError::Connection(e)
                } else {
                    RateLimitError::Backend(e)
                }
            })
    }
}
