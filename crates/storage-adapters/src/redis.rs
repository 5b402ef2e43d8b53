//! Shared rate-limit counters in Redis, for deployments running more than
//! one instance. The fixed-window step runs as a Lua script so it stays
//! atomic across clients.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::Script;
use deadpool_redis::{Config, Pool, Runtime};

use domains::{DomainError, RateLimitDecision, RateLimitRule, RateLimitStore, Result};

// KEYS[1] = counter key; ARGV = now_ms, window_ms, limit.
// Returns {counted, count, reset_ms}. The window holds through reset_ms and
// Redis expires the key one millisecond later.
const HIT_SCRIPT: &str = r#"
local count = tonumber(redis.call('HGET', KEYS[1], 'count'))
local reset = tonumber(redis.call('HGET', KEYS[1], 'reset'))
local now = tonumber(ARGV[1])
local limit = tonumber(ARGV[3])
if count == nil or reset == nil or now > reset then
  reset = now + tonumber(ARGV[2])
  redis.call('HSET', KEYS[1], 'count', 1, 'reset', reset)
  redis.call('PEXPIREAT', KEYS[1], reset + 1)
  return {1, 1, reset}
end
if count >= limit then
  return {0, count, reset}
end
count = redis.call('HINCRBY', KEYS[1], 'count', 1)
return {1, count, reset}
"#;

pub struct RedisRateLimitStore {
    pool: Pool,
    prefix: String,
    script: Script,
}

impl RedisRateLimitStore {
    pub fn connect(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(DomainError::store)?;
        Ok(Self {
            pool,
            prefix: prefix.into(),
            script: Script::new(HIT_SCRIPT),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision> {
        let mut conn = self.pool.get().await.map_err(DomainError::store)?;
        let (counted, count, reset_ms): (i64, i64, i64) = self
            .script
            .key(self.redis_key(key))
            .arg(now.timestamp_millis())
            .arg(rule.window.num_milliseconds())
            .arg(rule.limit)
            .invoke_async(&mut conn)
            .await
            .map_err(DomainError::store)?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let reset_time = DateTime::from_timestamp_millis(reset_ms).ok_or_else(|| {
            DomainError::StoreUnavailable(format!("invalid reset time {reset_ms}"))
        })?;
        let allowed = counted == 1 && count <= rule.limit;

        Ok(RateLimitDecision {
            allowed,
            limit: rule.limit,
            remaining: if allowed {
                rule.limit.saturating_sub(count)
            } else {
                0
            },
            reset_time,
        })
    }

    /// Redis expires elapsed windows on its own.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}
