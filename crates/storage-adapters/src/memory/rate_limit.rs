use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use domains::{step_window, RateLimitDecision, RateLimitRule, RateLimitStore, Result, WindowState};

/// Counters local to this process. Each instance of a multi-process
/// deployment enforces its own limit; use the Redis store to share them.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, WindowState>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision> {
        let decision = match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let (next, decision) = step_window(Some(*occupied.get()), rule, now);
                *occupied.get_mut() = next;
                decision
            }
            Entry::Vacant(vacant) => {
                let (next, decision) = step_window(None, rule, now);
                vacant.insert(next);
                decision
            }
        };
        Ok(decision)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;
        self.windows.retain(|_, window| {
            let keep = !window.is_expired(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
