//! Fixed-window rate limiting per `(client, endpoint)`.
//!
//! Expired counters are purged lazily: each check triggers a purge with a
//! small probability instead of running a background task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use domains::{Clock, RateLimitDecision, RateLimitRule, RateLimitStore, Result};

pub const DEFAULT_CLEANUP_PROBABILITY: f64 = 0.01;

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    default_rule: RateLimitRule,
    endpoints: HashMap<String, RateLimitRule>,
    cleanup_probability: f64,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        default_rule: RateLimitRule,
    ) -> Self {
        Self {
            store,
            clock,
            default_rule,
            endpoints: HashMap::new(),
            cleanup_probability: DEFAULT_CLEANUP_PROBABILITY,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>, rule: RateLimitRule) -> Self {
        self.endpoints.insert(endpoint.into(), rule);
        self
    }

    pub fn with_cleanup_probability(mut self, probability: f64) -> Self {
        self.cleanup_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// The instant decisions are made against.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Unconfigured endpoints fall back to the default rule.
    pub fn rule_for(&self, endpoint: &str) -> &RateLimitRule {
        self.endpoints.get(endpoint).unwrap_or(&self.default_rule)
    }

    pub async fn check(&self, client_key: &str, endpoint: &str) -> Result<RateLimitDecision> {
        let now = self.clock.now();
        if self.cleanup_probability > 0.0 && rand::random::<f64>() < self.cleanup_probability {
            match self.store.purge_expired(now).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired rate-limit counters purged"),
                Err(err) => warn!(error = %err, "rate-limit cleanup failed"),
            }
        }

        let rule = self.rule_for(endpoint);
        let decision = self
            .store
            .hit(&counter_key(client_key, endpoint), rule, now)
            .await?;

        if !decision.allowed {
            debug!(client_key, endpoint, limit = decision.limit, "rate limit exceeded");
        }
        Ok(decision)
    }
}

pub fn counter_key(client_key: &str, endpoint: &str) -> String {
    format!("{client_key}:{endpoint}")
}
