//! Shared wiring for the integration tests: in-memory stores driven by a
//! manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use domains::{Clock, Listing, ManualClock, UserAccount};
use services::{ListingLifecycleService, MessageIdAllocator};
use storage_adapters::InMemoryDocumentStore;

pub fn jan_first_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: ManualClock,
    pub lifecycle: Arc<ListingLifecycleService>,
    pub message_ids: Arc<MessageIdAllocator>,
}

impl Harness {
    pub fn new(start: DateTime<Utc>) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = ManualClock::new(start);
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let lifecycle = Arc::new(ListingLifecycleService::new(
            store.clone(),
            store.clone(),
            shared_clock.clone(),
        ));
        let message_ids = Arc::new(MessageIdAllocator::new(store.clone(), shared_clock));

        Self {
            store,
            clock,
            lifecycle,
            message_ids,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn shared_clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    pub fn add_user(&self, id: &str, tier: Option<&str>) {
        self.store.insert_user(UserAccount {
            id: id.to_string(),
            account_tier: tier.map(str::to_string),
        });
    }

    pub fn add_listing(&self, id: &str, user_id: &str, created_at: DateTime<Utc>) {
        self.store
            .insert_listing(Listing::new_active(id, user_id, created_at));
    }
}

#[cfg(feature = "web-axum")]
pub mod http {
    use std::sync::Arc;

    use api_adapters::{build_router, AppState, Metrics};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use services::RateLimiter;
    use tower::ServiceExt;

    use super::Harness;

    pub fn router(harness: &Harness, rate_limiter: Option<RateLimiter>) -> Router {
        build_router(AppState {
            lifecycle: harness.lifecycle.clone(),
            rate_limiter: rate_limiter.map(Arc::new),
            message_ids: harness.message_ids.clone(),
            metrics: Arc::new(Metrics::new()),
            sweep_batch_limit: 100,
        })
    }

    pub fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }
}
