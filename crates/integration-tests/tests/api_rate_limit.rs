//! Rate limiting as seen by HTTP clients.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use tower::ServiceExt;

use common::http::{request, router, send};
use common::{jan_first_2024, Harness};
use domains::{DomainError, MockRateLimitStore, RateLimitRule};
use services::RateLimiter;
use storage_adapters::InMemoryRateLimitStore;

fn limiter(harness: &Harness, evaluate_limit: u32) -> RateLimiter {
    RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        harness.shared_clock(),
        RateLimitRule::new(100, Duration::seconds(60)),
    )
    .with_endpoint(
        "/api/v1/listings/{id}/evaluate",
        RateLimitRule::new(evaluate_limit, Duration::seconds(60)),
    )
    .with_cleanup_probability(0.0)
}

fn from_client(uri: &str, client: &str) -> axum::http::Request<axum::body::Body> {
    let mut req = request("POST", uri);
    req.headers_mut()
        .insert("x-forwarded-for", client.parse().unwrap());
    req
}

#[tokio::test]
async fn test_limit_applies_per_client_and_route() {
    let harness = Harness::new(jan_first_2024());
    harness.add_listing("card-1", "seller", jan_first_2024());
    let app = router(&harness, Some(limiter(&harness, 2)));

    for remaining in ["1", "0"] {
        let response = app
            .clone()
            .oneshot(from_client("/api/v1/listings/card-1/evaluate", "203.0.113.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = app
        .clone()
        .oneshot(from_client("/api/v1/listings/card-1/evaluate", "203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let reset = (jan_first_2024() + Duration::seconds(60)).timestamp().to_string();
    assert_eq!(response.headers()["x-ratelimit-reset"], reset.as_str());
    assert_eq!(response.headers()["retry-after"], "60");

    // The route template is the key, so another listing id shares the counter.
    let (status, _) = send(
        &app,
        from_client("/api/v1/listings/other/evaluate", "203.0.113.7"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(
        &app,
        from_client("/api/v1/listings/card-1/evaluate", "198.51.100.2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, from_client("/api/v1/messages/ids", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_window_reset_readmits_client() {
    let harness = Harness::new(jan_first_2024());
    harness.add_listing("card-1", "seller", jan_first_2024());
    let app = router(&harness, Some(limiter(&harness, 1)));
    let uri = "/api/v1/listings/card-1/evaluate";

    assert_eq!(send(&app, from_client(uri, "a")).await.0, StatusCode::OK);
    assert_eq!(
        send(&app, from_client(uri, "a")).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );

    harness.clock.advance(Duration::seconds(60));
    assert_eq!(
        send(&app, from_client(uri, "a")).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );

    harness.clock.advance(Duration::seconds(1));
    assert_eq!(send(&app, from_client(uri, "a")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_not_limited() {
    let harness = Harness::new(jan_first_2024());
    let app = router(&harness, Some(limiter(&harness, 1)));

    for _ in 0..3 {
        let response = app.clone().oneshot(request("GET", "/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn test_unavailable_counter_store_fails_open() {
    let harness = Harness::new(jan_first_2024());
    let mut store = MockRateLimitStore::new();
    store
        .expect_hit()
        .returning(|_, _, _| Err(DomainError::StoreUnavailable("redis down".into())));
    let limiter = RateLimiter::new(
        Arc::new(store),
        harness.shared_clock(),
        RateLimitRule::new(1, Duration::seconds(60)),
    )
    .with_cleanup_probability(0.0);
    let app = router(&harness, Some(limiter));

    for _ in 0..3 {
        let (status, body) = send(&app, request("POST", "/api/v1/messages/ids")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["messageId"].as_str().unwrap().starts_with("MSG20240101"));
    }
}
