//! # api-adapters
//!
//! The HTTP routing and orchestration layer. External schedulers and admin
//! tools reach the lifecycle engine through these routes.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use handlers::AppState;

#[cfg(feature = "web-axum")]
use axum::{
    routing::{get, post},
    Router,
};

/// Builds the full router.
///
/// Rate limiting is a route layer, so it only sees matched `/api` routes and
/// keys counters by the route template (e.g. `/api/v1/listings/{id}/evaluate`).
#[cfg(feature = "web-axum")]
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/listings/{id}/evaluate",
            post(handlers::evaluate_listing),
        )
        .route(
            "/api/v1/listings/{id}/restore",
            post(handlers::restore_listing),
        )
        .route("/api/v1/users/{id}/quota", get(handlers::listing_quota))
        .route("/api/v1/lifecycle/sweep", post(handlers::sweep))
        .route("/api/v1/messages/ids", post(handlers::allocate_message_id))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    let router = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .merge(api);

    middleware::with_standard_layers(router).with_state(state)
}
