//! # Handlers
//!
//! Thin adapters between HTTP and the lifecycle services. Business rules live
//! in `services`; handlers only translate.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use domains::{Listing, ListingStatus};
use services::{
    EvaluationOutcome, EvaluationReport, EvaluationStatus, ListingLifecycleService, ListingQuota,
    MessageIdAllocator, RateLimiter, SweepSummary,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<ListingLifecycleService>,
    /// `None` disables rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub message_ids: Arc<MessageIdAllocator>,
    pub metrics: Arc<Metrics>,
    /// Upper bound for `?limit=` on sweeps.
    pub sweep_batch_limit: usize,
}

fn status_label(status: EvaluationStatus) -> &'static str {
    match status {
        EvaluationStatus::Active => "active",
        EvaluationStatus::Archived => "archived",
        EvaluationStatus::AlreadyArchived => "already_archived",
        EvaluationStatus::NotFound => "not_found",
        EvaluationStatus::DataIntegrityWarning => "data_integrity_warning",
        EvaluationStatus::Error => "error",
    }
}

/// Always answers with an `EvaluationReport`; store failures carry their
/// message in `error` alongside the matching status code.
pub async fn evaluate_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> (StatusCode, Json<EvaluationReport>) {
    let result = state.lifecycle.evaluate(&listing_id).await;
    let code = match &result {
        Ok(EvaluationOutcome::NotFound) => StatusCode::NOT_FOUND,
        Ok(_) => StatusCode::OK,
        Err(err) => ApiError::from(err.clone()).status(),
    };

    let report = EvaluationReport::from(result);
    state.metrics.record_evaluation(status_label(report.status));
    (code, Json(report))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredListing {
    pub id: String,
    pub status: ListingStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<Listing> for RestoredListing {
    type Error = ApiError;

    fn try_from(listing: Listing) -> Result<Self, Self::Error> {
        let expires_at = listing
            .expires_at
            .as_ref()
            .map(|ts| ts.normalize())
            .transpose()?;
        Ok(Self {
            id: listing.id,
            status: listing.status,
            expires_at,
        })
    }
}

pub async fn restore_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> ApiResult<Json<RestoredListing>> {
    let listing = state.lifecycle.restore(&listing_id).await?;
    Ok(Json(RestoredListing::try_from(listing)?))
}

pub async fn listing_quota(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ListingQuota>> {
    Ok(Json(state.lifecycle.listing_quota(&user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SweepParams {
    /// Page size, capped at the configured batch limit.
    pub limit: Option<usize>,
}

pub async fn sweep(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> ApiResult<Json<SweepSummary>> {
    let limit = match params.limit {
        Some(0) => return Err(ApiError::BadRequest("limit must be positive".to_string())),
        Some(limit) => limit.min(state.sweep_batch_limit),
        None => state.sweep_batch_limit,
    };

    let summary = state.lifecycle.sweep(limit).await?;
    state.metrics.record_sweep_archived(summary.archived as u64);
    info!(
        limit,
        batches = summary.batches,
        archived = summary.archived,
        "sweep requested over http"
    );
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIdResponse {
    pub message_id: String,
}

pub async fn allocate_message_id(State(state): State<AppState>) -> Json<MessageIdResponse> {
    Json(MessageIdResponse {
        message_id: state.message_ids.allocate().await,
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    ))
}
