use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domains::DomainError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(DomainError::NotFound(..)) => StatusCode::NOT_FOUND,
            Self::Domain(DomainError::Validation(_)) => StatusCode::CONFLICT,
            Self::Domain(DomainError::TransactionConflict(_)) => StatusCode::CONFLICT,
            Self::Domain(DomainError::MalformedTimestamp(_) | DomainError::MalformedData(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Domain(DomainError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Domain(DomainError::StoreUnavailable(detail)) => {
                error!(%detail, "store unavailable");
                "store unavailable".to_string()
            }
            Self::Internal(detail) => {
                error!(%detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
