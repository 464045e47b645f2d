//! Maps domain failures onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use pb_core::error::AppError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ApiError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self(AppError::NotFound(kind.to_string(), id.to_string()))
    }

    /// Storage failures outside the battle flow.
    pub fn storage(err: anyhow::Error) -> Self {
        Self(AppError::Internal(format!("{err:#}")))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::EmptyPool | AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(..) | AppError::SessionClosed => StatusCode::NOT_FOUND,
            AppError::VoteInFlight => StatusCode::CONFLICT,
            AppError::FetchFailure(_) | AppError::VoteWriteFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }))
    }
}
