//! Unified API error handling
//!
//! Every endpoint returns `Result<T, ApiError>` so clients always see the
//! same error envelope. Missing source data is a 404, a failing query or
//! pipeline stage is a 500; the distinction tells callers whether anything
//! exists to query at all.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::StoreError;
use crate::service::trigger::{RunError, Stage};

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    #[allow(dead_code)] // Reserved for future request validation
    BadRequest(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// A pipeline stage triggered by the request failed (500)
    #[error("Pipeline stage '{stage}' failed: {detail}")]
    StageFailed { stage: Stage, detail: String },
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::StageFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Database(_) => "database_error",
            ApiError::StageFailed { .. } => "pipeline_failed",
        };

        tracing::error!(
            error_type = error_type,
            status = status.as_u16(),
            message = %self,
            "API error"
        );

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl ApiError {
    /// Map a stage failure, keeping question-not-found a 404.
    pub fn from_stage(stage: Stage, err: RunError) -> Self {
        match err {
            RunError::QuestionNotFound(id) => {
                ApiError::NotFound(format!("question {} not found", id))
            }
            other => ApiError::StageFailed {
                stage,
                detail: other.to_string(),
            },
        }
    }
}
