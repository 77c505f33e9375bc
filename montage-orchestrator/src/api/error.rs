//! API Error Handling
//!
//! Unified error type and conversions from the service layer errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::callback::CallbackError;
use crate::repository::RepositoryError;
use crate::service::{NodeError, PipelineError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unprocessable(String),
    RepositoryError(RepositoryError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::RepositoryError(err) => {
                tracing::error!("Repository error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NodeNotFound(_) | RepositoryError::PipelineNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::RepositoryError(other),
        }
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::NotFound(_) | NodeError::PipelineNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            NodeError::NotReady(e) => ApiError::Conflict(e.to_string()),
            NodeError::UnknownNodeType(_) => ApiError::Unprocessable(err.to_string()),
            NodeError::Repository(e) => e.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PipelineError::ValidationError(msg) => ApiError::BadRequest(msg),
            PipelineError::Repository(e) => e.into(),
        }
    }
}

impl From<CallbackError> for ApiError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::NodeNotFound(_) => ApiError::NotFound(err.to_string()),
            CallbackError::StaleCallback(_) => ApiError::Conflict(err.to_string()),
            CallbackError::MissingOutcome(_) => ApiError::BadRequest(err.to_string()),
            CallbackError::UnknownExecutor(_)
            | CallbackError::UnknownNodeType(_)
            | CallbackError::ExecutorMismatch { .. } => ApiError::Unprocessable(err.to_string()),
            CallbackError::Repository(e) => e.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
