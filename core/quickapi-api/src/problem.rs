//! Mapping of storage failures onto transport status codes.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quickapi_storage::{StorageError, StoreErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// Errors a transport reports back to its caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request itself could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Body of an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub code: u16,
    pub message: String,
}

/// Status code for a storage failure.
pub fn status_for(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Validation(_) => StatusCode::BAD_REQUEST,
        StorageError::Store { kind, .. } => match kind {
            StoreErrorKind::BadInput => StatusCode::BAD_REQUEST,
            StoreErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            StoreErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
        StorageError::Configuration(_) | StorageError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Storage(err) => status_for(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Logs the cause and returns what may be shown to the caller.
    pub fn to_problem(&self) -> Problem {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("request failed: {}", self);
            status
                .canonical_reason()
                .unwrap_or("internal error")
                .to_lowercase()
        } else {
            debug!("request rejected: {}", self);
            self.to_string()
        };
        Problem {
            code: status.as_u16(),
            message,
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_problem())).into_response()
    }
}
