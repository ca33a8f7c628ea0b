use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{accounts::AccountError, repository::StoreError, storage::ImageError};

/// Body of every JSON error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

/// ApiError
///
/// Request-terminating failures. Client errors carry their message to the caller; internal
/// failures are logged in full and answered with a generic body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Store(#[source] StoreError),

    #[error("session failure: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Converts a store error, naming the entity in the not-found case.
    pub fn from_store(entity: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound(entity),
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::LastAdmin => ApiError::Conflict(StoreError::LastAdmin.to_string()),
            other => ApiError::Store(other),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(_)
            | ApiError::Session(_)
            | ApiError::Template(_)
            | ApiError::Task(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::from_store("Record", err)
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Unsupported(_) | ImageError::Decode(_) => {
                ApiError::Validation(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UsernameTaken(_) => ApiError::Conflict(err.to_string()),
            AccountError::Blank(_) => ApiError::Validation(err.to_string()),
            AccountError::Store(store) => ApiError::from_store("User", store),
            AccountError::Hash(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
