use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure talking to an upstream data provider (box scores, rosters, injuries, odds).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("unexpected payload shape: {0}")]
    Shape(String),
    #[error("provider {0} is not configured")]
    Unconfigured(String),
}

/// Expected columns were absent from a tabular upstream payload.
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("snapshot store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::InternalError(message) => {
                tracing::error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
