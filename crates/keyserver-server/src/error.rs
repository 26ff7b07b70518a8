use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Maps the error kinds of spec.md §7 onto HTTP status codes for the
/// trigger surface. `InvalidRequest` -> 400, everything else the puller or
/// mirror worker can fail with outside an expected not-found/locked case ->
/// 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

impl From<keyserver_federation::PullError> for AppError {
    fn from(err: keyserver_federation::PullError) -> Self {
        match err {
            keyserver_federation::PullError::UnknownQuery(id) => {
                AppError::InvalidRequest(format!("unknown federation query '{id}'"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
