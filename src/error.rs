use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use tracing::error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("remote platform call failed")]
    Remote(#[from] RemoteError),

    #[error("audit log failure")]
    Audit(#[from] sqlx::Error),

    /// A required context collection came back empty; nothing is defaulted.
    #[error("employee has no {0} assignment")]
    MissingAssignment(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("request failed: {:?}", self);

        let (status, message) = match &self {
            AppError::Audit(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "audit log failure".to_string(),
            ),
            AppError::MissingAssignment(which) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("employee has no {which} assignment"),
            ),
            AppError::Remote(remote) => match remote {
                RemoteError::RateLimitExceeded { service } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("{service} rate limit exceeded"),
                ),
                RemoteError::Api {
                    service, status, ..
                } => (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} returned {status}"),
                ),
                RemoteError::Request(_) => (
                    StatusCode::BAD_GATEWAY,
                    "remote platform unreachable".to_string(),
                ),
                RemoteError::Token(_) => (
                    StatusCode::BAD_GATEWAY,
                    "remote platform authentication failed".to_string(),
                ),
                RemoteError::Json(_) | RemoteError::UrlParse(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error processing remote response".to_string(),
                ),
            },
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
