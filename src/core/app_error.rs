use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::core::aliases::DieselError;

/// Error taxonomy shared by every route handler.
///
/// Business-critical failures (missing entity, invalid transition) surface to
/// the caller. Side-effect failures never reach this type; handlers log them
/// and report them in the `degraded` field of their success response.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is unreachable")]
    ServiceUnreachable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            // Conflicts are invalid-transition attempts; reported as bad input.
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ServiceUnreachable(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Other(err) => {
                tracing::error!("Unhandled error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            other => AppError::Other(other.into()),
        }
    }
}
