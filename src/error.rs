use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad request: {title}")]
    BadRequest {
        title: String,
        detail: Option<String>,
    },

    #[error("Not found: {title}")]
    NotFound {
        title: String,
        detail: Option<String>,
    },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The detail is shown to the client, so it must stay generic.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(title: &str) -> Self {
        AppError::BadRequest {
            title: title.to_string(),
            detail: None,
        }
    }

    pub fn not_found(title: &str) -> Self {
        AppError::NotFound {
            title: title.to_string(),
            detail: None,
        }
    }

    /// Attach a detail message to a 400 or 404 error
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        match self {
            AppError::BadRequest { title, .. } => AppError::BadRequest {
                title,
                detail: Some(detail.into()),
            },
            AppError::NotFound { title, .. } => AppError::NotFound {
                title,
                detail: Some(detail.into()),
            },
            other => other,
        }
    }
}

/// Problem body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    pub status: u16,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

const INTERNAL_TITLE: &str = "Internal server error";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, detail) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_TITLE.to_string(), None)
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_TITLE.to_string(), None)
            }
            AppError::BadRequest { title, detail } => (StatusCode::BAD_REQUEST, title, detail),
            AppError::NotFound { title, detail } => (StatusCode::NOT_FOUND, title, detail),
            AppError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large".to_string(),
                Some(detail),
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_TITLE.to_string(),
                    Some(detail),
                )
            }
        };

        let body = Json(ProblemDetails {
            status: status.as_u16(),
            title,
            detail,
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
