use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Validation failed: {field} must not be blank")]
    Validation { field: &'static str },
    #[error("Rate limit exceeded")]
    RateLimited { blocked_until: Option<OffsetDateTime> },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked_until: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, field, blocked_until) = match self {
            AppError::Db(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None, None),
            AppError::Validation { field } => (
                StatusCode::BAD_REQUEST,
                format!("{field} must not be blank"),
                Some(field),
                None,
            ),
            AppError::RateLimited { blocked_until } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
                None,
                blocked_until.and_then(|t| t.format(&Rfc3339).ok()),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string(), None, None),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string(), None, None),
            AppError::Conflict(e) => (StatusCode::CONFLICT, e, None, None),
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e, None, None),
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message,
            field,
            blocked_until,
        });
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
