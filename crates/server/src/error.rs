use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("bad auth or refresh credentials")]
    BadCredentials,
    #[error("operation is not valid anymore, likely requires session refresh or re-login")]
    Expired,
    #[error("too many requests, try again later")]
    RateLimited,
    #[error("requested object doesn't exist or the caller doesn't have access")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error("input value is invalid: `{value}`, reason: {reason}")]
    InvalidInput { value: String, reason: String },
    #[error("limit exceeded for {subject}, allowed {limit} {unit}(s), got {attempted}")]
    LimitExceeded {
        subject: String,
        unit: String,
        attempted: usize,
        limit: usize,
    },
    #[error("requested object already exists")]
    AlreadyExists,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Sqlx(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not found".into()),
                e => {
                    error!("received internal error for user request: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Something went wrong".into(),
                    )
                }
            },
            Self::Io(e) => {
                error!("received io error for user request: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".into(),
                )
            }
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            e @ Self::BadCredentials => (StatusCode::UNAUTHORIZED, e.to_string()),
            e @ Self::Expired => (StatusCode::UNAUTHORIZED, e.to_string()),
            e @ Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
            e @ Self::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
        };
        let error = json!({ "error": error }).to_string();
        (status, error).into_response()
    }
}

#[derive(Clone, Debug)]
pub enum SessionError {
    BadToken,
    TokenNotFound,
    TokenExpired,
    Internal,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadToken => (StatusCode::BAD_REQUEST, "Missing or bad token in request"),
            Self::TokenNotFound => (StatusCode::UNAUTHORIZED, "Token cannot be found"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong"),
        };
        let error = json!({ "error": error }).to_string();
        (status, error).into_response()
    }
}
