use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the feed ranking engine and its accessors.
///
/// Only `StoreUnavailable` is expected to reach callers of the three feed
/// operations; the other variants come from accessors and are absorbed or
/// converted by the engine before it returns.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("session store error: {0}")]
    Session(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing viewer identity: {0}")]
    Unauthorized(String),
}

impl FeedError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::StoreUnavailable(_) | FeedError::Database(_) | FeedError::Session(_)
        )
    }
}

impl From<sqlx::Error> for FeedError {
    fn from(err: sqlx::Error) -> Self {
        FeedError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for FeedError {
    fn from(err: redis::RedisError) -> Self {
        FeedError::Session(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    retryable: bool,
}

impl ResponseError for FeedError {
    fn status_code(&self) -> StatusCode {
        match self {
            FeedError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FeedError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self {
            FeedError::StoreUnavailable(_) => "store_unavailable",
            FeedError::Database(_) => "database",
            FeedError::Session(_) => "session",
            FeedError::Config(_) => "config",
            FeedError::Unauthorized(_) => "unauthorized",
        };

        let mut builder = HttpResponse::build(self.status_code());
        if matches!(self, FeedError::StoreUnavailable(_)) {
            builder.insert_header(("Retry-After", "5"));
        }

        // Accessor details stay in the logs.
        let message = match self {
            FeedError::Unauthorized(msg) => msg.clone(),
            FeedError::StoreUnavailable(_) => "feed temporarily unavailable".to_string(),
            _ => "internal server error".to_string(),
        };

        builder.json(ErrorBody {
            error: kind,
            message,
            retryable: self.is_retryable(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FeedError::StoreUnavailable("down".into()).is_retryable());
        assert!(FeedError::Session("timeout".into()).is_retryable());
        assert!(!FeedError::Config("bad".into()).is_retryable());
        assert!(!FeedError::Unauthorized("no header".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FeedError::StoreUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            FeedError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            FeedError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unavailable_response_carries_retry_after() {
        let response = FeedError::StoreUnavailable("pg down".into()).error_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("Retry-After"));
    }
}
