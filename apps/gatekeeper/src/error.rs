// [[GATEKEEPER]]/apps/gatekeeper/src/error.rs
// Purpose: Terminal outcomes of the gate and their fixed wire shapes.
// Architecture: API Layer
// Dependencies: thiserror, axum, serde_json

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Forbidden")]
    Forbidden,
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("CSRF validation failed: origin mismatch")]
    CsrfRejected,
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::Forbidden | GateError::CsrfRejected => StatusCode::FORBIDDEN,
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        // Only the Display text goes on the wire.
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Counter backend connection failed")]
    Connection(#[source] redis::RedisError),
    #[error("Counter backend timed out after {0}ms")]
    Timeout(u64),
    #[error("Counter backend error")]
    Backend(#[source] redis::RedisError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
