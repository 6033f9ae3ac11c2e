use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cache unreachable: {0}")]
    CacheConnection(String),

    #[error("Cache operation on '{key}' timed out after {threshold_ms}ms")]
    CacheTimeout { key: String, threshold_ms: u64 },

    #[error("Cache payload for '{key}' could not be decoded: {detail}")]
    CacheSerialization { key: String, detail: String },

    #[error("Cache {op} on '{key}' failed: {detail}")]
    CacheOperation {
        op: &'static str,
        key: String,
        detail: String,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// True for the cache-local taxonomy (connectivity, timeout,
    /// serialization, wrapped operation faults). These are recoverable by
    /// falling back to the source of truth; everything else propagates.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            Self::CacheConnection(_)
                | Self::CacheTimeout { .. }
                | Self::CacheSerialization { .. }
                | Self::CacheOperation { .. }
        )
    }

    /// True for the subset of cache errors where the entry may still exist
    /// and will expire on its own (the backend could not be reached in time).
    pub fn is_cache_connectivity_error(&self) -> bool {
        matches!(
            self,
            Self::CacheConnection(_) | Self::CacheTimeout { .. }
        )
    }
}

impl IntoResponse for ParleyError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ParleyError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ParleyError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ParleyError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ParleyError::CacheConnection(_)
            | ParleyError::CacheTimeout { .. }
            | ParleyError::CacheSerialization { .. }
            | ParleyError::CacheOperation { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ParleyError::Embedding(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ParleyError::VectorStore(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ParleyError::Llm(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ParleyError::LlmUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ParleyError::LlmRateLimit { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("LLM rate limit exceeded, retry after {retry_after:?} seconds"),
            ),
            ParleyError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ParleyError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ParleyError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ParleyError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
