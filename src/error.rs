use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The gateway was asked to fetch something that is not a same-origin relative path.
    #[error("Invalid target path: {0}")]
    InvalidTarget(String),

    /// A client exceeded the gateway's request window.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The portal could not be reached, or the call timed out.
    #[error("Network error: {0}")]
    Network(String),

    /// A response body could not be decoded.
    #[error("Failed to decode {encoding} response body: {source}")]
    Decode {
        encoding: String,
        #[source]
        source: std::io::Error,
    },

    /// The portal no longer accepts the stored session.
    #[error("Session expired")]
    SessionExpired,

    /// Stored ciphertext could not be decrypted with the current key.
    #[error("Failed to decrypt data")]
    Decrypt,

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A portal payload did not have the expected shape.
    #[error("Parse failure: {0}")]
    Parse(String),

    /// A cached record could not be read back.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Network(format!("request timed out: {}", e))
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidTarget(ref msg) => {
                tracing::warn!("Invalid target path: {}", msg);
                (StatusCode::BAD_REQUEST, "Invalid target path".to_string())
            }

            AppError::RateLimited(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded. Please try again later.".to_string(),
                )
            }

            AppError::Network(ref msg) => {
                tracing::error!("Network error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Portal unreachable".to_string())
            }

            AppError::Decode { ref encoding, ref source } => {
                tracing::error!("Decode error ({}): {}", encoding, source);
                (StatusCode::BAD_GATEWAY, "Failed to decode portal response".to_string())
            }

            AppError::SessionExpired => {
                tracing::warn!("Portal session expired");
                (
                    StatusCode::UNAUTHORIZED,
                    "Session expired. Please log in again.".to_string(),
                )
            }

            AppError::Decrypt => {
                tracing::error!("Decryption failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to decrypt data".to_string())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Parse(ref msg) => {
                tracing::warn!("Parse failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Unexpected portal response".to_string())
            }

            AppError::Cache(ref msg) => {
                tracing::error!("Cache error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
