//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Every failure
//! in this crate is scoped to one request or one connection; none of them
//! is allowed to take the process down. Variants that can surface before a
//! WebSocket upgrade map to a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "origin not allowed: https://evil.example"
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Request         | 400 Bad Request / 403       |
/// | 2000–2999 | Routing         | 404 Not Found               |
/// | 3000–3999 | Server          | 500 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// WebSocket request from an origin outside the allow-list.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// Malformed action envelope.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Requested region is not part of the startup snapshot.
    #[error("region was not found: {0}")]
    UnknownRegion(String),

    /// Read or write failure on an upgraded socket.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// The hub run loop is no longer accepting commands.
    #[error("connection hub is not running")]
    HubUnavailable,

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::OriginRejected(_) => 1001,
            Self::Codec(_) => 1002,
            Self::UnknownRegion(_) => 2001,
            Self::Transport(_) => 3001,
            Self::HubUnavailable => 3002,
            Self::Config(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::OriginRejected(_) => StatusCode::FORBIDDEN,
            Self::Codec(_) => StatusCode::BAD_REQUEST,
            Self::UnknownRegion(_) => StatusCode::NOT_FOUND,
            Self::Transport(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_rejection_is_forbidden() {
        let err = GatewayError::OriginRejected("https://evil.example".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), 1001);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unknown_region_message_names_region() {
        let err = GatewayError::UnknownRegion("mars".to_string());
        assert_eq!(err.to_string(), "region was not found: mars");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn hub_unavailable_is_503() {
        assert_eq!(
            GatewayError::HubUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
