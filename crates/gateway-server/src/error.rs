//! API error responses.
//!
//! Every error leaving the gateway is a JSON envelope of the form
//! `{"error": {"message": ..., "type": ...}}`, optionally carrying the
//! request id for correlation. Upstream error bodies are never echoed back;
//! callers get the gateway's own classification.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::GatewayError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details
    pub error: ApiErrorDetail,
}

/// Error detail body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Stable machine-readable type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Correlation id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error response builder used by handlers and middleware
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Stable type string
    pub error_type: String,
    /// Message shown to the caller
    pub message: String,
    /// Correlation id
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create an error response
    pub fn new(
        status: StatusCode,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Attach the correlation id
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// 401 with the authentication type
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication_error", message)
    }

    /// 404 for unroutable paths
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 503 for unavailable upstreams
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            message,
        )
    }

    /// 500 for gateway faults
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(
            status = %self.status,
            error_type = %self.error_type,
            message = %self.message,
            "Error response"
        );

        let body = ApiErrorResponse {
            error: ApiErrorDetail {
                message: self.message,
                error_type: self.error_type,
                request_id: self.request_id,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::new(err.status_code(), err.error_type(), err.to_string())
    }
}
