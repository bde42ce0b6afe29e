//! Error response formatting
//!
//! Standardized JSON error bodies for the gateway's own API endpoints.
//! The Duitku-facing callback and the buyer-facing status endpoint keep
//! their fixed wire formats and do not use this body.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::payments::error::{ErrorCode, PaymentError};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// RFC 3339 timestamp of the error
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn from_payment_error(error: &PaymentError, request_id: Option<String>) -> Self {
        let details = match error {
            PaymentError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            details,
            retryable: error.is_retryable(),
        }
    }
}

/// Map a payment error onto an HTTP response, logging server-side failures.
pub fn payment_error_response(error: &PaymentError, request_id: Option<String>) -> Response {
    let status =
        StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = %error, request_id = ?request_id, status = status.as_u16(), "server error occurred");
    } else {
        tracing::warn!(error = %error, request_id = ?request_id, status = status.as_u16(), "client error occurred");
    }

    (
        status,
        Json(ErrorResponse::from_payment_error(error, request_id)),
    )
        .into_response()
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        payment_error_response(&self, None)
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_field() {
        let error = PaymentError::validation("Order ID is required", Some("order_id"));
        let response = ErrorResponse::from_payment_error(&error, Some("req_1".to_string()));

        assert_eq!(response.error, ErrorCode::Validation);
        assert_eq!(response.message, "Order ID is required");
        assert_eq!(response.details, Some(serde_json::json!({"field": "order_id"})));
        assert!(!response.retryable);
    }

    #[test]
    fn store_error_is_generic_and_retryable() {
        let error = PaymentError::Store {
            message: "connection refused on 10.0.0.3".to_string(),
        };
        let response = ErrorResponse::from_payment_error(&error, None);
        assert_eq!(response.error, ErrorCode::Internal);
        assert!(!response.message.contains("10.0.0.3"));
        assert!(response.retryable);
    }

    #[test]
    fn payment_error_into_response_uses_status() {
        let response = PaymentError::not_found("Order not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn request_id_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc".parse().unwrap());
        assert_eq!(get_request_id_from_headers(&headers).as_deref(), Some("abc"));
    }
}
