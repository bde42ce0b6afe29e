use serde::Serialize;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Machine-readable error codes returned to API clients.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "AUTHENTICATION_ERROR")]
    Authentication,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "TRANSPORT_ERROR")]
    Transport,
    #[serde(rename = "GATEWAY_REJECTED")]
    GatewayRejected,
    #[serde(rename = "PROTOCOL_ERROR")]
    Protocol,
    #[serde(rename = "UNKNOWN_RESULT_CODE")]
    UnknownResultCode,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Gateway rejected the request: {message}")]
    GatewayRejected {
        message: String,
        status_code: Option<String>,
    },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The gateway answered "00" but a field the payment method depends on is absent.
    #[error("Missing field in gateway response: {field}")]
    MissingField { field: String },

    #[error("Unknown result code: {code}")]
    UnknownResultCode { code: String },

    #[error("Order store error: {message}")]
    Store { message: String },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        PaymentError::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        PaymentError::Authentication {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PaymentError::NotFound {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        PaymentError::Protocol {
            message: message.into(),
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::Authentication { .. } => 403,
            PaymentError::NotFound { .. } => 404,
            PaymentError::Transport { .. } => 503,
            PaymentError::GatewayRejected { .. } => 502,
            PaymentError::Protocol { .. } => 502,
            PaymentError::MissingField { .. } => 502,
            PaymentError::UnknownResultCode { .. } => 400,
            PaymentError::Store { .. } => 500,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            PaymentError::Validation { .. } => ErrorCode::Validation,
            PaymentError::Authentication { .. } => ErrorCode::Authentication,
            PaymentError::NotFound { .. } => ErrorCode::NotFound,
            PaymentError::Transport { .. } => ErrorCode::Transport,
            PaymentError::GatewayRejected { .. } => ErrorCode::GatewayRejected,
            PaymentError::Protocol { .. } | PaymentError::MissingField { .. } => {
                ErrorCode::Protocol
            }
            PaymentError::UnknownResultCode { .. } => ErrorCode::UnknownResultCode,
            PaymentError::Store { .. } => ErrorCode::Internal,
        }
    }

    /// Errors the aggregator should see as a rejected callback (HTTP 400).
    /// Store failures are excluded so the callback gets redelivered.
    pub fn is_callback_rejection(&self) -> bool {
        !matches!(self, PaymentError::Store { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Transport { .. } | PaymentError::Store { .. }
        )
    }

    /// Bounded message shown to the buyer. Gateway and transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Validation { message, .. } => message.clone(),
            PaymentError::Authentication { .. } => "Invalid security token".to_string(),
            PaymentError::NotFound { message } => message.clone(),
            PaymentError::Transport { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::GatewayRejected { .. }
            | PaymentError::Protocol { .. }
            | PaymentError::MissingField { .. } => {
                "Payment could not be created. Please try another payment method".to_string()
            }
            PaymentError::UnknownResultCode { .. } => "Unrecognized payment result".to_string(),
            PaymentError::Store { .. } => {
                "An internal error occurred. Please try again later".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(PaymentError::validation("bad", None).http_status_code(), 400);
        assert_eq!(
            PaymentError::authentication("Invalid signature").http_status_code(),
            403
        );
        assert_eq!(
            PaymentError::Transport {
                message: "timeout".to_string()
            }
            .http_status_code(),
            503
        );
        assert_eq!(
            PaymentError::Store {
                message: "down".to_string()
            }
            .http_status_code(),
            500
        );
    }

    #[test]
    fn callback_reasons_are_short() {
        assert_eq!(
            PaymentError::authentication("Invalid merchant code").to_string(),
            "Invalid merchant code"
        );
        assert_eq!(
            PaymentError::UnknownResultCode {
                code: "99".to_string()
            }
            .to_string(),
            "Unknown result code: 99"
        );
    }

    #[test]
    fn user_message_hides_gateway_details() {
        let err = PaymentError::GatewayRejected {
            message: "Merchant not found (internal id 42)".to_string(),
            status_code: Some("01".to_string()),
        };
        assert!(!err.user_message().contains("internal id"));
        assert!(!PaymentError::Store {
            message: "connection refused".to_string()
        }
        .is_callback_rejection());
    }
}
