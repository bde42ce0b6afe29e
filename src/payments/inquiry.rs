//! Interpretation of inquiry responses.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::methods::{InstrumentKind, PaymentMethodDescriptor};
use crate::payments::types::InquiryResponse;
use crate::payments::utils::RawResponse;

const SUCCESS_STATUS_CODE: &str = "00";

/// Fields of a successful inquiry that end up on the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub reference: String,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub payment_code: Option<String>,
}

/// Turn a raw HTTP answer into an accepted inquiry response.
///
/// Empty or non-JSON bodies are protocol errors. Any `statusCode` other than
/// `"00"` is a rejection, whatever the HTTP status was.
pub fn parse_inquiry_response(raw: &RawResponse) -> PaymentResult<InquiryResponse> {
    let body = raw.body.trim();
    if body.is_empty() {
        return Err(PaymentError::protocol(format!(
            "empty response from Duitku API (HTTP {})",
            raw.status
        )));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PaymentError::protocol(format!("invalid JSON from Duitku API: {}", e)))?;

    // Non-2xx answers usually carry {"Message": "..."} instead of the inquiry shape.
    if !(200..300).contains(&raw.status) && value.get("statusCode").is_none() {
        let message = value
            .get("Message")
            .or_else(|| value.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error occurred")
            .to_string();
        return Err(PaymentError::GatewayRejected {
            message,
            status_code: Some(raw.status.to_string()),
        });
    }

    let response: InquiryResponse = serde_json::from_value(value).map_err(|e| {
        PaymentError::protocol(format!("unexpected response shape from Duitku API: {}", e))
    })?;

    match response.status_code.as_deref() {
        None => Err(PaymentError::protocol(
            "Invalid response format from Duitku API",
        )),
        Some(SUCCESS_STATUS_CODE) => Ok(response),
        Some(code) => Err(PaymentError::GatewayRejected {
            message: response
                .status_message
                .clone()
                .unwrap_or_else(|| "Unknown error occurred".to_string()),
            status_code: Some(code.to_string()),
        }),
    }
}

/// Check that an accepted response carries what the payment method needs.
pub fn accept_for_method(
    response: InquiryResponse,
    method: &PaymentMethodDescriptor,
) -> PaymentResult<CreatedTransaction> {
    let reference = non_empty(response.reference).ok_or_else(|| PaymentError::MissingField {
        field: "reference".to_string(),
    })?;

    let created = CreatedTransaction {
        reference,
        payment_url: non_empty(response.payment_url),
        va_number: non_empty(response.va_number),
        qr_string: non_empty(response.qr_string),
        payment_code: non_empty(response.payment_code),
    };

    let present = match method.instrument {
        InstrumentKind::HostedPage => created.payment_url.is_some(),
        InstrumentKind::VirtualAccount => created.va_number.is_some(),
        InstrumentKind::QrString => created.qr_string.is_some(),
        InstrumentKind::RetailCode => created.payment_code.is_some(),
    };
    if !present {
        return Err(PaymentError::MissingField {
            field: method.instrument.response_field().to_string(),
        });
    }

    Ok(created)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::methods::default_methods;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    fn method(id: &str) -> PaymentMethodDescriptor {
        default_methods()
            .into_iter()
            .find(|m| m.id == id)
            .expect("builtin method")
    }

    #[test]
    fn empty_and_garbage_bodies_are_protocol_errors() {
        assert!(matches!(
            parse_inquiry_response(&raw(200, "  ")),
            Err(PaymentError::Protocol { .. })
        ));
        assert!(matches!(
            parse_inquiry_response(&raw(200, "<html>")),
            Err(PaymentError::Protocol { .. })
        ));
        assert!(matches!(
            parse_inquiry_response(&raw(200, r#"{"reference":"R1"}"#)),
            Err(PaymentError::Protocol { .. })
        ));
    }

    #[test]
    fn non_success_status_code_is_rejection() {
        let err = parse_inquiry_response(&raw(
            200,
            r#"{"statusCode":"01","statusMessage":"Payment channel not available"}"#,
        ))
        .unwrap_err();
        match err {
            PaymentError::GatewayRejected {
                message,
                status_code,
            } => {
                assert_eq!(message, "Payment channel not available");
                assert_eq!(status_code.as_deref(), Some("01"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn http_error_with_message_is_rejection() {
        let err =
            parse_inquiry_response(&raw(400, r#"{"Message":"Wrong signature"}"#)).unwrap_err();
        assert!(matches!(err, PaymentError::GatewayRejected { ref message, .. } if message == "Wrong signature"));
    }

    #[test]
    fn va_method_requires_va_number() {
        let response = parse_inquiry_response(&raw(
            200,
            r#"{"statusCode":"00","reference":"DS1234","paymentUrl":"https://pay"}"#,
        ))
        .unwrap();
        let err = accept_for_method(response, &method("duitku_permata")).unwrap_err();
        assert!(matches!(err, PaymentError::MissingField { ref field } if field == "vaNumber"));
    }

    #[test]
    fn qris_method_accepts_qr_string() {
        let response = parse_inquiry_response(&raw(
            200,
            r#"{"statusCode":"00","reference":"DS1234","qrString":"00020101021226","statusMessage":"SUCCESS"}"#,
        ))
        .unwrap();
        let created = accept_for_method(response, &method("duitku_shopeepay")).unwrap();
        assert_eq!(created.reference, "DS1234");
        assert_eq!(created.qr_string.as_deref(), Some("00020101021226"));
        assert!(created.va_number.is_none());
    }

    #[test]
    fn missing_reference_is_reported() {
        let response = parse_inquiry_response(&raw(
            200,
            r#"{"statusCode":"00","paymentUrl":"https://pay","reference":" "}"#,
        ))
        .unwrap();
        let err = accept_for_method(response, &method("duitku")).unwrap_err();
        assert!(matches!(err, PaymentError::MissingField { ref field } if field == "reference"));
    }
}
