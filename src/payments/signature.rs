//! MD5 request signatures.
//!
//! Duitku signs outbound inquiries and inbound callbacks with the same
//! primitive but with a different field order:
//!
//! * inquiry: `merchantCode + merchantOrderId + paymentAmount + apiKey`
//! * callback: `merchantCode + amount + merchantOrderId + apiKey`
//!
//! MD5 is weak, but the formula is fixed by the aggregator.

use crate::payments::utils::secure_eq;

/// Lowercase hex MD5 over the parts concatenated without a delimiter.
pub fn sign(parts: &[&str]) -> String {
    let mut context = md5::Context::new();
    for part in parts {
        context.consume(part.as_bytes());
    }
    format!("{:x}", context.compute())
}

/// Recompute the signature over `expected_parts` and compare it with `candidate`.
pub fn verify(candidate: &str, expected_parts: &[&str]) -> bool {
    let expected = sign(expected_parts);
    secure_eq(expected.as_bytes(), candidate.as_bytes())
}

pub fn outbound_signature(
    merchant_code: &str,
    merchant_order_id: &str,
    amount: i64,
    api_key: &str,
) -> String {
    sign(&[merchant_code, merchant_order_id, &amount.to_string(), api_key])
}

pub fn callback_signature(
    merchant_code: &str,
    amount: &str,
    merchant_order_id: &str,
    api_key: &str,
) -> String {
    sign(&[merchant_code, amount, merchant_order_id, api_key])
}

pub fn verify_callback(
    candidate: &str,
    merchant_code: &str,
    amount: &str,
    merchant_order_id: &str,
    api_key: &str,
) -> bool {
    verify(candidate, &[merchant_code, amount, merchant_order_id, api_key])
}
