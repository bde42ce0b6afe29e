//! Inbound Duitku payment-result callbacks.
//!
//! Validation runs as a short-circuiting pipeline; nothing is written until
//! every step has passed, and then all effects land in one store call.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DuitkuSettings;
use crate::database::order_repository::{CallbackUpdate, OrderRepository};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::signature::verify_callback;
use crate::payments::types::ResultCode;

pub const REQUIRED_FIELDS: [&str; 10] = [
    "merchantCode",
    "amount",
    "merchantOrderId",
    "productDetail",
    "additionalParam",
    "paymentCode",
    "resultCode",
    "merchantUserId",
    "reference",
    "signature",
];

/// What an accepted callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub order_id: i64,
    pub result: ResultCode,
    pub transitioned: bool,
}

/// The ten callback fields, as strings.
#[derive(Debug, Clone)]
struct CallbackFields {
    merchant_code: String,
    amount: String,
    merchant_order_id: String,
    result_code: String,
    reference: String,
    signature: String,
    settlement_date: Option<String>,
}

impl CallbackFields {
    fn extract(payload: &Map<String, Value>) -> PaymentResult<Self> {
        for field in REQUIRED_FIELDS {
            if field_str(payload, field).is_none() {
                return Err(PaymentError::validation(
                    format!("Missing required field: {}", field),
                    Some(field),
                ));
            }
        }

        let get = |name: &str| field_str(payload, name).unwrap_or_default();
        Ok(Self {
            merchant_code: get("merchantCode"),
            amount: get("amount"),
            merchant_order_id: get("merchantOrderId"),
            result_code: get("resultCode"),
            reference: get("reference"),
            signature: get("signature"),
            settlement_date: field_str(payload, "settlementDate").filter(|s| !s.is_empty()),
        })
    }
}

/// Strings are taken exactly as received, numbers are rendered; null and
/// other types count as absent.
fn field_str(payload: &Map<String, Value>, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct CallbackHandler {
    settings: Arc<DuitkuSettings>,
    orders: Arc<dyn OrderRepository>,
}

impl CallbackHandler {
    pub fn new(settings: Arc<DuitkuSettings>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { settings, orders }
    }

    pub async fn handle(&self, payload: &Value) -> PaymentResult<CallbackOutcome> {
        let object = payload
            .as_object()
            .ok_or_else(|| PaymentError::validation("Invalid callback data", None))?;

        let fields = CallbackFields::extract(object)?;

        if fields.merchant_code != self.settings.merchant_code {
            warn!(
                merchant_order_id = %fields.merchant_order_id,
                "callback with foreign merchant code"
            );
            return Err(PaymentError::authentication("Invalid merchant code"));
        }

        if !verify_callback(
            &fields.signature,
            &fields.merchant_code,
            &fields.amount,
            &fields.merchant_order_id,
            &self.settings.api_key,
        ) {
            warn!(
                merchant_order_id = %fields.merchant_order_id,
                "callback signature mismatch"
            );
            return Err(PaymentError::authentication("Invalid signature"));
        }

        let order_id = self
            .settings
            .order_id_from_merchant_order_id(&fields.merchant_order_id)
            .ok_or_else(|| PaymentError::not_found("Order not found"))?;

        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order not found"))?;

        let payment = order
            .payment
            .as_ref()
            .filter(|p| p.merchant_order_id == fields.merchant_order_id)
            .ok_or_else(|| PaymentError::not_found("Order not found"))?;

        let result: ResultCode = fields.result_code.parse()?;

        if fields.amount.parse::<i64>().ok() != Some(payment.amount) {
            warn!(
                order_id,
                callback_amount = %fields.amount,
                expected_amount = payment.amount,
                "callback amount differs from transaction amount"
            );
        }

        let note = match result {
            ResultCode::Success => Some(format!(
                "Payment completed via Duitku. Reference: {}",
                fields.reference
            )),
            ResultCode::Failed => Some(format!(
                "Payment cancelled or failed. Reference: {}",
                fields.reference
            )),
            ResultCode::Pending => None,
        };

        let update = CallbackUpdate {
            raw_payload: payload.clone(),
            transition: result.target_status(),
            note,
            settlement_date: match result {
                ResultCode::Success => fields.settlement_date.clone(),
                _ => None,
            },
        };

        let transitioned = self.orders.apply_callback(order_id, update).await?;

        info!(
            order_id,
            result_code = result.as_str(),
            reference = %fields.reference,
            transitioned,
            "duitku callback processed"
        );

        Ok(CallbackOutcome {
            order_id,
            result,
            transitioned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawDuitkuSettings;
    use crate::database::memory::InMemoryOrderRepository;
    use crate::database::order_repository::{CustomerContact, Order, PaymentAttachment, PaymentRecord};
    use crate::payments::types::PaymentStatus;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn settings() -> Arc<DuitkuSettings> {
        Arc::new(
            DuitkuSettings::sanitize(RawDuitkuSettings {
                merchant_code: Some("D001".to_string()),
                api_key: Some("KEY".to_string()),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    async fn repo_with_order() -> Arc<InMemoryOrderRepository> {
        let repo = Arc::new(InMemoryOrderRepository::new());
        repo.insert_order(&Order::new(
            55,
            Decimal::new(10_000, 0),
            "IDR",
            CustomerContact::default(),
            vec!["Book".to_string()],
        ))
        .await
        .unwrap();
        let now = Utc::now();
        repo.attach_payment(
            55,
            PaymentAttachment {
                record: PaymentRecord {
                    merchant_order_id: "DPAY-55".to_string(),
                    reference: "DS55".to_string(),
                    payment_url: Some("https://pay.example".to_string()),
                    va_number: None,
                    qr_string: None,
                    payment_code: None,
                    method_id: "duitku".to_string(),
                    payment_method_code: None,
                    amount: 10_000,
                    expires_at: now + Duration::minutes(60),
                    callback_payload: None,
                    settlement_date: None,
                    created_at: now,
                },
                fee: None,
                note: "Awaiting payment via Duitku".to_string(),
            },
        )
        .await
        .unwrap();
        repo
    }

    fn callback(result_code: &str, signature: &str) -> Value {
        json!({
            "merchantCode": "D001",
            "amount": "10000",
            "merchantOrderId": "DPAY-55",
            "productDetail": "Book",
            "additionalParam": "",
            "paymentCode": "VC",
            "resultCode": result_code,
            "merchantUserId": "",
            "reference": "DS55",
            "signature": signature,
            "settlementDate": "2026-10-18"
        })
    }

    const GOOD_SIGNATURE: &str = "4b36e2526882129669e5b78a0d9841dc";

    #[tokio::test]
    async fn success_callback_completes_once() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        let first = handler.handle(&callback("00", GOOD_SIGNATURE)).await.unwrap();
        assert!(first.transitioned);
        let second = handler.handle(&callback("00", GOOD_SIGNATURE)).await.unwrap();
        assert!(!second.transitioned);

        let order = repo.find(55).await.unwrap().unwrap();
        assert_eq!(order.status, PaymentStatus::Completed);
        let completions = order
            .notes
            .iter()
            .filter(|n| n.note == "Payment completed via Duitku. Reference: DS55")
            .count();
        assert_eq!(completions, 1);
        assert_eq!(
            order.payment.unwrap().settlement_date.as_deref(),
            Some("2026-10-18")
        );
    }

    #[tokio::test]
    async fn outbound_field_order_is_not_accepted() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        // merchantCode + merchantOrderId + amount + apiKey
        let err = handler
            .handle(&callback("00", "307561f3ab57491314e38e08e7d769bf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Authentication { .. }));
        assert_eq!(
            repo.find(55).await.unwrap().unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn pending_result_only_stores_payload() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        let outcome = handler.handle(&callback("01", GOOD_SIGNATURE)).await.unwrap();
        assert!(!outcome.transitioned);

        let order = repo.find(55).await.unwrap().unwrap();
        assert_eq!(order.status, PaymentStatus::Pending);
        assert!(order.payment.unwrap().callback_payload.is_some());
    }

    #[tokio::test]
    async fn failed_result_cancels() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        handler.handle(&callback("02", GOOD_SIGNATURE)).await.unwrap();
        let order = repo.find(55).await.unwrap().unwrap();
        assert_eq!(order.status, PaymentStatus::Cancelled);
        assert!(order.payment.unwrap().settlement_date.is_none());
    }

    #[tokio::test]
    async fn unknown_result_code_writes_nothing() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        let err = handler.handle(&callback("03", GOOD_SIGNATURE)).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown result code: 03");
        assert!(repo
            .find(55)
            .await
            .unwrap()
            .unwrap()
            .payment
            .unwrap()
            .callback_payload
            .is_none());
    }

    #[tokio::test]
    async fn missing_and_null_fields_are_rejected() {
        let handler = CallbackHandler::new(settings(), repo_with_order().await);

        let mut payload = callback("00", GOOD_SIGNATURE);
        payload["reference"] = Value::Null;
        let err = handler.handle(&payload).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: reference");

        let err = handler.handle(&json!(["not", "an", "object"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid callback data");
    }

    #[tokio::test]
    async fn signed_fields_are_compared_verbatim() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        let mut payload = callback("00", GOOD_SIGNATURE);
        payload["merchantCode"] = json!(" D001");
        assert_eq!(
            handler.handle(&payload).await.unwrap_err().to_string(),
            "Invalid merchant code"
        );

        for (field, padded) in [
            ("amount", "10000 "),
            ("merchantOrderId", "DPAY-55 "),
            ("signature", " 4b36e2526882129669e5b78a0d9841dc"),
        ] {
            let mut payload = callback("00", GOOD_SIGNATURE);
            payload[field] = json!(padded);
            assert_eq!(
                handler.handle(&payload).await.unwrap_err().to_string(),
                "Invalid signature",
                "{} with padding",
                field
            );
        }

        assert_eq!(
            repo.find(55).await.unwrap().unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn numeric_amount_is_accepted() {
        let repo = repo_with_order().await;
        let handler = CallbackHandler::new(settings(), repo.clone());

        let mut payload = callback("00", GOOD_SIGNATURE);
        payload["amount"] = json!(10000);
        assert!(handler.handle(&payload).await.unwrap().transitioned);
    }

    #[tokio::test]
    async fn foreign_prefix_and_merchant_are_rejected() {
        let handler = CallbackHandler::new(settings(), repo_with_order().await);

        let mut payload = callback("00", GOOD_SIGNATURE);
        payload["merchantCode"] = json!("D999");
        assert_eq!(
            handler.handle(&payload).await.unwrap_err().to_string(),
            "Invalid merchant code"
        );

        let mut payload = callback("00", "");
        payload["merchantOrderId"] = json!("TRX-55");
        payload["signature"] = json!(crate::payments::signature::callback_signature(
            "D001", "10000", "TRX-55", "KEY"
        ));
        assert!(matches!(
            handler.handle(&payload).await.unwrap_err(),
            PaymentError::NotFound { .. }
        ));
    }
}
