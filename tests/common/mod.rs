//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use duitku_gateway::api::{self, AppState};
use duitku_gateway::config::{DuitkuSettings, RawDuitkuSettings};
use duitku_gateway::database::memory::InMemoryOrderRepository;
use duitku_gateway::database::order_repository::{
    CustomerContact, Order, OrderRepository, PaymentAttachment, PaymentRecord,
};
use duitku_gateway::health::HealthChecker;
use duitku_gateway::payments::error::PaymentResult;
use duitku_gateway::payments::provider::PaymentGateway;
use duitku_gateway::payments::types::{InquiryRequest, InquiryResponse};

pub const MERCHANT_CODE: &str = "D001";
pub const API_KEY: &str = "KEY";
pub const BASE_URL: &str = "https://shop.example";

/// Answers every inquiry with the same result and records the requests.
pub struct StubGateway {
    answer: PaymentResult<InquiryResponse>,
    pub requests: Mutex<Vec<InquiryRequest>>,
}

impl StubGateway {
    pub fn new(answer: PaymentResult<InquiryResponse>) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_inquiry(&self, request: &InquiryRequest) -> PaymentResult<InquiryResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn accepted_inquiry(reference: &str) -> InquiryResponse {
    InquiryResponse {
        merchant_code: Some(MERCHANT_CODE.to_string()),
        reference: Some(reference.to_string()),
        payment_url: Some(format!("https://sandbox.duitku.com/topup/v2/Pay?ref={}", reference)),
        va_number: Some("8950012345678901".to_string()),
        qr_string: None,
        payment_code: None,
        status_code: Some("00".to_string()),
        status_message: Some("SUCCESS".to_string()),
    }
}

pub struct TestApp {
    pub router: Router,
    pub orders: Arc<InMemoryOrderRepository>,
    pub settings: Arc<DuitkuSettings>,
    pub gateway: Arc<StubGateway>,
}

pub fn settings() -> DuitkuSettings {
    DuitkuSettings::sanitize(RawDuitkuSettings {
        merchant_code: Some(MERCHANT_CODE.to_string()),
        api_key: Some(API_KEY.to_string()),
        public_base_url: Some(BASE_URL.to_string()),
        ..Default::default()
    })
    .unwrap()
}

pub fn test_app_with(answer: PaymentResult<InquiryResponse>) -> TestApp {
    let settings = Arc::new(settings());
    let orders = Arc::new(InMemoryOrderRepository::new());
    let gateway = Arc::new(StubGateway::new(answer));
    let health = HealthChecker::new(None, settings.environment, settings.methods.len());
    let state = AppState::new(settings.clone(), gateway.clone(), orders.clone(), health);

    TestApp {
        router: api::router(state),
        orders,
        settings,
        gateway,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(Ok(accepted_inquiry("DS55")))
}

pub async fn seed_order(orders: &InMemoryOrderRepository, order_id: i64, total: i64) {
    orders
        .insert_order(&Order::new(
            order_id,
            Decimal::new(total, 0),
            "IDR",
            CustomerContact {
                first_name: "Budi".to_string(),
                last_name: "Santoso".to_string(),
                email: "budi@example.com".to_string(),
                phone: "08123456789".to_string(),
                ..Default::default()
            },
            vec!["Batik Shirt".to_string()],
        ))
        .await
        .unwrap();
}

/// Seed a pending order that already carries a Duitku transaction.
pub async fn seed_pending_payment(
    orders: &InMemoryOrderRepository,
    order_id: i64,
    amount: i64,
    expires_at: DateTime<Utc>,
    va_number: Option<&str>,
) {
    seed_order(orders, order_id, amount).await;
    orders
        .attach_payment(
            order_id,
            PaymentAttachment {
                record: PaymentRecord {
                    merchant_order_id: format!("DPAY-{}", order_id),
                    reference: format!("DS{}", order_id),
                    payment_url: Some("https://sandbox.duitku.com/topup/v2/Pay".to_string()),
                    va_number: va_number.map(str::to_string),
                    qr_string: None,
                    payment_code: None,
                    method_id: if va_number.is_some() {
                        "duitku_permata".to_string()
                    } else {
                        "duitku".to_string()
                    },
                    payment_method_code: va_number.map(|_| "BT".to_string()),
                    amount,
                    expires_at,
                    callback_payload: None,
                    settlement_date: None,
                    created_at: expires_at - Duration::minutes(60),
                },
                fee: None,
                note: format!("Awaiting payment via Duitku. Reference: DS{}", order_id),
            },
        )
        .await
        .unwrap();
}

pub async fn post_json(router: &Router, uri: &str, body: &Value) -> (StatusCode, String) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_raw(router: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}
