mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{get, json, post_json, seed_order, seed_pending_payment, test_app};
use duitku_gateway::database::order_repository::OrderRepository;
use duitku_gateway::payments::types::PaymentStatus;
use duitku_gateway::services::expiry::EXPIRED_NOTE;

async fn nonce_for(app: &common::TestApp, order_id: i64) -> String {
    let (status, body) = get(&app.router, &format!("/api/orders/{}/payment", order_id)).await;
    assert_eq!(status, StatusCode::OK);
    json(&body)["nonce"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_pending_order_reports_waiting() {
    let app = test_app();
    seed_pending_payment(
        &app.orders,
        55,
        10_000,
        Utc::now() + Duration::minutes(60),
        Some("8950012345678901"),
    )
    .await;
    let nonce = nonce_for(&app, 55).await;

    // The page may send the order id as a string.
    let (status, body) = post_json(
        &app.router,
        "/api/payments/status",
        &json!({ "order_id": "55", "nonce": nonce }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = json(&body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["message"], "Waiting for payment to VA: 8950012345678901");
    assert_eq!(body["redirectUrl"], "");
}

#[tokio::test]
async fn test_completed_order_redirects_to_receipt() {
    let app = test_app();
    seed_pending_payment(&app.orders, 55, 10_000, Utc::now() + Duration::minutes(60), None).await;
    let nonce = nonce_for(&app, 55).await;

    let (status, _) = post_json(
        &app.router,
        "/duitku/callback",
        &json!({
            "merchantCode": "D001",
            "amount": "10000",
            "merchantOrderId": "DPAY-55",
            "productDetail": "Batik Shirt",
            "additionalParam": "",
            "paymentCode": "VC",
            "resultCode": "00",
            "merchantUserId": "",
            "reference": "DS55",
            "signature": "4b36e2526882129669e5b78a0d9841dc"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app.router,
        "/api/payments/status",
        &json!({ "order_id": 55, "nonce": nonce }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["message"], "Payment completed!");
    assert_eq!(
        body["redirectUrl"],
        "https://shop.example/checkout/order-received/55"
    );
}

#[tokio::test]
async fn test_overdue_order_expires_once() {
    let app = test_app();
    seed_pending_payment(&app.orders, 55, 10_000, Utc::now() - Duration::minutes(1), None).await;
    let nonce = nonce_for(&app, 55).await;

    for _ in 0..2 {
        let (status, body) = post_json(
            &app.router,
            "/api/payments/status",
            &json!({ "order_id": 55, "nonce": nonce }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["status"], "expired");
        assert_eq!(body["redirectUrl"], "https://shop.example/checkout");
    }

    let order = app.orders.find(55).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Expired);
    assert_eq!(order.notes.iter().filter(|n| n.note == EXPIRED_NOTE).count(), 1);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = test_app();
    seed_pending_payment(&app.orders, 55, 10_000, Utc::now() + Duration::minutes(60), None).await;

    let (status, body) = post_json(
        &app.router,
        "/api/payments/status",
        &json!({ "order_id": 55, "nonce": "forged" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = json(&body);
    assert_eq!(body["status"], "unknown");
    assert_eq!(body["message"], "Invalid security token");

    let (status, _) = post_json(&app.router, "/api/payments/status", &json!({ "order_id": 55 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_order_without_duitku_payment() {
    let app = test_app();
    seed_order(&app.orders, 56, 10_000).await;

    let (status, body) = get(&app.router, "/api/orders/56/payment").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["message"], "Invalid payment method");

    let (status, _) = get(&app.router, "/api/orders/404/payment").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancellation_hook_expires_overdue_orders() {
    let app = test_app();
    seed_pending_payment(&app.orders, 55, 10_000, Utc::now() - Duration::minutes(1), None).await;

    let (status, body) = post_json(&app.router, "/api/orders/55/cancelled", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["expired"], true);
    assert_eq!(body["status"], "expired");

    let (_, body) = post_json(&app.router, "/api/orders/55/cancelled", &json!({})).await;
    assert_eq!(json(&body)["status"], serde_json::Value::Null);

    let order = app.orders.find(55).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Expired);
    assert_eq!(order.notes.iter().filter(|n| n.note == EXPIRED_NOTE).count(), 1);
}

#[tokio::test]
async fn test_host_cancellation_survives_late_success_callback() {
    let app = test_app();
    seed_pending_payment(&app.orders, 55, 10_000, Utc::now() + Duration::minutes(60), None).await;

    let (status, body) = post_json(&app.router, "/api/orders/55/cancelled", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["expired"], false);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(
        app.orders.find(55).await.unwrap().unwrap().status,
        PaymentStatus::Cancelled
    );

    let (status, _) = post_json(
        &app.router,
        "/duitku/callback",
        &json!({
            "merchantCode": "D001",
            "amount": "10000",
            "merchantOrderId": "DPAY-55",
            "productDetail": "Batik Shirt",
            "additionalParam": "",
            "paymentCode": "VC",
            "resultCode": "00",
            "merchantUserId": "",
            "reference": "DS55",
            "signature": "4b36e2526882129669e5b78a0d9841dc"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.orders.find(55).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Cancelled);
    assert!(!order
        .notes
        .iter()
        .any(|n| n.note.starts_with("Payment completed")));
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app();

    let (status, body) = get(&app.router, "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["checks"]["order_store"]["details"], "in-memory");
    assert_eq!(body["checks"]["duitku"]["status"], "Warning");
}
