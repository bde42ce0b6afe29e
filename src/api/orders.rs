//! Host-facing order endpoints: order registration, the cancellation hook
//! and payment details for the host payment page.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::api::AppState;
use crate::database::error::DatabaseErrorKind;
use crate::database::order_repository::{CustomerContact, Order};
use crate::middleware::error::{get_request_id_from_headers, payment_error_response};
use crate::payments::error::PaymentError;
use crate::payments::types::PaymentStatus;

#[derive(Debug, Deserialize)]
pub struct RegisterOrderRequest {
    pub order_id: i64,
    pub total: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub customer: CustomerContact,
    #[serde(default)]
    pub item_names: Vec<String>,
}

fn default_currency() -> String {
    "IDR".to_string()
}

/// POST /api/orders
pub async fn register_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterOrderRequest>,
) -> Response {
    let request_id = get_request_id_from_headers(&headers);

    if request.order_id <= 0 {
        let err = PaymentError::validation("Order ID must be positive", Some("order_id"));
        return payment_error_response(&err, request_id);
    }
    if request.total <= Decimal::ZERO {
        let err = PaymentError::validation("Order total must be positive", Some("total"));
        return payment_error_response(&err, request_id);
    }

    let order = Order::new(
        request.order_id,
        request.total,
        request.currency.trim().to_uppercase(),
        request.customer,
        request.item_names,
    );

    match state.orders.insert_order(&order).await {
        Ok(()) => {
            info!(order_id = order.order_id, total = %order.total, "order registered");
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(e) if matches!(e.kind, DatabaseErrorKind::Conflict { .. }) => {
            let err = PaymentError::validation("Order already exists", Some("order_id"));
            payment_error_response(&err, request_id)
        }
        Err(e) => payment_error_response(&e.into(), request_id),
    }
}

/// POST /api/orders/{id}/cancelled
///
/// Host cancellation event. A pending order becomes `expired` when its
/// payment window has passed and `cancelled` otherwise.
pub async fn order_cancelled(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Response {
    match state.sweeper.on_order_cancelled(order_id, Utc::now()).await {
        Ok(written) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "order_id": order_id,
                "expired": written == Some(PaymentStatus::Expired),
                "status": written,
            })),
        )
            .into_response(),
        Err(e) => payment_error_response(&e, get_request_id_from_headers(&headers)),
    }
}

/// GET /api/orders/{id}/payment
pub async fn payment_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Response {
    match state.status.details(order_id, Utc::now()).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => payment_error_response(&e, get_request_id_from_headers(&headers)),
    }
}
