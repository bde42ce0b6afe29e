use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::api::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: i64,
    pub payment_method: String,
}

/// POST /api/checkout
///
/// Mirrors the host checkout contract: `result` is either `success` with a
/// redirect or `fail` with a buyer-facing message.
pub async fn process_payment(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> impl IntoResponse {
    match state
        .transactions
        .create_transaction(request.order_id, &request.payment_method, Utc::now())
        .await
    {
        Ok(redirect) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "result": "success",
                "redirect": redirect.redirect,
            })),
        ),
        Err(e) => {
            warn!(order_id = request.order_id, error = %e, "checkout failed");
            let status = StatusCode::from_u16(e.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(serde_json::json!({
                    "result": "fail",
                    "message": e.user_message(),
                })),
            )
        }
    }
}
