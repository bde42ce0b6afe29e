use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::api::AppState;

/// Body posted by the buyer page. `order_id` may arrive as a number or a string.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub order_id: Option<JsonValue>,
    pub nonce: Option<String>,
}

impl StatusQuery {
    fn order_id(&self) -> Option<i64> {
        match self.order_id.as_ref()? {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// POST /api/payments/status
pub async fn check_status(
    State(state): State<AppState>,
    body: String,
) -> Response {
    let query: StatusQuery = serde_json::from_str(&body).unwrap_or_default();

    match state
        .status
        .check(query.order_id(), query.nonce.as_deref(), Utc::now())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(serde_json::json!({
                    "status": "unknown",
                    "message": e.user_message(),
                })),
            )
                .into_response()
        }
    }
}
