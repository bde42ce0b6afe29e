use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use crate::api::AppState;

/// POST /duitku/callback
///
/// Duitku treats anything but HTTP 200 as a failed delivery and retries.
/// Store failures answer 500 so the callback is delivered again.
pub async fn handle_callback(State(state): State<AppState>, body: String) -> Response {
    let payload: JsonValue = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "callback body is not JSON");
            return (StatusCode::BAD_REQUEST, "Invalid callback data").into_response();
        }
    };

    match state.callbacks.handle(&payload).await {
        Ok(outcome) => {
            info!(
                order_id = outcome.order_id,
                result_code = outcome.result.as_str(),
                "callback accepted"
            );
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) if e.is_callback_rejection() => {
            warn!(error = %e, "callback rejected");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "callback could not be stored");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Callback could not be processed",
            )
                .into_response()
        }
    }
}
