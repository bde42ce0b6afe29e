use axum::{extract::State, http::StatusCode, Json};
use tracing::{debug, error};

use crate::api::AppState;
use crate::health::{HealthState, HealthStatus};

/// GET /health
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    let health_status = state.health_checker.check_health().await;

    // Return 503 if any component is unhealthy
    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("health check failed - service unhealthy");
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        debug!(status = ?health_status.status, "health check passed");
        Ok(Json(health_status))
    }
}

/// GET /health/live
pub async fn liveness() -> &'static str {
    "OK"
}
