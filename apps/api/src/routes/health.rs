use axum::{extract::State, Json};

use crate::analysis::health::HealthStatus;
use crate::state::AppState;

/// GET /health
/// Probes the generation backend and reports service status, model, and uptime.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health_check().await)
}
