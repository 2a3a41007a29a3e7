pub mod auth;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let analysis = Router::new()
        .route("/analyze", post(handlers::handle_analyze))
        .route("/analyze/stream", post(handlers::handle_analyze_stream))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(analysis)
        .with_state(state)
}
