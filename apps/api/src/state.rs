use std::sync::Arc;

use crate::analysis::service::AnalysisService;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Long-lived analysis service wrapping the generation backend handle.
    pub service: Arc<AnalysisService>,
    pub config: Config,
}
