//! Health Aggregator — turns a backend probe into an operator-facing status record.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tracing::error;

use crate::backend::GenerationBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenGeneration {
    Enabled,
    Limited,
    Disabled,
}

/// Recomputed on every probe; never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    #[serde(rename = "model")]
    pub model_identifier: String,
    pub platform: String,
    pub token_generation: TokenGeneration,
    #[serde(rename = "uptime")]
    pub uptime_seconds: Option<f64>,
}

/// Operating system family name as operators expect to read it.
pub fn platform_name() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "windows" => "Windows".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "unknown".to_string(),
            }
        }
    }
}

/// Probes `backend` and reports uptime since `started_at` (monotonic).
///
/// A probe that panics is reported as `unhealthy` rather than taking the caller down.
pub async fn probe_backend(backend: &dyn GenerationBackend, started_at: Instant) -> HealthStatus {
    let probe = AssertUnwindSafe(async {
        let reachable = backend.health_probe().await;
        (reachable, backend.model_identifier())
    })
    .catch_unwind()
    .await;

    match probe {
        Ok((reachable, model_identifier)) => HealthStatus {
            status: if reachable {
                ServiceStatus::Healthy
            } else {
                ServiceStatus::Degraded
            },
            model_identifier,
            platform: platform_name(),
            token_generation: if reachable {
                TokenGeneration::Enabled
            } else {
                TokenGeneration::Limited
            },
            uptime_seconds: Some(started_at.elapsed().as_secs_f64()),
        },
        Err(_) => {
            error!("Health check failed: backend probe panicked");
            HealthStatus {
                status: ServiceStatus::Unhealthy,
                model_identifier: "unknown".to_string(),
                platform: platform_name(),
                token_generation: TokenGeneration::Disabled,
                uptime_seconds: None,
            }
        }
    }
}
