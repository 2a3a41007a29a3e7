//! Generation Backend — the single seam between the analysis service and whatever
//! produces text from a prompt.
//!
//! `AnalysisService` holds an `Arc<dyn GenerationBackend>` for the whole process
//! lifetime. Providers are swapped at startup in `main`, never per request.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod ollama;

#[cfg(test)]
pub mod testing;

/// Sampling temperature used for every analysis.
pub const TEMPERATURE: f32 = 0.3;
/// Nucleus sampling cutoff used for every analysis.
pub const TOP_P: f32 = 0.8;
/// Upper bound on generated tokens per analysis.
pub const MAX_TOKENS: u32 = 600;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Backend returned empty content")]
    EmptyResponse,
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Fixed tuning knobs handed to a provider at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
        }
    }
}

/// Capability contract for a text-generation provider.
///
/// Streaming and single-shot generation differ only in delivery granularity.
/// Fragments from `generate_stream` arrive in generation order and are never
/// empty; the stream is finite and cannot be restarted. Dropping it must
/// release any provider-side resources.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produces the full text for `prompt` in one call.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    /// Produces the text for `prompt` as a lazy sequence of fragments.
    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
    ) -> BoxStream<'a, Result<String, BackendError>>;

    /// Identifier used for status messages and health reports.
    fn model_identifier(&self) -> String;

    /// Minimal, low-cost generation. Never fails: any error reads as `false`.
    async fn health_probe(&self) -> bool;
}
