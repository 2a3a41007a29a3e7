use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MAX_CONTENT_CHARS: usize = 50_000;
pub const MAX_URL_CHARS: usize = 2_000;

/// Request body for both analysis endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub content: String,
    pub url: String,
}

impl AnalysisRequest {
    /// Enforces length bounds and the URL scheme before anything reaches a backend.
    pub fn validate(&self) -> Result<(), AppError> {
        let content_len = self.content.chars().count();
        if content_len == 0 || content_len > MAX_CONTENT_CHARS {
            return Err(AppError::Validation(format!(
                "content must be between 1 and {MAX_CONTENT_CHARS} characters (got {content_len})"
            )));
        }

        let url_len = self.url.chars().count();
        if url_len == 0 || url_len > MAX_URL_CHARS {
            return Err(AppError::Validation(format!(
                "url must be between 1 and {MAX_URL_CHARS} characters (got {url_len})"
            )));
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(AppError::Validation(
                "url must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }
}

/// Response body for the single-shot endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
    pub url: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}
