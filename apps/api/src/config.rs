use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    /// Ceiling on one streamed analysis, enforced by the transport.
    pub generation_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_key: require_env("AI_SERVICE_API_KEY")?,
            host: env_or("HOST", "0.0.0.0"),
            port: env_or("PORT", "8001")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "deepseek-r1:1.5b"),
            generation_timeout: Duration::from_secs(
                env_or("GENERATION_TIMEOUT_SECS", "300")
                    .parse::<u64>()
                    .context("GENERATION_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.is_empty() {
        anyhow::bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
