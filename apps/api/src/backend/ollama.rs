//! Ollama provider — talks to a local or remote Ollama daemon over its HTTP API.
//!
//! Single-shot calls hit `/api/generate` with `stream: false` and are post-processed
//! before being returned. Streaming calls read the NDJSON body incrementally and
//! forward each `response` fragment untouched.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::postprocess::postprocess;
use crate::backend::{BackendError, GenerationBackend, GenerationOptions};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_PROMPT: &str = "Test";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    num_predict: u32,
}

impl RequestOptions {
    fn analysis(options: &GenerationOptions) -> Self {
        Self {
            temperature: Some(options.temperature),
            top_p: Some(options.top_p),
            num_predict: options.max_tokens,
        }
    }

    fn probe() -> Self {
        Self {
            temperature: None,
            top_p: None,
            num_predict: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

/// One decoded line of a streaming `/api/generate` body.
#[derive(Debug, PartialEq)]
struct StreamLine {
    text: Option<String>,
    done: bool,
}

#[derive(Clone)]
pub struct OllamaBackend {
    /// Bounded by `REQUEST_TIMEOUT` end to end. Used for single-shot calls and probes.
    client: Client,
    /// No total deadline: a live stream may outlast `REQUEST_TIMEOUT`. The transport
    /// bounds the whole analysis instead.
    stream_client: Client,
    base_url: String,
    model: String,
    options: GenerationOptions,
}

impl OllamaBackend {
    /// Builds the client and confirms the daemon answers before any request is admitted.
    pub async fn connect(
        base_url: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Result<Self, BackendError> {
        let backend = Self::new(base_url, model, options, REQUEST_TIMEOUT)?;

        let version_url = format!("{}/api/version", backend.base_url);
        let response = backend
            .client
            .get(&version_url)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{version_url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BackendError::Unavailable(format!(
                "{version_url} returned {}",
                response.status()
            )));
        }

        info!("Ollama backend initialized with model: {}", backend.model);
        Ok(backend)
    }

    fn new(
        base_url: &str,
        model: &str,
        options: GenerationOptions,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let stream_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            stream_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options,
        })
    }

    /// Sends a generate request and returns the response once the status is known to be good.
    async fn post_generate(
        &self,
        client: &Client,
        prompt: &str,
        stream: bool,
        options: RequestOptions,
    ) -> Result<reqwest::Response, BackendError> {
        let request_body = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options,
        };

        let response = client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn generate_once(
        &self,
        prompt: &str,
        options: RequestOptions,
    ) -> Result<GenerateResponse, BackendError> {
        let body = self
            .post_generate(&self.client, prompt, false, options)
            .await?
            .bytes()
            .await?;
        let response: GenerateResponse = serde_json::from_slice(&body)?;
        if let Some(error) = response.error {
            return Err(BackendError::Provider(error));
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let response = self
            .generate_once(prompt, RequestOptions::analysis(&self.options))
            .await?;
        let generated = response.response.ok_or(BackendError::EmptyResponse)?;
        let generated = generated.trim();

        info!(
            "Generated {} chars using Ollama ({})",
            generated.chars().count(),
            self.model
        );
        Ok(postprocess(generated))
    }

    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
    ) -> BoxStream<'a, Result<String, BackendError>> {
        let stream = async_stream::stream! {
            let options = RequestOptions::analysis(&self.options);
            let response = match self
                .post_generate(&self.stream_client, prompt, true, options)
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            let mut fragments = decode_ndjson(response.bytes_stream());
            while let Some(fragment) = fragments.next().await {
                yield fragment;
            }
        };

        stream.boxed()
    }

    fn model_identifier(&self) -> String {
        format!("ollama-{}", self.model)
    }

    async fn health_probe(&self) -> bool {
        match self.generate_once(PROBE_PROMPT, RequestOptions::probe()).await {
            Ok(response) => response.response.is_some(),
            Err(e) => {
                warn!("Ollama health check failed: {e}");
                false
            }
        }
    }
}

/// Turns a streaming `/api/generate` body into text fragments.
///
/// Lines may arrive split across network chunks. The stream ends at the first
/// `done: true` line, at the first undecodable line, or when the body ends.
fn decode_ndjson<'a, S, E>(body: S) -> BoxStream<'a, Result<String, BackendError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'a,
    E: Into<BackendError> + Send + 'a,
{
    let stream = async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut buffer = BytesMut::new();
        let mut received = 0usize;

        while let Some(item) = body.next().await {
            let bytes = match item {
                Ok(bytes) => bytes,
                Err(err) => {
                    yield Err(err.into());
                    return;
                }
            };
            buffer.extend_from_slice(&bytes);

            for line in drain_lines(&mut buffer) {
                match decode_stream_line(&line) {
                    Ok(decoded) => {
                        if let Some(text) = decoded.text {
                            received += text.chars().count();
                            yield Ok(text);
                        }
                        if decoded.done {
                            info!("Full response length: {received}");
                            return;
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        // The daemon may close the body without a trailing newline.
        if !buffer.is_empty() {
            match decode_stream_line(&buffer) {
                Ok(decoded) => {
                    if let Some(text) = decoded.text {
                        received += text.chars().count();
                        yield Ok(text);
                    }
                }
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }

        info!("Full response length: {received}");
    };

    stream.boxed()
}

/// Splits every complete newline-terminated line off the front of `buffer`.
fn drain_lines(buffer: &mut BytesMut) -> Vec<BytesMut> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        lines.push(buffer.split_to(pos + 1));
    }
    lines
}

fn decode_stream_line(line: &[u8]) -> Result<StreamLine, BackendError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(StreamLine {
            text: None,
            done: false,
        });
    }

    let chunk: GenerateResponse = serde_json::from_slice(line)?;
    if let Some(error) = chunk.error {
        return Err(BackendError::Provider(error));
    }

    Ok(StreamLine {
        text: chunk.response.filter(|text| !text.is_empty()),
        done: chunk.done,
    })
}
