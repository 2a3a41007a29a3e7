//! Axum route handlers for the Analysis API.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::analysis::chunk::Chunk;
use crate::analysis::models::{AnalysisRequest, AnalysisResponse};
use crate::analysis::parser::parse;
use crate::analysis::service::FALLBACK_ANALYSIS;
use crate::errors::{AppError, AppJson};
use crate::state::AppState;

/// POST /analyze/stream
///
/// Streams newline-delimited JSON chunks: status updates, partial fragments, then
/// exactly one terminal chunk. The whole sequence is bounded by the generation timeout.
pub async fn handle_analyze_stream(
    State(state): State<AppState>,
    AppJson(request): AppJson<AnalysisRequest>,
) -> Result<Response, AppError> {
    request.validate()?;
    info!(
        "Streaming analysis for {} ({} chars)",
        request.url,
        request.content.chars().count()
    );

    let chunks = state
        .service
        .generate_analysis_stream(&request.content, &request.url);
    let frames = bounded_by_deadline(chunks, state.config.generation_timeout)
        .map(|chunk| chunk.to_ndjson());

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// POST /analyze
///
/// Single-shot analysis, parsed into sections.
pub async fn handle_analyze(
    State(state): State<AppState>,
    AppJson(request): AppJson<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    request.validate()?;

    let analysis = state
        .service
        .generate_analysis(&request.content, &request.url)
        .await;
    let structure = parse(&analysis);

    let metadata = BTreeMap::from([
        ("model".to_string(), json!(state.service.model_identifier())),
        (
            "analysis_length".to_string(),
            json!(analysis.chars().count()),
        ),
        (
            "content_length".to_string(),
            json!(request.content.chars().count()),
        ),
    ]);

    Ok(Json(AnalysisResponse {
        analysis,
        url: request.url,
        strengths: structure.strengths,
        weaknesses: structure.weaknesses,
        recommendations: structure.recommendations,
        metadata,
    }))
}

/// Forwards `chunks` until a terminal chunk or the deadline, whichever comes first.
///
/// On timeout the inner stream is dropped (cancelling the backend) and a single
/// `fallback` chunk closes the sequence.
fn bounded_by_deadline<S>(chunks: S, timeout: Duration) -> impl Stream<Item = Chunk> + Send
where
    S: Stream<Item = Chunk> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut chunks = chunks;
        loop {
            match tokio::time::timeout_at(deadline, chunks.next()).await {
                Ok(Some(chunk)) => {
                    if chunk.is_terminal() {
                        info!(
                            "Analysis stream finished: {:?} ({} chars)",
                            chunk.kind(),
                            chunk.content().map_or(0, |text| text.chars().count())
                        );
                        yield chunk;
                        break;
                    }
                    yield chunk;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Analysis exceeded {}s, emitting fallback", timeout.as_secs());
                    drop(chunks);
                    yield Chunk::Fallback(FALLBACK_ANALYSIS.to_string());
                    break;
                }
            }
        }
    }
}
