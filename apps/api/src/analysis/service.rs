//! Analysis Service — drives a `GenerationBackend` for one request at a time and
//! turns the outcome into text or a chunk stream.
//!
//! Flow per streaming request:
//!   render prompt (once) → status → status(model) → partial* →
//!   complete | (stream failed → single-shot retry → error)
//!
//! No backend failure ever escapes as an `Err`: every sequence ends with exactly one
//! terminal chunk, and the single-shot path always returns usable text.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{BoxStream, StreamExt};
use tracing::{error, info, warn};

use crate::analysis::chunk::Chunk;
use crate::analysis::health::{probe_backend, HealthStatus};
use crate::analysis::prompts::render_analysis_prompt;
use crate::backend::GenerationBackend;

/// Substituted whenever generation fails or produces too little to be useful.
pub const FALLBACK_ANALYSIS: &str = "Something went wrong and an analysis cannot be provided";

/// Single-shot output shorter than this (in characters) is treated as a failure.
pub const MIN_ANALYSIS_CHARS: usize = 100;

pub const STARTING_MESSAGE: &str = "Starting AI analysis...";

const PROMPT_PREVIEW_CHARS: usize = 100;

pub struct AnalysisService {
    backend: Arc<dyn GenerationBackend>,
    started_at: Instant,
}

impl AnalysisService {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            started_at: Instant::now(),
        }
    }

    pub fn model_identifier(&self) -> String {
        self.backend.model_identifier()
    }

    /// Single-shot analysis. Failures and short output both yield `FALLBACK_ANALYSIS`.
    pub async fn generate_analysis(&self, content: &str, url: &str) -> String {
        let prompt = render_analysis_prompt(url, content);
        single_shot(self.backend.as_ref(), &prompt).await
    }

    /// Streaming analysis as a lazy chunk sequence.
    ///
    /// Nothing is pulled from the backend until the caller polls. Dropping the
    /// returned stream drops the backend stream with it.
    pub fn generate_analysis_stream(&self, content: &str, url: &str) -> BoxStream<'static, Chunk> {
        let backend = Arc::clone(&self.backend);
        let prompt = render_analysis_prompt(url, content);

        let stream = async_stream::stream! {
            info!(
                "Starting streaming analysis with prompt: {}...",
                prompt.chars().take(PROMPT_PREVIEW_CHARS).collect::<String>()
            );
            yield Chunk::status(STARTING_MESSAGE);
            yield Chunk::status(format!("Using {} model...", backend.model_identifier()));

            let mut analysis = String::new();
            let failure = {
                let mut fragments = backend.generate_stream(&prompt);
                let mut failure = None;
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => {
                            analysis.push_str(&text);
                            yield Chunk::Partial(text);
                        }
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                failure
            };

            match failure {
                None => {
                    info!("Streaming analysis complete: {} chars", analysis.chars().count());
                    yield Chunk::Complete(analysis);
                }
                Some(err) => {
                    error!("Streaming analysis failed: {err}");
                    let recovered = single_shot(backend.as_ref(), &prompt).await;
                    if recovered != FALLBACK_ANALYSIS {
                        warn!(
                            "Recovered analysis with single-shot retry: {} chars",
                            recovered.chars().count()
                        );
                    }
                    yield Chunk::Error(recovered);
                }
            }
        };

        stream.boxed()
    }

    pub async fn health_check(&self) -> HealthStatus {
        probe_backend(self.backend.as_ref(), self.started_at).await
    }
}

fn meets_length_floor(text: &str) -> bool {
    text.chars().count() >= MIN_ANALYSIS_CHARS
}

/// One `generate` call with the length floor applied.
async fn single_shot(backend: &dyn GenerationBackend, prompt: &str) -> String {
    match backend.generate(prompt).await {
        Ok(text) if meets_length_floor(&text) => text,
        Ok(text) => {
            warn!(
                "Analysis too short ({} chars, minimum {MIN_ANALYSIS_CHARS}), using fallback",
                text.chars().count()
            );
            FALLBACK_ANALYSIS.to_string()
        }
        Err(e) => {
            error!("Analysis generation failed: {e}");
            FALLBACK_ANALYSIS.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use super::*;
    use crate::analysis::chunk::ChunkKind;
    use crate::backend::testing::{ScriptedBackend, Step};

    const URL: &str = "https://shop.example.com/products/truffle-box";

    fn service(backend: &Arc<ScriptedBackend>) -> AnalysisService {
        AnalysisService::new(Arc::clone(backend) as Arc<dyn GenerationBackend>)
    }

    async fn collect(service: &AnalysisService, content: &str) -> Vec<Chunk> {
        service
            .generate_analysis_stream(content, URL)
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_successful_stream_emits_status_partials_complete() {
        let backend = Arc::new(ScriptedBackend::streaming(&["Str", "engths:\n- A\n"]));
        let chunks = collect(&service(&backend), "Truffles").await;

        assert_eq!(
            chunks,
            vec![
                Chunk::status(STARTING_MESSAGE),
                Chunk::status("Using scripted-model model..."),
                Chunk::Partial("Str".to_string()),
                Chunk::Partial("engths:\n- A\n".to_string()),
                Chunk::Complete("Strengths:\n- A\n".to_string()),
            ]
        );
        assert_eq!(backend.single_shot_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stream_failure_retries_single_shot_once() {
        let retry_text = "R".repeat(150);
        let backend = Arc::new(
            ScriptedBackend::new(vec![Step::Fragment("Str"), Step::Fail])
                .with_single_shot(retry_text.clone()),
        );
        let chunks = collect(&service(&backend), "Truffles").await;

        let kinds: Vec<ChunkKind> = chunks.iter().map(Chunk::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Status,
                ChunkKind::Status,
                ChunkKind::Partial,
                ChunkKind::Error
            ]
        );
        assert_eq!(chunks.last().and_then(Chunk::content), Some(retry_text.as_str()));
        assert_eq!(backend.single_shot_calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Runs on the test's own thread so the scoped subscriber sees every event.
    async fn collect_with_logs(service: &AnalysisService, content: &str) -> (Vec<Chunk>, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let chunks = collect(service, content).await;
        (chunks, logs.contents())
    }

    #[tokio::test]
    async fn test_stream_start_logs_prompt_preview() {
        let backend = Arc::new(ScriptedBackend::streaming(&["A"]));
        let (_, logs) = collect_with_logs(&service(&backend), "Truffles").await;

        let preview: String = backend.recorded_prompts()[0]
            .chars()
            .take(PROMPT_PREVIEW_CHARS)
            .collect();
        let first_line = preview.lines().next().unwrap_or_default();
        assert!(logs.contains("Starting streaming analysis with prompt:"));
        assert!(logs.contains(first_line));
    }

    #[tokio::test]
    async fn test_recovered_retry_logs_warning_with_length() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Step::Fail]).with_single_shot("R".repeat(150)),
        );
        let (chunks, logs) = collect_with_logs(&service(&backend), "Truffles").await;

        assert_eq!(chunks.last(), Some(&Chunk::Error("R".repeat(150))));
        let warning = logs
            .lines()
            .find(|line| line.contains("Recovered analysis with single-shot retry"))
            .expect("retry warning logged");
        assert!(warning.contains("WARN"));
        assert!(warning.contains("150 chars"));
    }

    #[tokio::test]
    async fn test_failed_retry_logs_no_recovery() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Fail]));
        let (_, logs) = collect_with_logs(&service(&backend), "Truffles").await;

        assert!(logs.contains("Streaming analysis failed"));
        assert!(!logs.contains("Recovered analysis"));
    }

    #[tokio::test]
    async fn test_stream_failure_with_failed_retry_uses_fallback() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Fail]));
        let chunks = collect(&service(&backend), "Truffles").await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], Chunk::Error(FALLBACK_ANALYSIS.to_string()));
    }

    #[tokio::test]
    async fn test_stream_failure_with_short_retry_uses_fallback() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Step::Fail]).with_single_shot("too short"),
        );
        let chunks = collect(&service(&backend), "Truffles").await;

        assert_eq!(chunks.last(), Some(&Chunk::Error(FALLBACK_ANALYSIS.to_string())));
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_chunk_and_it_is_last() {
        let scripts = vec![
            ScriptedBackend::streaming(&["a", "b"]),
            ScriptedBackend::new(vec![Step::Fragment("a"), Step::Fail]),
            ScriptedBackend::new(vec![Step::Fail]).with_single_shot("x".repeat(120)),
            ScriptedBackend::streaming(&[]),
        ];
        for script in scripts {
            let backend = Arc::new(script);
            let chunks = collect(&service(&backend), "Truffles").await;
            let terminals = chunks.iter().filter(|c| c.is_terminal()).count();
            assert_eq!(terminals, 1);
            assert!(chunks.last().is_some_and(Chunk::is_terminal));
        }
    }

    #[tokio::test]
    async fn test_empty_stream_completes_with_empty_text() {
        let backend = Arc::new(ScriptedBackend::streaming(&[]));
        let chunks = collect(&service(&backend), "Truffles").await;
        assert_eq!(chunks.last(), Some(&Chunk::Complete(String::new())));
    }

    #[tokio::test]
    async fn test_empty_fragments_are_not_forwarded() {
        let backend = Arc::new(ScriptedBackend::streaming(&["", "A", ""]));
        let chunks = collect(&service(&backend), "Truffles").await;
        let partials = chunks
            .iter()
            .filter(|c| c.kind() == ChunkKind::Partial)
            .count();
        assert_eq!(partials, 1);
    }

    #[tokio::test]
    async fn test_prompt_rendered_once_and_reused_for_retry() {
        let content = "c".repeat(1200);
        let backend = Arc::new(
            ScriptedBackend::new(vec![Step::Fail]).with_single_shot("y".repeat(200)),
        );
        collect(&service(&backend), &content).await;

        let prompts = backend.recorded_prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert!(prompts[0].contains(&format!("Content: {}...\n", "c".repeat(1000))));
        assert!(!prompts[0].contains(&"c".repeat(1001)));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_pulling_fragments() {
        let backend = Arc::new(ScriptedBackend::streaming(&["one", "two", "three"]));
        let service = service(&backend);

        let mut chunks = service.generate_analysis_stream("Truffles", URL);
        chunks.next().await;
        chunks.next().await;
        let first = chunks.next().await;
        assert_eq!(first, Some(Chunk::Partial("one".to_string())));
        drop(chunks);

        assert_eq!(backend.fragments_pulled.load(Ordering::SeqCst), 1);
        assert!(backend.stream_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_nothing_pulled_before_first_poll() {
        let backend = Arc::new(ScriptedBackend::streaming(&["one"]));
        let service = service(&backend);

        let chunks = service.generate_analysis_stream("Truffles", URL);
        drop(chunks);

        assert!(backend.recorded_prompts().is_empty());
        assert_eq!(backend.fragments_pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_shot_short_output_is_replaced() {
        let backend = Arc::new(ScriptedBackend::streaming(&[]).with_single_shot("s".repeat(40)));
        let analysis = service(&backend).generate_analysis("Truffles", URL).await;
        assert_eq!(analysis, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_single_shot_at_floor_is_kept() {
        let text = "k".repeat(MIN_ANALYSIS_CHARS);
        let backend = Arc::new(ScriptedBackend::streaming(&[]).with_single_shot(text.clone()));
        let analysis = service(&backend).generate_analysis("Truffles", URL).await;
        assert_eq!(analysis, text);
    }

    #[tokio::test]
    async fn test_single_shot_failure_is_replaced() {
        let backend = Arc::new(ScriptedBackend::streaming(&[]));
        let analysis = service(&backend).generate_analysis("Truffles", URL).await;
        assert_eq!(analysis, FALLBACK_ANALYSIS);
    }
}
