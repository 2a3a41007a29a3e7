//! Scripted in-process backend for exercising the analysis service without a daemon.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use crate::backend::{BackendError, GenerationBackend};

/// One scripted step of a streaming generation.
#[derive(Debug, Clone)]
pub enum Step {
    Fragment(&'static str),
    Fail,
}

/// How `health_probe` behaves.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    Reachable,
    Unreachable,
    Panics,
}

pub struct ScriptedBackend {
    steps: Vec<Step>,
    single_shot: Option<String>,
    probe: Probe,
    pub prompts: Mutex<Vec<String>>,
    pub single_shot_calls: AtomicUsize,
    pub fragments_pulled: AtomicUsize,
    pub stream_dropped: AtomicBool,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            single_shot: None,
            probe: Probe::Reachable,
            prompts: Mutex::new(Vec::new()),
            single_shot_calls: AtomicUsize::new(0),
            fragments_pulled: AtomicUsize::new(0),
            stream_dropped: AtomicBool::new(false),
        }
    }

    pub fn streaming(fragments: &[&'static str]) -> Self {
        Self::new(fragments.iter().copied().map(Step::Fragment).collect())
    }

    /// `generate` succeeds with `text`. Without this it fails.
    pub fn with_single_shot(mut self, text: impl Into<String>) -> Self {
        self.single_shot = Some(text.into());
        self
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str) {
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}

struct DropFlag<'a>(&'a AtomicBool);

impl Drop for DropFlag<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        self.record(prompt);
        self.single_shot_calls.fetch_add(1, Ordering::SeqCst);
        self.single_shot
            .clone()
            .ok_or_else(|| BackendError::Provider("scripted single-shot failure".to_string()))
    }

    fn generate_stream<'a>(
        &'a self,
        prompt: &'a str,
    ) -> BoxStream<'a, Result<String, BackendError>> {
        self.record(prompt);
        let stream = async_stream::stream! {
            let _guard = DropFlag(&self.stream_dropped);
            for step in &self.steps {
                match step {
                    Step::Fragment(text) => {
                        self.fragments_pulled.fetch_add(1, Ordering::SeqCst);
                        yield Ok(text.to_string());
                    }
                    Step::Fail => {
                        yield Err(BackendError::Provider("scripted stream failure".to_string()));
                        return;
                    }
                }
            }
        };
        stream.boxed()
    }

    fn model_identifier(&self) -> String {
        "scripted-model".to_string()
    }

    async fn health_probe(&self) -> bool {
        match self.probe {
            Probe::Reachable => true,
            Probe::Unreachable => false,
            Probe::Panics => panic!("scripted probe fault"),
        }
    }
}
