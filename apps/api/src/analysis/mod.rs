// Product page analysis: prompt rendering, generation orchestration, the chunk
// protocol, and the text post-processing / section parsing around it.
// All generation goes through a `GenerationBackend` — no provider calls here.

pub mod chunk;
pub mod handlers;
pub mod health;
pub mod models;
pub mod parser;
pub mod postprocess;
pub mod prompts;
pub mod service;
