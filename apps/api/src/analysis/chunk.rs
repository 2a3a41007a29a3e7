//! Chunk protocol — the typed events an analysis stream emits.
//!
//! Wire form is one JSON object per chunk: `{"type": ..., "content": ..., "message": ...}`
//! with both payload fields always present. Framing (newline-delimited) is applied by
//! `to_ndjson`; everything else about transport lives in the handlers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Status,
    Partial,
    Complete,
    Error,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "ChunkFrame")]
pub enum Chunk {
    /// Progress notice. Carries `message` only.
    Status(String),
    /// One generated fragment, verbatim.
    Partial(String),
    /// Terminal: the full accumulated text.
    Complete(String),
    /// Terminal: streaming failed; carries the retry text or the fallback message.
    Error(String),
    /// Terminal: the sequence was cut short by the transport; carries the fallback message.
    Fallback(String),
}

/// Flat wire shape of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFrame {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub content: Option<String>,
    pub message: Option<String>,
}

impl Chunk {
    pub fn status(message: impl Into<String>) -> Self {
        Chunk::Status(message.into())
    }

    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Status(_) => ChunkKind::Status,
            Chunk::Partial(_) => ChunkKind::Partial,
            Chunk::Complete(_) => ChunkKind::Complete,
            Chunk::Error(_) => ChunkKind::Error,
            Chunk::Fallback(_) => ChunkKind::Fallback,
        }
    }

    /// Exactly one terminal chunk ends every sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Chunk::Complete(_) | Chunk::Error(_) | Chunk::Fallback(_)
        )
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Chunk::Status(_) => None,
            Chunk::Partial(text)
            | Chunk::Complete(text)
            | Chunk::Error(text)
            | Chunk::Fallback(text) => Some(text),
        }
    }

    /// Serializes to a single JSON line terminated by `\n`.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl From<Chunk> for ChunkFrame {
    fn from(chunk: Chunk) -> Self {
        let kind = chunk.kind();
        match chunk {
            Chunk::Status(message) => ChunkFrame {
                kind,
                content: None,
                message: Some(message),
            },
            Chunk::Partial(content)
            | Chunk::Complete(content)
            | Chunk::Error(content)
            | Chunk::Fallback(content) => ChunkFrame {
                kind,
                content: Some(content),
                message: None,
            },
        }
    }
}
