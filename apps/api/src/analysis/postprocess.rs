//! Text Post-Processor — normalizes raw model output before it is shown or parsed.
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`. Only the
//! text after the closing marker is the answer; an unterminated block means the
//! answer, if any, came before it.

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

/// Strips reasoning blocks and blank lines, trimming every remaining line.
///
/// Total and idempotent: `postprocess(&postprocess(x)) == postprocess(x)`.
pub fn postprocess(raw: &str) -> String {
    let has_open = raw.contains(REASONING_OPEN);
    let has_close = raw.contains(REASONING_CLOSE);

    let mut text = if has_open && has_close {
        raw.rsplit(REASONING_CLOSE).next().unwrap_or_default().trim().to_string()
    } else if has_open {
        raw.split(REASONING_OPEN).next().unwrap_or_default().trim().to_string()
    } else {
        raw.to_string()
    };

    // Removing one marker can splice a new one together, e.g. "<th<think>ink>".
    while text.contains(REASONING_OPEN) || text.contains(REASONING_CLOSE) {
        text = text.replace(REASONING_OPEN, "").replace(REASONING_CLOSE, "");
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
