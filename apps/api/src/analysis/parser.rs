//! Structured Parser — extracts strengths / weaknesses / recommendations from analysis text.
//!
//! One top-to-bottom pass with a section cursor. Header detection runs before bullet
//! detection on every line, and nothing is collected until a header has been seen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStructure {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Strengths,
    Weaknesses,
    Recommendations,
}

const BULLET_MARKERS: &[char] = &['-', '•', '*'];

/// Returns the section a line opens, if it is a header.
fn detect_header(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    let has_colon = line.contains(':');

    if (lower.contains("strength") && has_colon) || lower.contains("**strength") {
        Some(Section::Strengths)
    } else if (lower.contains("weakness") && has_colon)
        || lower.contains("**weakness")
        || lower.contains("areas for improvement")
    {
        Some(Section::Weaknesses)
    } else if (lower.contains("recommendation") && has_colon) || lower.contains("**recommendation")
    {
        Some(Section::Recommendations)
    } else {
        None
    }
}

/// Strips a `-`, `•`, `*` or `N.` (N in 1..=9) marker. `None` if the line is not a list item.
fn strip_bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(BULLET_MARKERS) {
        return Some(rest.trim());
    }

    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(digit @ '1'..='9'), Some('.')) => Some(line[digit.len_utf8() + 1..].trim()),
        _ => None,
    }
}

/// Parses a completed analysis into its three ordered lists. Never fails.
pub fn parse(analysis_text: &str) -> AnalysisStructure {
    let mut structure = AnalysisStructure::default();
    let mut current: Option<Section> = None;

    for line in analysis_text.lines().map(str::trim) {
        if let Some(section) = detect_header(line) {
            current = Some(section);
            continue;
        }

        let Some(item) = strip_bullet(line) else {
            continue;
        };
        if item.is_empty() {
            continue;
        }

        let target = match current {
            Some(Section::Strengths) => &mut structure.strengths,
            Some(Section::Weaknesses) => &mut structure.weaknesses,
            Some(Section::Recommendations) => &mut structure.recommendations,
            None => continue,
        };
        target.push(item.to_string());
    }

    structure
}
