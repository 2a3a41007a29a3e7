// Prompt template for product page analysis and its single-pass renderer.

use std::borrow::Cow;

/// Content beyond this many characters is cut before substitution.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 1000;

/// Appended to content that was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Analysis prompt template. `{url}` and `{content}` are substituted by `render_analysis_prompt`.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze this product page for UI/UX conversion optimization. Provide only the final analysis without reasoning.

URL: {url}
Content: {content}

Format your response exactly as shown:

Strengths:
- [strength 1]
- [strength 2]
- [strength 3]

Weaknesses:
- [weakness 1]
- [weakness 2]
- [weakness 3]

Recommendations:
- [recommendation 1]
- [recommendation 2]
- [recommendation 3]

Focus on conversion optimization and user experience. Be specific and actionable."#;

/// Keeps the first `MAX_PROMPT_CONTENT_CHARS` characters and marks the cut.
pub fn truncate_content(content: &str) -> Cow<'_, str> {
    match content.char_indices().nth(MAX_PROMPT_CONTENT_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}

/// Fills the template in one pass, so placeholder-looking text inside `url` or
/// `content` is never substituted again.
pub fn render_analysis_prompt(url: &str, content: &str) -> String {
    let content = truncate_content(content);
    let mut rendered =
        String::with_capacity(ANALYSIS_PROMPT_TEMPLATE.len() + url.len() + content.len());
    let mut rest = ANALYSIS_PROMPT_TEMPLATE;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{url}") {
            rendered.push_str(url);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{content}") {
            rendered.push_str(&content);
            rest = after;
        } else {
            rendered.push('{');
            rest = &tail[1..];
        }
    }
    rendered.push_str(rest);
    rendered
}
