//! Light markup for the counselor response pane.
//!
//! The response is plain text with occasional `**bold**` runs and
//! `* Heading:` bullets. Paragraphs are split on blank lines, the text is
//! HTML-escaped, then those two markers are turned into tags.

use std::sync::LazyLock;

use regex::Regex;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static BULLET_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\* (.*?):").unwrap());

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format one paragraph's inline markup.
fn format_paragraph(paragraph: &str) -> String {
    let escaped = escape_html(paragraph);
    let bolded = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    BULLET_HEADING
        .replace_all(&bolded, "<br/><strong>$1:</strong>")
        .into_owned()
}

/// The response as a list of HTML paragraph bodies (without `<p>` tags).
pub fn format_paragraphs(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    PARAGRAPH_BREAK
        .split(text)
        .map(format_paragraph)
        .collect()
}

/// The response as one HTML fragment of `<p>` elements.
pub fn format_response_html(text: &str) -> String {
    format_paragraphs(text)
        .into_iter()
        .map(|p| format!("<p>{p}</p>"))
        .collect()
}
