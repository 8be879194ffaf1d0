//! Outbound text shaping: chunking, previews, and HTML markup

use regex::Regex;
use std::sync::LazyLock;

/// Largest message the delivery channel accepts, in characters
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Characters of the analysis shown inline before the full text is requested
pub const PREVIEW_LENGTH: usize = 1000;

static BOLD_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("static regex"));

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^<>]*>").expect("static regex"));

/// Split text on line boundaries so that no chunk exceeds `limit` characters.
///
/// Joining the chunks with `'\n'` reproduces the input. A single line longer than
/// `limit` becomes a chunk of its own and is not split further.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut has_lines = false;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if has_lines && current_len + 1 + line_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
            has_lines = false;
        }
        if has_lines {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
        has_lines = true;
    }

    if has_lines {
        chunks.push(current);
    }

    chunks
}

/// Escape the characters the channel's HTML mode treats as markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Render `**bold**` pairs as HTML, escaping everything else
pub fn bold_markup_to_html(text: &str) -> String {
    let escaped = escape_html(text);
    BOLD_PAIR.replace_all(&escaped, "<b>$1</b>").into_owned()
}

/// Strip tags and decode entities, turning an HTML message into what the
/// reader would have seen rendered
pub fn html_to_plain(html: &str) -> String {
    HTML_TAG
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// First `limit` characters of the analysis as HTML, with "..." when cut
pub fn preview_html(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    let truncated = chars.next().is_some();

    let mut html = bold_markup_to_html(&head);
    if truncated {
        html.push_str("...");
    }
    html
}
