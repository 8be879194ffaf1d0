//! Extraction of one participant's messages from a chat transcript
//!
//! Transcripts are line oriented. A message starts with a header line
//! `Name (timestamp): text`; the text may continue on following lines until a
//! blank line or the next header. Messages opening with a `[id123|…]` mention
//! are quoted or forwarded fragments and are skipped.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ANY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S.*? \([^()]+\):(\s|$)").expect("static regex"));

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[id\d+\|").expect("static regex"));

/// Decode an uploaded file, dropping invalid UTF-8 sequences and a leading BOM
pub fn decode_permissive(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Messages of `participant`, trimmed, deduplicated, in order of first occurrence.
///
/// Matching is case-sensitive and anchored at line starts. An empty result means
/// the participant wrote nothing extractable.
pub fn extract(raw: &str, participant: &str) -> Vec<String> {
    let mut messages = Vec::new();
    if participant.is_empty() {
        return messages;
    }

    let prefix = format!("{participant} (");
    let mut seen: HashSet<String> = HashSet::new();
    let mut lines = raw.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(first) = line
            .strip_prefix(prefix.as_str())
            .and_then(header_remainder)
        else {
            continue;
        };

        let mut body = first.trim().to_string();
        while let Some(next) = lines.peek() {
            if ANY_HEADER.is_match(next) {
                break;
            }
            if next.trim().is_empty() {
                if body.is_empty() {
                    lines.next();
                    continue;
                }
                break;
            }
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(next);
            lines.next();
        }

        let body = body.trim();
        if body.is_empty() || MENTION.is_match(body) {
            continue;
        }
        if seen.insert(body.to_string()) {
            messages.push(body.to_string());
        }
    }

    messages
}

/// Text after `timestamp):` in a header whose name prefix was already stripped
fn header_remainder(rest: &str) -> Option<&str> {
    let (timestamp, after) = rest.split_once(')')?;
    if timestamp.is_empty() || timestamp.contains('(') {
        return None;
    }
    after.strip_prefix(':')
}
