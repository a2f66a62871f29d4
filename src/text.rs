// src/text.rs
//! Text cleanup shared by adapters and classifiers.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]*>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub const SNIPPET_MAX_CHARS: usize = 500;
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Decode entities, strip tags, fold typographic quotes, collapse whitespace.
pub fn clean_html(s: &str) -> String {
    // Decode first so that escaped markup (`&lt;b&gt;`) is stripped too.
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    // Google News double-escapes some entities (`&amp;nbsp;`).
    let decoded = html_escape::decode_html_entities(&stripped);

    let folded = decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    RE_WS.replace_all(&folded, " ").trim().to_string()
}

/// Cut to at most `max` chars on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Google News appends " - Publisher" to titles; drop it when it matches the source.
pub fn strip_publisher_suffix(title: &str, publisher: Option<&str>) -> String {
    if let Some(p) = publisher.map(str::trim).filter(|p| !p.is_empty()) {
        let suffix = format!(" - {p}");
        if let Some(head) = title.strip_suffix(&suffix) {
            return head.trim().to_string();
        }
    }
    title.to_string()
}

/// Lower-cased alphanumeric tokens.
pub fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
