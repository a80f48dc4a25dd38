//! Content cleaning
//!
//! HTML is reduced to Markdown. Structured and already-clean formats pass
//! through unchanged.

use crate::convert::html_to_markdown;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker appended when cleaned content was cut
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

/// Block-level tags that mark a body as HTML even without a doctype
const HTML_MARKERS: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "<div",
    "<p>",
    "<article",
    "<section",
    "<main",
    "<table",
];

/// Detected kind of scraped content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Json,
    Xml,
    Markdown,
    Text,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Json => "json",
            ContentKind::Xml => "xml",
            ContentKind::Markdown => "markdown",
            ContentKind::Text => "text",
        }
    }

    /// MIME type used when saving content of this kind
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentKind::Html => "text/html",
            ContentKind::Json => "application/json",
            ContentKind::Xml => "application/xml",
            ContentKind::Markdown => "text/markdown",
            ContentKind::Text => "text/plain",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess what a scraped body is
///
/// XML is checked before HTML so that XHTML with a prolog still counts as
/// XML. The URL only matters for Markdown, which has no reliable body
/// signature.
pub fn detect_content_type(content: &str, url: &str) -> ContentKind {
    let trimmed = content.trim_start();
    let head: String = trimmed.chars().take(1024).collect::<String>().to_ascii_lowercase();

    if head.starts_with("<?xml") {
        return ContentKind::Xml;
    }
    if HTML_MARKERS.iter().any(|m| head.contains(m)) {
        return ContentKind::Html;
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return ContentKind::Json;
    }

    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    if path.ends_with(".md") || path.ends_with(".markdown") {
        return ContentKind::Markdown;
    }
    ContentKind::Text
}

/// Clean scraped content for LLM consumption
///
/// With `max_length` set, output longer than that many characters is cut and
/// gets [`TRUNCATION_MARKER`] appended.
pub fn clean_content(content: &str, url: &str, max_length: Option<usize>) -> String {
    let cleaned = match detect_content_type(content, url) {
        ContentKind::Html => html_to_markdown(content),
        _ => content.to_string(),
    };
    match max_length {
        Some(max) => truncate(cleaned, max),
        None => cleaned,
    }
}

fn truncate(content: String, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut cut = content[..byte_idx].to_string();
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        None => content,
    }
}
