//! Content-type aware body parsing for native fetches
//!
//! The first matching parser wins: PDF, then HTML, then a UTF-8
//! pass-through for everything else.

use serde_json::{Map, Value};

/// Content types whose bodies must be read as bytes rather than text
const BINARY_TYPES: &[&str] = &[
    "application/pdf",
    "image/",
    "video/",
    "audio/",
    "application/octet-stream",
    "application/zip",
    "application/gzip",
];

/// Content type assumed when the server sends none
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Parsed body with parser metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    /// Text content
    pub content: String,
    /// Always carries `originalType`
    pub metadata: Map<String, Value>,
}

/// Strip parameters (`; charset=...`) and lowercase
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Whether the body must be handled as binary
pub fn requires_binary_handling(content_type: &str) -> bool {
    let ct = essence(content_type);
    BINARY_TYPES.iter().any(|t| ct.contains(t))
}

/// Route a body to the parser for its content type
pub fn parse_content(body: &[u8], content_type: &str) -> Result<ParsedContent, String> {
    let ct = essence(content_type);

    if ct.contains("application/pdf") {
        return parse_pdf(body, &ct);
    }
    if ct.contains("text/html") || ct.contains("application/xhtml") {
        return Ok(parse_html(body, &ct));
    }
    Ok(parse_passthrough(body, &ct))
}

fn parse_pdf(body: &[u8], content_type: &str) -> Result<ParsedContent, String> {
    let text = pdf_extract::extract_text_from_mem(body)
        .map_err(|e| format!("Failed to parse PDF: {}", e))?;
    let content = pdf_text_to_markdown(&text);

    let mut metadata = original_type(content_type);
    metadata.insert("characters".to_string(), Value::from(content.chars().count()));
    Ok(ParsedContent { content, metadata })
}

fn parse_html(body: &[u8], content_type: &str) -> ParsedContent {
    // HTML is passed through untouched; cleaning happens downstream
    let content = String::from_utf8_lossy(body).into_owned();
    let mut metadata = original_type(content_type);
    if let Some(title) = extract_title(&content) {
        metadata.insert("title".to_string(), Value::String(title));
    }
    ParsedContent { content, metadata }
}

fn parse_passthrough(body: &[u8], content_type: &str) -> ParsedContent {
    ParsedContent {
        content: String::from_utf8_lossy(body).into_owned(),
        metadata: original_type(content_type),
    }
}

fn original_type(content_type: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "originalType".to_string(),
        Value::String(content_type.to_string()),
    );
    metadata
}

/// Join wrapped PDF lines into paragraphs separated by blank lines
fn pdf_text_to_markdown(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            if current.ends_with('-') {
                current.pop();
            } else {
                current.push(' ');
            }
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

/// Text of the first `<title>` element
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = html.get(start..end)?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_binary_handling() {
        assert!(requires_binary_handling("application/pdf"));
        assert!(requires_binary_handling("image/png"));
        assert!(requires_binary_handling("video/mp4"));
        assert!(requires_binary_handling("audio/mpeg"));
        assert!(requires_binary_handling("application/octet-stream"));
        assert!(requires_binary_handling("application/zip"));
        assert!(requires_binary_handling("APPLICATION/GZIP; foo=bar"));

        assert!(!requires_binary_handling("text/html; charset=utf-8"));
        assert!(!requires_binary_handling("application/json"));
        assert!(!requires_binary_handling("text/plain"));
    }

    #[test]
    fn test_parse_html_passes_through() {
        let html = b"<html><head><title> My\n Page </title></head><body><p>Hi</p></body></html>";
        let parsed = parse_content(html, "text/html; charset=utf-8").unwrap();
        assert_eq!(parsed.content, String::from_utf8_lossy(html));
        assert_eq!(parsed.metadata["originalType"], "text/html");
        assert_eq!(parsed.metadata["title"], "My Page");
    }

    #[test]
    fn test_parse_passthrough() {
        let parsed = parse_content(b"{\"a\":1}", "application/json").unwrap();
        assert_eq!(parsed.content, "{\"a\":1}");
        assert_eq!(parsed.metadata["originalType"], "application/json");
        assert!(parsed.metadata.get("title").is_none());
    }

    #[test]
    fn test_parse_invalid_pdf_fails() {
        let err = parse_content(b"not a pdf", "application/pdf").unwrap_err();
        assert!(err.starts_with("Failed to parse PDF"));
    }

    #[test]
    fn test_pdf_text_to_markdown() {
        let text = "First line of a para-\ngraph continues\n\n\nSecond paragraph\n";
        assert_eq!(
            pdf_text_to_markdown(text),
            "First line of a paragraph continues\n\nSecond paragraph"
        );
    }

    #[test]
    fn test_extract_title_missing() {
        assert_eq!(extract_title("<html><body>none</body></html>"), None);
        assert_eq!(extract_title("<title></title>"), None);
    }
}
