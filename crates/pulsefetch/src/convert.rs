//! HTML to Markdown and plain-text conversion
//!
//! A single-pass tag scanner, not a DOM parser. It tolerates broken markup
//! by ignoring what it does not understand.

use std::iter::Peekable;
use std::str::Chars;

/// Elements whose contents never reach the output
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "head", "template", "nav", "aside", "form",
];

/// Elements that end a line in plain-text output
const TEXT_BREAK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "section", "article",
];

/// One scanned tag
struct Tag {
    raw: String,
    name: String,
    closing: bool,
    self_closing: bool,
}

impl Tag {
    fn read(chars: &mut Peekable<Chars<'_>>) -> Self {
        let mut raw = String::new();
        for next in chars.by_ref() {
            if next == '>' {
                break;
            }
            raw.push(next);
        }

        let closing = raw.starts_with('/');
        let self_closing = raw.ends_with('/');
        let name = raw
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        Self {
            raw,
            name,
            closing,
            self_closing,
        }
    }

    fn attribute(&self, attr: &str) -> Option<String> {
        extract_attribute(&self.raw, attr)
    }
}

/// Tracks nesting of skipped elements
#[derive(Default)]
struct SkipStack(Vec<String>);

impl SkipStack {
    /// Consume the tag if it opens or closes a skipped element
    fn handle(&mut self, tag: &Tag) -> bool {
        if !SKIPPED_ELEMENTS.contains(&tag.name.as_str()) {
            return false;
        }
        if tag.closing {
            if let Some(pos) = self.0.iter().rposition(|t| *t == tag.name) {
                self.0.truncate(pos);
            }
        } else if !tag.self_closing {
            self.0.push(tag.name.clone());
        }
        true
    }

    fn active(&self) -> bool {
        !self.0.is_empty()
    }
}

/// Convert HTML to Markdown
pub fn html_to_markdown(html: &str) -> String {
    let mut out = String::new();
    let mut skip = SkipStack::default();
    let mut list_depth: usize = 0;
    let mut in_pre = false;
    let mut in_blockquote = false;
    let mut open_links: Vec<Option<String>> = Vec::new();

    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '<' {
            if skip.active() {
                continue;
            }
            let decoded = decode_entity(c, &mut chars);
            if in_blockquote && decoded == '\n' {
                out.push_str("\n> ");
            } else {
                out.push(decoded);
            }
            continue;
        }

        let tag = Tag::read(&mut chars);
        if skip.handle(&tag) || skip.active() {
            continue;
        }

        match tag.name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if tag.closing {
                    out.push_str("\n\n");
                } else {
                    let level = tag.name[1..].parse::<usize>().unwrap_or(1);
                    out.push('\n');
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                }
            }
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "table" => {
                if tag.closing {
                    out.push_str("\n\n");
                }
            }
            "tr" => {
                if tag.closing {
                    out.push('\n');
                }
            }
            "td" | "th" => {
                if tag.closing {
                    out.push_str(" | ");
                }
            }
            "br" => out.push('\n'),
            "hr" => out.push_str("\n---\n"),
            "ul" | "ol" => {
                if tag.closing {
                    list_depth = list_depth.saturating_sub(1);
                    if list_depth == 0 {
                        out.push('\n');
                    }
                } else {
                    list_depth += 1;
                }
            }
            "li" if !tag.closing => {
                out.push('\n');
                out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                out.push_str("- ");
            }
            "strong" | "b" => out.push_str("**"),
            "em" | "i" => out.push('*'),
            "pre" => {
                out.push_str("\n```\n");
                in_pre = !tag.closing;
            }
            "code" if !in_pre => out.push('`'),
            "blockquote" => {
                if tag.closing {
                    in_blockquote = false;
                    out.push('\n');
                } else {
                    in_blockquote = true;
                    out.push_str("\n> ");
                }
            }
            "a" => {
                if tag.closing {
                    if let Some(Some(href)) = open_links.pop() {
                        out.push_str(&format!("]({})", href));
                    }
                } else if !tag.self_closing {
                    let href = tag.attribute("href").filter(|h| !h.starts_with("javascript:"));
                    if href.is_some() {
                        out.push('[');
                    }
                    open_links.push(href);
                }
            }
            "img" => {
                if let Some(src) = tag.attribute("src") {
                    let alt = tag.attribute("alt").unwrap_or_default();
                    out.push_str(&format!("![{}]({})", alt, src));
                }
            }
            _ => {}
        }
    }

    clean_whitespace(&out)
}

/// Convert HTML to plain text
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut skip = SkipStack::default();

    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '<' {
            if !skip.active() {
                out.push(decode_entity(c, &mut chars));
            }
            continue;
        }

        let tag = Tag::read(&mut chars);
        if skip.handle(&tag) || skip.active() {
            continue;
        }

        let name = tag.name.as_str();
        if TEXT_BREAK_ELEMENTS.contains(&name)
            && (tag.closing || name == "br" || name == "p" || name.starts_with('h'))
        {
            out.push('\n');
        }
    }

    clean_whitespace(&out)
}

fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!("{}=", attr);
    let lower = tag.to_ascii_lowercase();
    let start = lower.find(&pattern)?;
    let rest = tag[start + pattern.len()..].trim_start();

    for quote in ['"', '\''] {
        if let Some(inner) = rest.strip_prefix(quote) {
            return inner.find(quote).map(|end| inner[..end].to_string());
        }
    }
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '>')
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Decode an entity starting at `&`
///
/// Unknown or malformed entities decode to a bare `&`.
fn decode_entity(c: char, chars: &mut Peekable<Chars<'_>>) -> char {
    if c != '&' {
        return c;
    }

    let mut lookahead = chars.clone();
    let mut entity = String::new();
    let mut terminated = false;
    for next in lookahead.by_ref() {
        if next == ';' {
            terminated = true;
            break;
        }
        if next.is_whitespace() || entity.len() > 10 {
            break;
        }
        entity.push(next);
    }
    if !terminated {
        return '&';
    }

    let decoded = match entity.as_str() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "copy" => Some('\u{a9}'),
        "reg" => Some('\u{ae}'),
        _ => entity
            .strip_prefix('#')
            .and_then(|num| match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse().ok(),
            })
            .and_then(char::from_u32),
    };
    match decoded {
        Some(ch) => {
            *chars = lookahead;
            ch
        }
        None => '&',
    }
}

/// Collapse whitespace runs, keep at most one blank line, trim
pub fn clean_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_space = false;
    let mut newlines = 0;

    for c in s.chars() {
        if c == '\n' {
            if result.ends_with(' ') {
                result.pop();
            }
            newlines += 1;
            last_was_space = true;
            if newlines <= 2 {
                result.push('\n');
            }
        } else if c.is_whitespace() {
            newlines = 0;
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            newlines = 0;
            last_was_space = false;
            result.push(c);
        }
    }

    result.trim().to_string()
}
