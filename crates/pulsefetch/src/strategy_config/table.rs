//! Markdown table format for the persisted strategy config
//!
//! The file is meant to be read and edited by humans, so parsing is lenient:
//! prose around the table is ignored, columns are located by header name,
//! and rows with an unknown strategy are skipped.

use super::StrategyConfigEntry;
use crate::error::StoreError;
use crate::strategy::ScrapingStrategy;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Built-in config written on first use
pub const DEFAULT_CONFIG: &str = "# Scraping Strategy Configuration

Learned mapping from URL pattern to the scraping strategy that last succeeded.
Rows are added and updated automatically. Edit the strategy column to pin a
pattern to a backend: native, enhanced-api or anti-bot-proxy.

| URL Pattern | Strategy | Last Updated | Success Count | Failure Count |
|-------------|----------|--------------|---------------|---------------|
";

const HEADER: &str = "| URL Pattern | Strategy | Last Updated | Success Count | Failure Count |
|-------------|----------|--------------|---------------|---------------|
";

#[derive(Debug, Default)]
struct Columns {
    pattern: Option<usize>,
    strategy: Option<usize>,
    last_updated: Option<usize>,
    success_count: Option<usize>,
    failure_count: Option<usize>,
}

impl Columns {
    fn from_header(cells: &[String]) -> Self {
        let mut columns = Columns::default();
        for (idx, cell) in cells.iter().enumerate() {
            let name = cell.to_lowercase().replace(['_', '-'], " ");
            match name.as_str() {
                "url pattern" | "pattern" | "prefix" => columns.pattern = Some(idx),
                "strategy" | "default strategy" => columns.strategy = Some(idx),
                "last updated" => columns.last_updated = Some(idx),
                "success count" | "successes" => columns.success_count = Some(idx),
                "failure count" | "failures" => columns.failure_count = Some(idx),
                _ => {}
            }
        }
        columns
    }
}

/// Parse every table row into entries
pub fn parse_markdown_table(text: &str) -> Result<Vec<StrategyConfigEntry>, StoreError> {
    let mut columns: Option<Columns> = None;
    let mut entries = Vec::new();

    for line in text.lines().map(str::trim) {
        if !line.starts_with('|') {
            continue;
        }
        if is_separator_row(line) {
            continue;
        }
        let cells = split_row(line);

        let Some(cols) = &columns else {
            let cols = Columns::from_header(&cells);
            if cols.pattern.is_none() || cols.strategy.is_none() {
                return Err(StoreError::Format(
                    "strategy table header must contain URL Pattern and Strategy columns"
                        .to_string(),
                ));
            }
            columns = Some(cols);
            continue;
        };

        if let Some(entry) = parse_row(cols, &cells) {
            entries.push(entry);
        }
    }

    Ok(entries)
}

fn parse_row(cols: &Columns, cells: &[String]) -> Option<StrategyConfigEntry> {
    let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).map(String::as_str);

    let pattern = cell(cols.pattern).filter(|p| !p.is_empty())?;
    let strategy_text = cell(cols.strategy).unwrap_or_default();
    let strategy: ScrapingStrategy = match strategy_text.parse() {
        Ok(strategy) => strategy,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Skipping strategy config row");
            return None;
        }
    };

    let last_updated = cell(cols.last_updated)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();
    let count = |idx| cell(idx).and_then(|s| s.parse().ok()).unwrap_or(0);

    Some(StrategyConfigEntry {
        url_pattern: pattern.to_string(),
        strategy,
        last_updated,
        success_count: count(cols.success_count),
        failure_count: count(cols.failure_count),
    })
}

fn is_separator_row(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Split a row on unescaped pipes, unescaping `\|` and `\\` in cells
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = line.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('|' | '\\')) => cell.push(next),
                Some(other) => {
                    cell.push('\\');
                    cell.push(other);
                }
                None => cell.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);

    if cells.first().is_some_and(|c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn escape_cell(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

/// Render the full config document
pub fn generate_markdown_table(entries: &[StrategyConfigEntry]) -> String {
    let preamble = DEFAULT_CONFIG
        .split("| URL Pattern")
        .next()
        .unwrap_or_default();

    let mut out = String::from(preamble);
    out.push_str(HEADER);
    for entry in entries {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&entry.url_pattern),
            entry.strategy,
            entry.last_updated.to_rfc3339(),
            entry.success_count,
            entry.failure_count
        ));
    }
    out
}
