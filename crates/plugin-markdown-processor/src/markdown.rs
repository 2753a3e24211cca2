//! Markdown extraction routines.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*#*[ \t]*$").expect("valid heading regex"))
}

fn inline_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)[^)]*\)").expect("valid inline link regex"))
}

fn reference_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\[([^\]]+)\]:[ \t]+(\S+)").expect("valid reference link regex"))
}

fn bare_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]()]+"#).expect("valid url regex"))
}

fn fenced_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([\w+-]+)?[ \t]*\n(.*?)\n?```").expect("valid fence regex"))
}

fn front_matter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)").expect("valid front matter regex"))
}

/// One heading in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: usize,
    pub title: String,
    pub anchor: String,
}

/// One fenced code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
    pub lines: usize,
}

/// GitHub-style anchor: lowercase, punctuation dropped, spaces to dashes.
pub fn anchor_for(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

fn without_code(content: &str) -> String {
    fenced_code_regex().replace_all(content, "").into_owned()
}

/// Headings outside fenced code, in document order.
pub fn extract_toc(content: &str) -> Vec<TocEntry> {
    let prose = without_code(content);
    heading_regex()
        .captures_iter(&prose)
        .map(|caps| {
            let title = caps[2].trim().to_string();
            TocEntry {
                level: caps[1].len(),
                anchor: anchor_for(&title),
                title,
            }
        })
        .collect()
}

/// Inline, reference-style and bare links, de-duplicated and sorted.
pub fn extract_links(content: &str) -> Vec<String> {
    let mut links = BTreeSet::new();
    for caps in inline_link_regex().captures_iter(content) {
        links.insert(caps[2].to_string());
    }
    for caps in reference_link_regex().captures_iter(content) {
        links.insert(caps[2].to_string());
    }
    for m in bare_url_regex().find_iter(content) {
        links.insert(m.as_str().to_string());
    }
    links.into_iter().collect()
}

pub fn is_external(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}

pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    fenced_code_regex()
        .captures_iter(content)
        .map(|caps| {
            let code = caps.get(2).map_or("", |m| m.as_str()).to_string();
            CodeBlock {
                language: caps
                    .get(1)
                    .map_or_else(|| "plain".to_string(), |m| m.as_str().to_lowercase()),
                lines: code.lines().count(),
                code,
            }
        })
        .collect()
}

/// Splits leading YAML front matter from the body.
///
/// Returns `None` when there is no front matter block. A block that is
/// not a YAML mapping yields `Err` with the parse problem; the caller
/// decides whether to keep going.
pub fn split_front_matter(content: &str) -> Option<Result<(Value, &str), String>> {
    let caps = front_matter_regex().captures(content)?;
    let whole = caps.get(0)?;
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let body = &content[whole.end()..];

    let parsed = serde_yaml::from_str::<Value>(yaml)
        .map_err(|e| e.to_string())
        .and_then(|value| match value {
            Value::Object(_) => Ok((value, body)),
            Value::Null => Ok((Value::Object(Default::default()), body)),
            other => Err(format!("front matter is not a mapping: {other}")),
        });
    Some(parsed)
}

/// Estimated minutes to read the prose (code excluded), at least one.
pub fn reading_time_minutes(content: &str, words_per_minute: u32) -> u64 {
    let words = without_code(content).split_whitespace().count();
    let minutes = (words as f64 / f64::from(words_per_minute.max(1))).round() as u64;
    minutes.max(1)
}
