//! Text analysis helpers used when building a document from a file.

use serde::Serialize;

/// Simple counts over a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
}

impl TextStats {
    pub fn of(content: &str) -> Self {
        Self {
            lines: content.lines().count(),
            words: content.split_whitespace().count(),
            chars: content.chars().count(),
        }
    }
}

/// Format tag for an extension (without the dot).
pub fn format_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "md" | "markdown" => "markdown",
        "rst" => "rst",
        "log" => "log",
        _ => "text",
    }
}

/// Title from the first markdown/rst heading or, failing that, the first
/// non-empty line. Very long lines are not titles.
pub fn derive_title(content: &str) -> Option<String> {
    const MAX_TITLE_CHARS: usize = 120;

    let mut lines = content.lines().map(str::trim).peekable();
    let mut first_line = None;

    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return Some(heading.to_string());
            }
            continue;
        }
        // reStructuredText: a line underlined with = or -.
        if let Some(next) = lines.peek()
            && !next.is_empty()
            && next.chars().all(|c| c == '=' || c == '-')
            && next.len() >= line.len()
        {
            return Some(line.to_string());
        }
        if first_line.is_none() {
            first_line = Some(line);
        }
    }

    first_line
        .filter(|line| line.chars().count() <= MAX_TITLE_CHARS)
        .map(str::to_string)
}
