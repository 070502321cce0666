//! Source text normalization.
//!
//! Strips the Project Gutenberg licence boilerplate that wraps every ebook,
//! normalizes line endings and collapses runs of blank lines so that
//! paragraph splitting (and therefore segment ids and the content hash) is
//! stable.

use std::sync::LazyLock;

use regex::Regex;

static START_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*\* ?START OF (THIS|THE) PROJECT GUTENBERG EBOOK.*\*\*\*")
        .expect("valid start marker regex")
});

static END_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*\* ?END OF (THIS|THE) PROJECT GUTENBERG EBOOK.*\*\*\*")
        .expect("valid end marker regex")
});

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Normalize raw source text into its canonical form.
///
/// When both boilerplate markers are present only the text between them is
/// kept. A lone marker is left untouched.
pub fn normalize_source_text(raw: &str) -> String {
    let mut body = raw;
    if let (Some(start), Some(end)) = (START_MARKER.find(raw), END_MARKER.find(raw)) {
        if start.end() <= end.start() {
            body = &raw[start.end()..end.start()];
        }
    }

    let unix = body.replace("\r\n", "\n");
    let collapsed = EXCESS_BLANK_LINES.replace_all(&unix, "\n\n");
    collapsed.trim().to_string()
}
