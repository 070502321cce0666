//! Tolerant parsers for language-model output.
//!
//! Prompts ask for JSON, but models sometimes wrap it in a fenced code block
//! or answer in prose. Neither parser ever fails: each falls back to a
//! best-effort reading of the raw text.

use std::sync::LazyLock;

use litessay_core::config::MAX_THEMES;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("valid regex")
});

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]+|\d+[.)])\s*").expect("valid regex")
});

/// Parse JSON from the raw text, or from the first fenced code block in it.
fn parse_json_lenient(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Some(value);
    }
    let inner = FENCED_BLOCK_RE.captures(raw)?.get(1)?.as_str();
    serde_json::from_str(inner.trim()).ok()
}

// ---------------------------------------------------------------------------
// Themes
// ---------------------------------------------------------------------------

/// Extract up to [`MAX_THEMES`] theme strings, keeping the model's order.
///
/// Accepts a JSON array of strings (bare or fenced), or a `{"themes": [...]}`
/// object. Anything else is read line by line with bullet markers stripped.
pub fn parse_themes(raw: &str) -> Vec<String> {
    let from_json = parse_json_lenient(raw).and_then(|value| match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("themes") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    });

    let themes: Vec<String> = match from_json {
        Some(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|t| !t.is_empty())
            .collect(),
        None => {
            tracing::warn!("Theme list was not JSON, falling back to line parsing");
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with("```"))
                .map(|line| BULLET_RE.replace(line, "").trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        }
    };

    themes.into_iter().take(MAX_THEMES).collect()
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// How a review verdict was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewParse {
    Json,
    /// Neither bare nor fenced JSON; decided by keyword match.
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub feedback: String,
    pub parsed_by: ReviewParse,
}

/// Parse a `{"approved": bool, "feedback": "..."}` verdict.
///
/// Order: strict JSON, then JSON inside a fenced block, then a keyword
/// heuristic (approved iff the text mentions both "approved" and "true")
/// with the raw text as feedback. A JSON object whose `approved` flag is
/// missing or not a boolean is not approved; the heuristic only reads text
/// that is not a JSON object at all.
pub fn parse_review(raw: &str) -> ReviewVerdict {
    if let Some(Value::Object(map)) = parse_json_lenient(raw) {
        let approved = map.get("approved").and_then(as_flag);
        if approved.is_none() {
            tracing::warn!("Review JSON has no boolean approved flag, treating as not approved");
        }
        let feedback = match map.get("feedback") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        return ReviewVerdict {
            approved: approved.unwrap_or(false),
            feedback,
            parsed_by: ReviewParse::Json,
        };
    }

    let lower = raw.to_lowercase();
    let approved = lower.contains("approved") && lower.contains("true");
    tracing::warn!(approved, "Review was not valid JSON, using keyword heuristic");
    ReviewVerdict {
        approved,
        feedback: raw.to_string(),
        parsed_by: ReviewParse::Heuristic,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}
