//! Paragraph segmentation.
//!
//! A [`Segment`] is the unit of embedding, indexing and citation. Segment
//! ids are derived from the paragraph's structural position in the
//! normalized text, so re-segmenting the same text always yields the same
//! ids regardless of where (or how many times) ingestion ran before.

use serde::{Deserialize, Serialize};

/// Headings shorter than this that start with "CHAPTER" open a new chapter.
const MAX_HEADING_CHARS: usize = 80;

const CHAPTER_PREFIX: &str = "CHAPTER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable citation id, e.g. `p00042` or `p00042-1` for the second piece
    /// of an over-long paragraph.
    pub segment_id: String,
    pub text: String,
    /// The most recent chapter heading, if any.
    pub chapter: Option<String>,
    /// Position of the source paragraph within the text (0-based, headings
    /// included).
    pub paragraph_index: u32,
}

/// Split normalized text into segments of at most `max_chars` characters.
///
/// Paragraphs are separated by blank lines. Chapter headings update the
/// current chapter and are not emitted as segments. Paragraphs longer than
/// `max_chars` are cut into consecutive pieces on character boundaries.
pub fn segment_text(text: &str, max_chars: usize) -> Vec<Segment> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut chapter: Option<String> = None;

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for (position, para) in paragraphs.enumerate() {
        let position = position as u32;

        if is_chapter_heading(para) {
            chapter = Some(para.to_string());
            continue;
        }

        let pieces = split_long_paragraph(para, max_chars);
        let split = pieces.len() > 1;
        for (part, piece) in pieces.into_iter().enumerate() {
            let segment_id = if split {
                format!("p{position:05}-{part}")
            } else {
                format!("p{position:05}")
            };
            segments.push(Segment {
                segment_id,
                text: piece.to_string(),
                chapter: chapter.clone(),
                paragraph_index: position,
            });
        }
    }

    segments
}

fn is_chapter_heading(para: &str) -> bool {
    para.chars().count() < MAX_HEADING_CHARS && para.to_uppercase().starts_with(CHAPTER_PREFIX)
}

/// Cut `text` into pieces of at most `max_chars` characters each.
fn split_long_paragraph(text: &str, max_chars: usize) -> Vec<&str> {
    if text.chars().count() <= max_chars {
        return vec![text];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_chars {
            pieces.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
