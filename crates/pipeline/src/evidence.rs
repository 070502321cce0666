//! Evidence passages retrieved per theme, and the text blocks built from
//! them for prompts.

use std::collections::HashMap;

use indexmap::IndexMap;
use litessay_core::collaborators::VectorMatch;
use litessay_core::segment::Segment;
use serde::{Deserialize, Serialize};

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub segment_id: String,
    pub score: f32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    pub paragraph_index: u32,
}

impl EvidenceItem {
    /// Build an item from a vector match. Matches stored without metadata
    /// are filled in from the segment with the same id, if any.
    pub fn from_match(m: VectorMatch, segments_by_id: &HashMap<&str, &Segment>) -> Self {
        match m.metadata {
            Some(md) => Self {
                segment_id: m.id,
                score: m.score,
                text: md.text,
                chapter: md.chapter,
                paragraph_index: md.paragraph_index,
            },
            None => {
                let segment = segments_by_id.get(m.id.as_str());
                Self {
                    text: segment.map(|s| s.text.clone()).unwrap_or_default(),
                    chapter: segment.and_then(|s| s.chapter.clone()),
                    paragraph_index: segment.map(|s| s.paragraph_index).unwrap_or_default(),
                    segment_id: m.id,
                    score: m.score,
                }
            }
        }
    }
}

/// An evidence item with its neighbouring text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedEvidence {
    #[serde(flatten)]
    pub item: EvidenceItem,
    pub context_before: String,
    pub context_after: String,
}

/// Theme → ranked evidence, in theme order.
pub type EvidenceMap = IndexMap<String, Vec<EvidenceItem>>;

/// Theme → evidence with surrounding context, in theme order.
pub type ExpandedEvidenceMap = IndexMap<String, Vec<ExpandedEvidence>>;

/// Attach up to `window` neighbouring segments on each side of every match.
///
/// Neighbours are taken from the ordered segment list and truncated at its
/// bounds. A match whose segment id is unknown gets empty context.
pub fn expand_context(
    evidence: &EvidenceMap,
    segments: &[Segment],
    window: usize,
) -> ExpandedEvidenceMap {
    let position: HashMap<&str, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| (s.segment_id.as_str(), i))
        .collect();

    let join = |slice: &[Segment]| {
        slice
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };

    evidence
        .iter()
        .map(|(theme, items)| {
            let expanded = items
                .iter()
                .map(|item| {
                    let (context_before, context_after) =
                        match position.get(item.segment_id.as_str()) {
                            Some(&idx) => {
                                let start = idx.saturating_sub(window);
                                let end = (idx + 1 + window).min(segments.len());
                                (join(&segments[start..idx]), join(&segments[idx + 1..end]))
                            }
                            None => (String::new(), String::new()),
                        };
                    ExpandedEvidence {
                        item: item.clone(),
                        context_before,
                        context_after,
                    }
                })
                .collect();
            (theme.clone(), expanded)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Prompt blocks
// ---------------------------------------------------------------------------

pub fn evidence_block(themes: &[String], evidence: &EvidenceMap) -> String {
    let mut lines = Vec::new();
    for theme in themes {
        lines.push(format!("Theme: {theme}"));
        for item in evidence.get(theme).into_iter().flatten() {
            lines.push(format!("- [{}] {}", item.segment_id, item.text));
        }
    }
    lines.join("\n")
}

pub fn expanded_evidence_block(themes: &[String], expanded: &ExpandedEvidenceMap) -> String {
    let mut lines = Vec::new();
    for theme in themes {
        lines.push(format!("Theme: {theme}"));
        for entry in expanded.get(theme).into_iter().flatten() {
            if !entry.context_before.is_empty() {
                lines.push(format!("  [context] {}", entry.context_before));
            }
            lines.push(format!("  [{}] {}", entry.item.segment_id, entry.item.text));
            if !entry.context_after.is_empty() {
                lines.push(format!("  [context] {}", entry.context_after));
            }
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

/// The top `limit` snippets for one theme, as a bullet list.
pub fn snippet_block(items: &[EvidenceItem], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .map(|item| format!("- [{}] {}", item.segment_id, item.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn theme_intros_block(themes: &[String], intros: &IndexMap<String, String>) -> String {
    let mut lines = Vec::new();
    for theme in themes {
        let Some(intro) = intros.get(theme).filter(|i| !i.is_empty()) else {
            continue;
        };
        lines.push(format!("## Theme: {theme}"));
        lines.push(format!("Introduction:\n{intro}"));
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use litessay_core::segment::segment_text;

    use super::*;

    fn item(segment_id: &str) -> EvidenceItem {
        EvidenceItem {
            segment_id: segment_id.into(),
            score: 0.9,
            text: format!("text of {segment_id}"),
            chapter: None,
            paragraph_index: 0,
        }
    }

    fn five_segments() -> Vec<Segment> {
        segment_text("one\n\ntwo\n\nthree\n\nfour\n\nfive", 2000)
    }

    #[test]
    fn context_is_truncated_at_list_start() {
        let segments = five_segments();
        let mut evidence = EvidenceMap::new();
        evidence.insert("fate".into(), vec![item("p00000")]);

        let expanded = expand_context(&evidence, &segments, 3);
        let entry = &expanded["fate"][0];
        assert_eq!(entry.context_before, "");
        assert_eq!(entry.context_after, "two three four");
    }

    #[test]
    fn context_is_truncated_at_list_end() {
        let segments = five_segments();
        let mut evidence = EvidenceMap::new();
        evidence.insert("fate".into(), vec![item("p00003")]);

        let expanded = expand_context(&evidence, &segments, 2);
        let entry = &expanded["fate"][0];
        assert_eq!(entry.context_before, "two three");
        assert_eq!(entry.context_after, "five");
    }

    #[test]
    fn unknown_segment_gets_empty_context() {
        let segments = five_segments();
        let mut evidence = EvidenceMap::new();
        evidence.insert("fate".into(), vec![item("p99999")]);

        let expanded = expand_context(&evidence, &segments, 3);
        assert_eq!(expanded["fate"][0].context_before, "");
        assert_eq!(expanded["fate"][0].context_after, "");
    }

    #[test]
    fn zero_window_adds_no_context() {
        let segments = five_segments();
        let mut evidence = EvidenceMap::new();
        evidence.insert("fate".into(), vec![item("p00003")]);

        let expanded = expand_context(&evidence, &segments, 0);
        assert_eq!(expanded["fate"][0].context_before, "");
        assert_eq!(expanded["fate"][0].context_after, "");
    }

    #[test]
    fn theme_order_is_preserved() {
        let mut evidence = EvidenceMap::new();
        evidence.insert("zeal".into(), vec![]);
        evidence.insert("ambition".into(), vec![]);
        let expanded = expand_context(&evidence, &[], 3);
        let themes: Vec<_> = expanded.keys().cloned().collect();
        assert_eq!(themes, ["zeal", "ambition"]);
    }

    #[test]
    fn match_without_metadata_is_filled_from_segments() {
        let segments = five_segments();
        let by_id: HashMap<&str, &Segment> =
            segments.iter().map(|s| (s.segment_id.as_str(), s)).collect();
        let m = VectorMatch {
            id: "p00001".into(),
            score: 0.4,
            metadata: None,
        };
        let item = EvidenceItem::from_match(m, &by_id);
        assert_eq!(item.text, "two");
        assert_eq!(item.paragraph_index, 1);
    }

    #[test]
    fn evidence_json_omits_absent_chapter() {
        let value = serde_json::to_value(item("p00001")).unwrap();
        assert!(value.get("chapter").is_none());
        assert_eq!(value["segment_id"], "p00001");
    }

    #[test]
    fn intros_block_skips_empty_intros() {
        let themes = vec!["fate".to_string(), "love".to_string()];
        let mut intros = IndexMap::new();
        intros.insert("fate".to_string(), "Fate looms.".to_string());
        intros.insert("love".to_string(), String::new());
        let block = theme_intros_block(&themes, &intros);
        assert!(block.contains("## Theme: fate"));
        assert!(!block.contains("## Theme: love"));
    }
}
