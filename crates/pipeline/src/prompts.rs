//! Prompt templates and the requests built from them.

use litessay_core::collaborators::CompletionRequest;

/// Sampling temperatures per task.
pub const SUMMARIZE_TEMPERATURE: f32 = 0.2;
pub const THEMES_TEMPERATURE: f32 = 0.2;
pub const INTRO_TEMPERATURE: f32 = 0.3;
pub const DRAFT_TEMPERATURE: f32 = 0.3;
pub const REVIEW_TEMPERATURE: f32 = 0.1;
pub const REVISE_TEMPERATURE: f32 = 0.3;

pub const SUMMARIZE_CHUNK_SYSTEM: &str = "\
You are a literary summarizer. Produce clear, detailed summaries of book passages \
that capture key events, characters, themes, and narrative developments. \
Write only the summary for the new passage. Do not repeat or rewrite earlier summaries.";

pub const THEME_DISCOVERY_SYSTEM: &str = "You are a literary analyst.";

pub const THEME_INTRO_SYSTEM: &str =
    "You are a literary essayist writing contextual introductions for thematic analysis.";

pub const ESSAY_DRAFT_SYSTEM: &str = "\
You write clear, structured literary analysis essays. \
Use the provided evidence snippets and cite them in brackets like [segment_id]. \
Each theme section should begin with its provided thematic introduction, \
then proceed to close analysis of the evidence with citations.";

pub const REVIEW_SYSTEM: &str = "\
You are a literary essay reviewer. Evaluate the essay for:
1. Theme coverage: does it address all provided themes?
2. Citation accuracy: are [segment_id] citations present and used correctly?
3. Coherence: is the essay well-structured with clear transitions?
4. Depth: does it provide meaningful analysis beyond surface-level observations?";

pub const REVISE_SYSTEM: &str = "\
You are a literary essay writer revising your work based on reviewer feedback. \
Maintain [segment_id] citations. Improve the essay while keeping its core structure.";

/// Summarize one window of passages. `summary_so_far` is context only.
pub fn summarize_chunk(summary_so_far: &str, passage: &str) -> CompletionRequest {
    let so_far = if summary_so_far.is_empty() {
        "(none, this is the first chunk)"
    } else {
        summary_so_far
    };
    let user = format!(
        "Here is what has been summarized so far (for context only, do NOT repeat this):\n\n\
         {so_far}\n\n\
         Now write a summary of ONLY the following new passage. Cover the key events, \
         characters, dialogue, and developments. Do not restate anything from the summary above.\n\n\
         New passage:\n{passage}"
    );
    CompletionRequest::new(SUMMARIZE_CHUNK_SYSTEM, user, SUMMARIZE_TEMPERATURE)
}

pub fn theme_discovery(title: &str, author: &str, summary: &str) -> CompletionRequest {
    let user = format!(
        "Based on the following summary of \"{title}\" by {author}:\n\n\
         {summary}\n\n\
         List 4 to 6 major literary themes present in this book. \
         Respond as a JSON array of strings."
    );
    CompletionRequest::new(THEME_DISCOVERY_SYSTEM, user, THEMES_TEMPERATURE)
}

pub fn theme_intro(summary: &str, theme: &str, snippets: &str) -> CompletionRequest {
    let user = format!(
        "Book summary:\n{summary}\n\n\
         Theme: {theme}\n\n\
         Key evidence passages:\n{snippets}\n\n\
         Write a 2-3 paragraph introduction for this theme. Discuss the relevant characters, \
         scenes, and narrative context that make this theme significant in the work. \
         Do not use citations; this is contextual background only."
    );
    CompletionRequest::new(THEME_INTRO_SYSTEM, user, INTRO_TEMPERATURE)
}

pub fn essay_draft(
    title: &str,
    author: &str,
    summary: &str,
    intros_block: &str,
    evidence_block: &str,
) -> CompletionRequest {
    let user = format!(
        "Write a theme-by-theme essay on \"{title}\" by {author}.\n\n\
         Book Summary:\n{summary}\n\n\
         {intros_block}\n\n\
         Evidence (with surrounding context):\n{evidence_block}\n\n\
         Instructions:\n\
         - Start each theme section with the provided thematic introduction\n\
         - Follow each introduction with detailed analysis citing specific evidence using [segment_id]\n\
         - Include an overall introduction and conclusion\n\
         - Ensure every analytical claim references at least one [segment_id] citation"
    );
    CompletionRequest::new(ESSAY_DRAFT_SYSTEM, user, DRAFT_TEMPERATURE)
}

pub fn review(themes: &[String], essay: &str) -> CompletionRequest {
    let themes = themes.join(", ");
    let user = format!(
        "Review the following literary essay. The expected themes are: {themes}.\n\n\
         Essay:\n{essay}\n\n\
         Respond with a JSON object: {{\"approved\": true/false, \"feedback\": \"...\"}}\n\
         If approved is false, provide specific, actionable feedback for revision."
    );
    CompletionRequest::new(REVIEW_SYSTEM, user, REVIEW_TEMPERATURE)
}

pub fn revise(feedback: &str, essay: &str, evidence_block: &str) -> CompletionRequest {
    let user = format!(
        "Revise this essay based on the feedback below.\n\n\
         Feedback:\n{feedback}\n\n\
         Original essay:\n{essay}\n\n\
         Evidence (for reference):\n{evidence_block}"
    );
    CompletionRequest::new(REVISE_SYSTEM, user, REVISE_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_chunk_has_placeholder_context() {
        let request = summarize_chunk("", "It was a dark and stormy night.");
        assert!(request.user.contains("(none, this is the first chunk)"));
        assert!(request.user.ends_with("It was a dark and stormy night."));
        assert_eq!(request.system, SUMMARIZE_CHUNK_SYSTEM);
    }

    #[test]
    fn review_prompt_lists_themes_and_schema() {
        let request = review(&["fate".into(), "guilt".into()], "Essay body");
        assert!(request.user.contains("The expected themes are: fate, guilt."));
        assert!(request.user.contains(r#"{"approved": true/false, "feedback": "..."}"#));
        assert_eq!(request.temperature, REVIEW_TEMPERATURE);
    }
}
