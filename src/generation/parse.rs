// src/generation/parse.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    generation::GenerationError,
    models::question::{GeneratedQuestion, Question},
};

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").expect("valid fence regex"));

/// A closing bracket directly followed by a quote, missing its comma.
static MISSING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\]\s*""#).expect("valid comma regex"));

/// Strips an optional Markdown code fence and patches the `]"` glitch models
/// sometimes produce between an array and the next key.
pub fn clean_json_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    let body = FENCE
        .captures(trimmed)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed);
    MISSING_COMMA.replace_all(body, r#"], ""#).into_owned()
}

/// Turns a model reply into fresh questions with ids `q-<millis>-<index>`.
///
/// Malformed entries are dropped with a warning; a reply that is not a JSON
/// array, or that leaves no usable question, is an error.
pub fn questions_from_reply(
    reply: &str,
    target_language: &str,
) -> Result<Vec<Question>, GenerationError> {
    let cleaned = clean_json_reply(reply);
    let payload: Vec<GeneratedQuestion> = serde_json::from_str(&cleaned).map_err(|e| {
        tracing::error!("Failed to parse JSON response: {}. Raw text: {}", e, reply);
        GenerationError::InvalidResponse(
            "AI did not return valid question data. The response was not a JSON array."
                .to_string(),
        )
    })?;

    let millis = chrono::Utc::now().timestamp_millis();
    let questions: Vec<Question> = payload
        .into_iter()
        .enumerate()
        .filter_map(|(index, generated)| {
            generated
                .into_question(format!("q-{}-{}", millis, index))
                .map_err(|e| tracing::warn!("Dropping generated question {}: {}", index, e))
                .ok()
        })
        .collect();

    if questions.is_empty() {
        return Err(GenerationError::NoQuestions(format!(
            "AI returned an empty list of questions. This might be because no questions were \
             identifiable, no content matched the selected language ({}), or the combination of \
             topic/syllabus and difficulty yielded no results.",
            target_language
        )));
    }

    Ok(questions)
}
