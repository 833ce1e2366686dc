// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::html::clean_html;

/// Where a question stands from the test taker's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    /// Never opened.
    #[default]
    Unvisited,
    Attempted,
    /// Opened (or cleared) without an answer.
    Skipped,
}

/// The answer side of a question.
///
/// A question is either multiple-choice or type-in-the-answer (TITA), never both,
/// so the two shapes live in one enum instead of a bag of optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKey {
    Choice {
        options: Vec<String>,
        correct_index: usize,
        #[serde(default)]
        chosen_index: Option<usize>,
    },
    Text {
        correct_text: String,
        #[serde(default)]
        chosen_text: String,
    },
}

/// A single test question with the test taker's answer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,

    /// Optional passage (may hold simple HTML) shown before the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_text: Option<String>,

    pub question_text: String,

    pub answer: AnswerKey,

    #[serde(default)]
    pub status: QuestionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(default)]
    pub is_marked_for_review: bool,

    /// Set when the user overrode the generated correct answer during review.
    #[serde(default)]
    pub was_corrected_by_user: bool,
}

/// Rejected answer mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerError {
    /// An option was chosen on a TITA question, or text typed into an MCQ.
    WrongKind,
    OptionOutOfRange { option: usize, available: usize },
}

impl fmt::Display for AnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerError::WrongKind => write!(f, "answer does not match the question type"),
            AnswerError::OptionOutOfRange { option, available } => write!(
                f,
                "option {} is out of range ({} options available)",
                option, available
            ),
        }
    }
}

impl std::error::Error for AnswerError {}

impl Question {
    pub fn is_choice(&self) -> bool {
        matches!(self.answer, AnswerKey::Choice { .. })
    }

    /// Records a multiple-choice answer and marks the question attempted.
    pub fn choose_option(&mut self, option: usize) -> Result<(), AnswerError> {
        match &mut self.answer {
            AnswerKey::Choice {
                options,
                chosen_index,
                ..
            } => {
                if option >= options.len() {
                    return Err(AnswerError::OptionOutOfRange {
                        option,
                        available: options.len(),
                    });
                }
                *chosen_index = Some(option);
            }
            AnswerKey::Text { .. } => return Err(AnswerError::WrongKind),
        }
        self.status = QuestionStatus::Attempted;
        Ok(())
    }

    /// Records a typed answer and marks the question attempted.
    pub fn enter_text(&mut self, text: &str) -> Result<(), AnswerError> {
        match &mut self.answer {
            AnswerKey::Text { chosen_text, .. } => *chosen_text = text.to_string(),
            AnswerKey::Choice { .. } => return Err(AnswerError::WrongKind),
        }
        self.status = QuestionStatus::Attempted;
        Ok(())
    }

    /// Drops the current answer. An attempted question falls back to skipped.
    pub fn clear_answer(&mut self) {
        match &mut self.answer {
            AnswerKey::Choice { chosen_index, .. } => *chosen_index = None,
            AnswerKey::Text { chosen_text, .. } => chosen_text.clear(),
        }
        if self.status == QuestionStatus::Attempted {
            self.status = QuestionStatus::Skipped;
        }
    }

    /// Exact match for MCQ, trimmed case-insensitive match for TITA.
    pub fn is_answered_correctly(&self) -> bool {
        match &self.answer {
            AnswerKey::Choice {
                correct_index,
                chosen_index,
                ..
            } => *chosen_index == Some(*correct_index),
            AnswerKey::Text {
                correct_text,
                chosen_text,
            } => chosen_text.trim().to_lowercase() == correct_text.trim().to_lowercase(),
        }
    }

    /// Returns the question to a fresh, unanswered state for a new attempt.
    pub fn reset_for_attempt(&mut self) {
        match &mut self.answer {
            AnswerKey::Choice { chosen_index, .. } => *chosen_index = None,
            AnswerKey::Text { chosen_text, .. } => chosen_text.clear(),
        }
        self.status = QuestionStatus::Unvisited;
        self.explanation = None;
        self.was_corrected_by_user = false;
        self.is_marked_for_review = false;
    }

    /// Overrides the correct option (answer disputes during review).
    pub fn correct_option(&mut self, option: usize) -> Result<(), AnswerError> {
        match &mut self.answer {
            AnswerKey::Choice {
                options,
                correct_index,
                ..
            } => {
                if option >= options.len() {
                    return Err(AnswerError::OptionOutOfRange {
                        option,
                        available: options.len(),
                    });
                }
                *correct_index = option;
            }
            AnswerKey::Text { .. } => return Err(AnswerError::WrongKind),
        }
        self.explanation = None;
        self.was_corrected_by_user = true;
        Ok(())
    }

    /// Overrides the correct text of a TITA question.
    pub fn correct_text(&mut self, text: &str) -> Result<(), AnswerError> {
        match &mut self.answer {
            AnswerKey::Text { correct_text, .. } => *correct_text = text.to_string(),
            AnswerKey::Choice { .. } => return Err(AnswerError::WrongKind),
        }
        self.explanation = None;
        self.was_corrected_by_user = true;
        Ok(())
    }

    pub fn to_public(&self) -> PublicQuestion {
        let (options, chosen_index, chosen_text) = match &self.answer {
            AnswerKey::Choice {
                options,
                chosen_index,
                ..
            } => (Some(options.clone()), *chosen_index, None),
            AnswerKey::Text { chosen_text, .. } => (None, None, Some(chosen_text.clone())),
        };

        PublicQuestion {
            id: self.id.clone(),
            passage_text: self.passage_text.clone(),
            question_text: self.question_text.clone(),
            options,
            chosen_index,
            chosen_text,
            status: self.status,
            is_marked_for_review: self.is_marked_for_review,
        }
    }
}

/// DTO for sending a question to a test taker mid-test (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage_text: Option<String>,
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_text: Option<String>,
    pub status: QuestionStatus,
    pub is_marked_for_review: bool,
}

/// One question as returned by the generation model, before validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    #[serde(default)]
    pub passage_text: Option<String>,
    pub question_text: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer_index: Option<usize>,
    #[serde(default)]
    pub correct_answer_text: Option<String>,
}

impl GeneratedQuestion {
    /// Validates the payload shape and converts it into a fresh question.
    pub fn into_question(self, id: String) -> Result<Question, String> {
        let options = self.options.filter(|o| !o.is_empty());

        let answer = match (options, self.correct_answer_index, self.correct_answer_text) {
            (Some(options), Some(correct_index), None) => {
                if correct_index >= options.len() {
                    return Err(format!(
                        "correct answer index {} is out of range for {} options",
                        correct_index,
                        options.len()
                    ));
                }
                AnswerKey::Choice {
                    options,
                    correct_index,
                    chosen_index: None,
                }
            }
            (None, None, Some(correct_text)) => AnswerKey::Text {
                correct_text,
                chosen_text: String::new(),
            },
            (Some(_), _, Some(_)) => {
                return Err("question carries both choice options and a typed answer".to_string());
            }
            _ => return Err("question has no usable answer key".to_string()),
        };

        Ok(Question {
            id,
            passage_text: self
                .passage_text
                .filter(|p| !p.trim().is_empty())
                .map(|p| clean_html(&p)),
            question_text: clean_html(&self.question_text),
            answer,
            status: QuestionStatus::Unvisited,
            explanation: None,
            is_marked_for_review: false,
            was_corrected_by_user: false,
        })
    }
}
