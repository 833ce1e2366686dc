// src/scoring.rs

use serde::Serialize;

use crate::models::{
    question::{Question, QuestionStatus},
    test_config::NegativeMarking,
};

/// Result of scoring a finished question set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub incorrect: usize,
    pub attempted: usize,
    pub total: usize,
    /// Never negative. Zero for an empty question set.
    pub percentage: f64,
}

/// Scores a question set, applying negative marking when enabled.
///
/// Only `attempted` questions count towards correct/incorrect; skipped and
/// unvisited ones simply earn nothing.
pub fn score(questions: &[Question], negative_marking: &NegativeMarking) -> ScoreSummary {
    let mut correct = 0;
    let mut incorrect = 0;

    for question in questions
        .iter()
        .filter(|q| q.status == QuestionStatus::Attempted)
    {
        if question.is_answered_correctly() {
            correct += 1;
        } else {
            incorrect += 1;
        }
    }

    let total = questions.len();
    let percentage = if total == 0 {
        0.0
    } else {
        let marks = if negative_marking.enabled {
            correct as f64 - incorrect as f64 * negative_marking.marks_per_question
        } else {
            correct as f64
        };
        (100.0 * marks / total as f64).max(0.0)
    };

    ScoreSummary {
        correct,
        incorrect,
        attempted: correct + incorrect,
        total,
        percentage,
    }
}
