// src/models/history.rs

use serde::{Deserialize, Serialize};

use crate::models::{
    question::Question,
    test_config::{NegativeMarking, TestConfig},
};

/// A completed, scored test as stored in the `test_sessions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The session id of the attempt; stable across corrections.
    pub id: String,
    pub test_name: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub score_percentage: f64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub attempted_questions: i64,
    pub negative_marking: NegativeMarking,
    /// Configuration used for the attempt, kept for retakes.
    pub original_config: TestConfig,
    pub questions: Vec<Question>,
    /// The score reflects answers overridden by the user during review.
    pub was_corrected_by_user: bool,
}

impl HistoryEntry {
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            score_percentage: self.score_percentage,
            attempted_questions: self.attempted_questions,
        }
    }
}

/// Write request produced when a session is submitted or re-scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub test_name: String,
    pub score_percentage: f64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub attempted_questions: i64,
    pub questions: Vec<Question>,
    pub config: TestConfig,
    pub was_corrected_by_user: bool,
}

impl SessionRecord {
    pub fn into_entry(self, completed_at: chrono::DateTime<chrono::Utc>) -> HistoryEntry {
        HistoryEntry {
            id: self.session_id,
            test_name: self.test_name,
            completed_at,
            score_percentage: self.score_percentage,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            attempted_questions: self.attempted_questions,
            negative_marking: self.config.negative_marking,
            original_config: self.config,
            questions: self.questions,
            was_corrected_by_user: self.was_corrected_by_user,
        }
    }
}

/// The slice of a history entry the leaderboard needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub score_percentage: f64,
    pub attempted_questions: i64,
}

/// A paused test the user chose to "save and exit". Not scored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTest {
    pub id: String,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    /// `None` for untimed tests.
    pub time_remaining_seconds: Option<u32>,
    pub test_duration_seconds: Option<u32>,
    pub config: TestConfig,
    pub session_id: String,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

/// Transient mirror of an in-progress test, rewritten on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InProgressSnapshot {
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub time_remaining_seconds: Option<u32>,
    pub test_duration_seconds: Option<u32>,
    pub config: TestConfig,
    pub session_id: String,
}
