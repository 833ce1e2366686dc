// src/session/error.rs

use std::fmt;

use crate::{models::question::AnswerError, session::phase::Phase};

/// Rejections raised by the workspace state machine.
///
/// None of them is fatal: every error leaves the workspace in a navigable phase.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The event is not accepted in the current phase.
    InvalidTransition { phase: Phase, event: &'static str },

    /// A phase was reached without its prerequisite state.
    Configuration(String),

    /// Question generation failed; the workspace is back in `Setup`.
    Generation(String),

    QuestionOutOfRange { index: usize, len: usize },

    Answer(AnswerError),

    /// A history entry or saved test id is unknown.
    NotFound(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTransition { phase, event } => {
                write!(f, "cannot {} while in the {} phase", event, phase)
            }
            SessionError::Configuration(msg) => f.write_str(msg),
            SessionError::Generation(msg) => f.write_str(msg),
            SessionError::QuestionOutOfRange { index, len } => {
                write!(f, "question {} does not exist (test has {})", index, len)
            }
            SessionError::Answer(err) => write!(f, "{}", err),
            SessionError::NotFound(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<AnswerError> for SessionError {
    fn from(err: AnswerError) -> Self {
        SessionError::Answer(err)
    }
}
