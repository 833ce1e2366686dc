// src/generation/chat.rs

use serde::Serialize;

use crate::{
    generation::prompts::{CHAT_ACKNOWLEDGEMENT, chat_priming},
    models::question::Question,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Follow-up conversation about one reviewed question.
///
/// The first exchange primes the model with the question and its explanation;
/// it is sent with every request but never shown to the user.
#[derive(Debug, Clone)]
pub struct FollowUpChat {
    pub question_id: String,
    priming: [ChatTurn; 2],
    turns: Vec<ChatTurn>,
}

impl FollowUpChat {
    pub fn new(question: &Question, explanation: Option<&str>) -> Self {
        Self {
            question_id: question.id.clone(),
            priming: [
                ChatTurn {
                    role: ChatRole::User,
                    text: chat_priming(question, explanation),
                },
                ChatTurn {
                    role: ChatRole::Model,
                    text: CHAT_ACKNOWLEDGEMENT.to_string(),
                },
            ],
            turns: Vec::new(),
        }
    }

    /// Visible conversation so far.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Everything the model must see: priming, then the visible turns.
    pub fn history(&self) -> impl Iterator<Item = &ChatTurn> {
        self.priming.iter().chain(self.turns.iter())
    }

    pub fn record_exchange(&mut self, message: &str, reply: &str) {
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            text: message.to_string(),
        });
        self.turns.push(ChatTurn {
            role: ChatRole::Model,
            text: reply.to_string(),
        });
    }
}
