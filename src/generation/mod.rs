// src/generation/mod.rs

//! Question generation, text extraction, explanations and follow-up chat
//! backed by a generative model.

pub mod chat;
pub mod gemini;
pub mod parse;
pub mod prompts;

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    question::Question,
    test_config::{InputMethod, Language, TestConfig},
};

pub use chat::FollowUpChat;
pub use gemini::GeminiClient;

/// Count asked for when the configuration leaves it open (topic/syllabus).
pub const DEFAULT_NUM_QUESTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// No API key configured.
    NoApiKey,

    /// The request never got a response.
    Transport(String),

    /// The model API answered with an error status.
    Api { status: u16, message: String },

    /// The reply could not be turned into questions.
    InvalidResponse(String),

    /// The reply was valid but held no questions.
    NoQuestions(String),

    /// An uploaded file could not be read by the model.
    UnreadableFile,
}

impl GenerationError {
    /// Rate-limit or overload failures; they move the client to its next key.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            GenerationError::Api { status, message } => {
                let message = message.to_lowercase();
                *status == 429
                    || *status == 503
                    || message.contains("overloaded")
                    || message.contains("rate limit")
            }
            GenerationError::Transport(message) => {
                let message = message.to_lowercase();
                message.contains("overloaded") || message.contains("rate limit")
            }
            _ => false,
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::NoApiKey => write!(
                f,
                "API key not set or empty. Configure one or more comma-separated keys."
            ),
            GenerationError::Transport(msg) => write!(f, "request failed: {}", msg),
            GenerationError::Api { status, message } => write!(f, "{} {}", status, message),
            GenerationError::InvalidResponse(msg) => f.write_str(msg),
            GenerationError::NoQuestions(msg) => f.write_str(msg),
            GenerationError::UnreadableFile => write!(
                f,
                "The uploaded file could not be processed. It might be corrupted or an unsupported format."
            ),
        }
    }
}

impl std::error::Error for GenerationError {}

/// What the generator needs to write a question set.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub input_method: InputMethod,
    /// Source text (already extracted for binary documents).
    pub content: String,
    /// `None` extracts everything from a document, or asks for the default count.
    pub num_questions: Option<u32>,
    pub language: Option<Language>,
    pub difficulty: Option<u8>,
    pub custom_instructions: Option<String>,
    pub tita_enabled: bool,
}

impl GenerationRequest {
    pub fn from_config(config: &TestConfig, content: String) -> Self {
        Self {
            input_method: config.input_method,
            content,
            num_questions: config.num_questions,
            language: config.language,
            difficulty: config.difficulty,
            custom_instructions: config.custom_instructions.clone(),
            tita_enabled: config.tita_enabled,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, GenerationError>;

    /// Reads the text out of a base64-encoded image or PDF.
    async fn extract_text(&self, data: &str, mime_type: &str) -> Result<String, GenerationError>;

    async fn explain(&self, question: &Question) -> Result<String, GenerationError>;

    /// Sends one user turn and returns the reply. The caller records both turns.
    async fn follow_up(&self, chat: &FollowUpChat, message: &str)
    -> Result<String, GenerationError>;
}

/// Runs generation for a configuration, extracting text from binary uploads
/// first. Errors carry the user-facing message.
pub async fn generate_for_config(
    generator: &dyn Generator,
    config: &TestConfig,
) -> Result<Vec<Question>, String> {
    let content = if config.needs_text_extraction() {
        let mime_type = config.mime_type.as_deref().unwrap_or_default();
        let text = generator
            .extract_text(&config.content, mime_type)
            .await
            .map_err(|e| match e {
                GenerationError::UnreadableFile => e.to_string(),
                e => format!("Failed to extract text: {}", e),
            })?;
        if text.trim().is_empty() {
            return Err("Could not extract any text from the uploaded file. \
                        Please try a different file or check its content."
                .to_string());
        }
        text
    } else {
        config.content.clone()
    };

    let request = GenerationRequest::from_config(config, content);
    let questions = generator
        .generate_questions(&request)
        .await
        .map_err(|e| format!("Failed to generate questions: {}", e))?;

    if questions.is_empty() {
        return Err("No questions were generated. Please check your input, selected \
                    language, difficulty, or try different settings."
            .to_string());
    }
    Ok(questions)
}
