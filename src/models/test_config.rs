// src/models/test_config.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// How the source material for a test was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMethod {
    /// Uploaded file: plain text, image or PDF.
    Document,
    /// Pasted syllabus text.
    Syllabus,
    Topic,
}

impl fmt::Display for InputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputMethod::Document => "document",
            InputMethod::Syllabus => "syllabus",
            InputMethod::Topic => "topic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeSettings {
    Untimed,
    Timed { total_seconds: u32 },
}

impl TimeSettings {
    /// Total budget in seconds, `None` when the test is untimed.
    pub fn total_seconds(&self) -> Option<u32> {
        match self {
            TimeSettings::Untimed => None,
            TimeSettings::Timed { total_seconds } => Some(*total_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NegativeMarking {
    pub enabled: bool,
    /// Marks deducted per incorrectly attempted question. Ignored unless enabled.
    pub marks_per_question: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    Hindi,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => f.write_str("English"),
            Language::Hindi => f.write_str("Hindi"),
        }
    }
}

/// Settings of one test, fixed once generation starts (only the name may change later).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub input_method: InputMethod,

    /// Raw text, or base64 data for binary uploads.
    pub content: String,

    /// Requested question count. `None` lets the generator decide.
    pub num_questions: Option<u32>,

    pub time_settings: TimeSettings,
    pub negative_marking: NegativeMarking,

    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,

    /// 1 (easy) to 5 (hard). Syllabus and topic tests only.
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub custom_instructions: Option<String>,

    pub test_name: String,

    #[serde(default)]
    pub tita_enabled: bool,
}

impl TestConfig {
    pub fn from_request(req: ConfigRequest, test_name: String) -> Self {
        Self {
            input_method: req.input_method,
            content: req.content,
            num_questions: req.num_questions,
            time_settings: req.time_settings,
            negative_marking: req.negative_marking,
            mime_type: req.mime_type,
            original_file_name: req.original_file_name,
            language: req.language,
            difficulty: req.difficulty,
            custom_instructions: req.custom_instructions,
            test_name,
            tita_enabled: req.tita_enabled,
        }
    }

    /// Name given to a fresh test before the user edits it.
    pub fn default_test_name(method: InputMethod, original_file_name: Option<&str>) -> String {
        match (method, original_file_name) {
            (InputMethod::Document, Some(file_name)) => match file_name.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => file_name.to_string(),
            },
            (InputMethod::Syllabus, _) => "Syllabus-based Test".to_string(),
            (InputMethod::Topic, _) => "Topic-based Test".to_string(),
            (method, None) => format!("Test from {}", method),
        }
    }

    /// Whether questions generated for `self` can be reused for `other`.
    ///
    /// Documents compare file identity, language and content; syllabus and
    /// topic tests compare content, count, difficulty, language and custom
    /// instructions. Timing and negative marking must match in both cases.
    /// The test name never matters.
    pub fn is_equivalent(&self, other: &TestConfig) -> bool {
        if self.input_method != other.input_method {
            return false;
        }

        let same_source = if self.input_method == InputMethod::Document {
            self.original_file_name == other.original_file_name
                && self.mime_type == other.mime_type
                && self.language == other.language
                && self.content == other.content
        } else {
            self.content == other.content
                && self.num_questions == other.num_questions
                && self.difficulty == other.difficulty
                && self.language == other.language
                && self.custom_instructions == other.custom_instructions
        };

        let same_timing = match (self.time_settings, other.time_settings) {
            (TimeSettings::Untimed, TimeSettings::Untimed) => true,
            (TimeSettings::Timed { total_seconds: a }, TimeSettings::Timed { total_seconds: b }) => {
                a == b
            }
            _ => false,
        };

        let same_marking = self.negative_marking.enabled == other.negative_marking.enabled
            && self.negative_marking.marks_per_question == other.negative_marking.marks_per_question;

        same_source && same_timing && same_marking
    }

    /// Binary uploads (images, PDFs) must be turned into text before generation.
    pub fn needs_text_extraction(&self) -> bool {
        self.input_method == InputMethod::Document
            && self
                .mime_type
                .as_deref()
                .is_some_and(|m| m.starts_with("image/") || m == PDF_MIME_TYPE)
    }
}

/// DTO submitted from the setup form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfigRequest {
    pub input_method: InputMethod,

    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,

    #[validate(range(min = 1, max = 200))]
    #[serde(default)]
    pub num_questions: Option<u32>,

    #[validate(custom(function = validate_time_settings))]
    pub time_settings: TimeSettings,

    #[validate(custom(function = validate_negative_marking))]
    pub negative_marking: NegativeMarking,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub mime_type: Option<String>,

    #[validate(length(max = 255))]
    #[serde(default)]
    pub original_file_name: Option<String>,

    #[serde(default)]
    pub language: Option<Language>,

    #[validate(range(min = 1, max = 5))]
    #[serde(default)]
    pub difficulty: Option<u8>,

    #[validate(length(max = 2000))]
    #[serde(default)]
    pub custom_instructions: Option<String>,

    #[serde(default)]
    pub tita_enabled: bool,
}

fn validate_time_settings(settings: &TimeSettings) -> Result<(), validator::ValidationError> {
    if let TimeSettings::Timed { total_seconds: 0 } = settings {
        return Err(validator::ValidationError::new("time_budget_must_be_positive"));
    }
    Ok(())
}

fn validate_negative_marking(settings: &NegativeMarking) -> Result<(), validator::ValidationError> {
    if !settings.marks_per_question.is_finite() || settings.marks_per_question < 0.0 {
        return Err(validator::ValidationError::new("invalid_penalty"));
    }
    Ok(())
}
