// src/generation/gemini.rs

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    generation::{
        FollowUpChat, GenerationError, GenerationRequest, Generator,
        chat::ChatRole,
        parse,
        prompts::{self, EXTRACTION_PROMPT, TUTOR_PERSONA},
    },
    models::question::Question,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// API keys used in turn. A rate-limited key hands over to the next one for
/// subsequent calls.
#[derive(Debug, Default)]
pub struct KeyRing {
    keys: Vec<String>,
    current: AtomicUsize,
}

impl KeyRing {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            current: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.current.load(Ordering::Relaxed) % self.keys.len();
        self.keys.get(index).map(String::as_str)
    }

    pub fn rotate(&self) {
        if self.keys.len() > 1 {
            let next = (self.current.load(Ordering::Relaxed) + 1) % self.keys.len();
            self.current.store(next, Ordering::Relaxed);
            tracing::info!("Rotated to API key index {}.", next);
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn text_part(text: impl Into<String>) -> GeminiPart {
    GeminiPart {
        text: Some(text.into()),
        ..Default::default()
    }
}

fn user_content(parts: Vec<GeminiPart>) -> GeminiContent {
    GeminiContent {
        role: Some("user".to_string()),
        parts,
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    keys: KeyRing,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, keys: KeyRing) -> Self {
        if keys.is_empty() {
            tracing::error!("No Gemini API key configured; generation requests will fail.");
        }
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            keys,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, request: &GeminiRequest) -> Result<String, GenerationError> {
        let result = self.send(request).await;
        if let Err(e) = &result {
            if e.is_rate_limited() {
                self.keys.rotate();
            }
        }
        result
    }

    async fn send(&self, request: &GeminiRequest) -> Result<String, GenerationError> {
        let key = self.keys.current().ok_or(GenerationError::NoApiKey)?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::error!("Gemini request failed with {}: {}", status, message);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "The model returned an empty response.".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, GenerationError> {
        let body = GeminiRequest {
            contents: vec![user_content(vec![text_part(prompts::question_prompt(request))])],
            system_instruction: None,
            generation_config: GeminiGenerationConfig {
                temperature: Some(0.3),
                response_mime_type: Some("application/json".to_string()),
            },
        };
        let reply = self.generate(&body).await?;

        let target_language = request
            .language
            .map(|l| l.to_string())
            .unwrap_or_else(|| "the source document's primary language".to_string());
        parse::questions_from_reply(&reply, &target_language)
    }

    async fn extract_text(&self, data: &str, mime_type: &str) -> Result<String, GenerationError> {
        let body = GeminiRequest {
            contents: vec![user_content(vec![
                GeminiPart {
                    inline_data: Some(GeminiInlineData {
                        mime_type: mime_type.to_string(),
                        data: data.to_string(),
                    }),
                    ..Default::default()
                },
                text_part(EXTRACTION_PROMPT),
            ])],
            system_instruction: None,
            generation_config: GeminiGenerationConfig::default(),
        };

        match self.generate(&body).await {
            Err(GenerationError::Api { status: 400, .. }) => Err(GenerationError::UnreadableFile),
            other => other,
        }
    }

    async fn explain(&self, question: &Question) -> Result<String, GenerationError> {
        let body = GeminiRequest {
            contents: vec![user_content(vec![text_part(prompts::explanation_prompt(
                question,
            ))])],
            system_instruction: None,
            generation_config: GeminiGenerationConfig {
                temperature: Some(0.2),
                ..Default::default()
            },
        };
        self.generate(&body).await
    }

    async fn follow_up(
        &self,
        chat: &FollowUpChat,
        message: &str,
    ) -> Result<String, GenerationError> {
        let mut contents: Vec<GeminiContent> = chat
            .history()
            .map(|turn| GeminiContent {
                role: Some(
                    match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![text_part(turn.text.clone())],
            })
            .collect();
        contents.push(user_content(vec![text_part(message)]));

        let body = GeminiRequest {
            contents,
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![text_part(TUTOR_PERSONA)],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: Some(0.5),
                ..Default::default()
            },
        };
        self.generate(&body).await
    }
}
