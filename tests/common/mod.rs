// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use quizforge::{
    config::Config,
    generation::{FollowUpChat, GenerationError, GenerationRequest, Generator},
    models::question::{AnswerKey, Question, QuestionStatus},
    routes,
    session::{SessionRuntime, SnapshotStore},
    state::AppState,
    store::{MemoryStore, Store},
};
use serde_json::{Value, json};

/// Content that makes the scripted generator fail.
pub const FAILING_CONTENT: &str = "please fail";

/// Answers every generation request with `num_questions` (default 3)
/// multiple-choice questions whose correct option is index 1.
pub struct ScriptedGenerator;

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, GenerationError> {
        if request.content == FAILING_CONTENT {
            return Err(GenerationError::Api {
                status: 500,
                message: "model unavailable".to_string(),
            });
        }

        let count = request.num_questions.unwrap_or(3) as usize;
        Ok((0..count)
            .map(|i| Question {
                id: format!("q-test-{}", i),
                passage_text: None,
                question_text: format!("Question {} about {}", i + 1, request.content),
                answer: AnswerKey::Choice {
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_index: 1,
                    chosen_index: None,
                },
                status: QuestionStatus::Unvisited,
                explanation: None,
                is_marked_for_review: false,
                was_corrected_by_user: false,
            })
            .collect())
    }

    async fn extract_text(&self, _data: &str, _mime_type: &str) -> Result<String, GenerationError> {
        Ok("extracted text".to_string())
    }

    async fn explain(&self, question: &Question) -> Result<String, GenerationError> {
        Ok(format!("Explanation for {}", question.id))
    }

    async fn follow_up(
        &self,
        _chat: &FollowUpChat,
        message: &str,
    ) -> Result<String, GenerationError> {
        Ok(format!("You asked: {}", message))
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Helper function to spawn the app on a random port for testing.
/// Uses the in-memory store and a scripted generator, so no database or
/// network access is needed.
pub async fn spawn_app() -> TestApp {
    let snapshot_dir = std::env::temp_dir().join(format!("quizforge-it-{}", uuid::Uuid::new_v4()));

    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        gemini_api_keys: Vec::new(),
        gemini_model: "test-model".to_string(),
        gemini_base_url: "http://127.0.0.1:9".to_string(),
        snapshot_dir: snapshot_dir.display().to_string(),
        session_idle_seconds: 3600,
    };

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let generator: Arc<dyn Generator> = Arc::new(ScriptedGenerator);
    let state = AppState {
        sessions: SessionRuntime::new(store.clone(), generator, SnapshotStore::new(snapshot_dir)),
        store,
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers a fresh user and returns the bearer token.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": "password123" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST that must succeed; returns the workspace view.
    pub async fn step(&self, token: &str, path: &str, body: Value) -> Value {
        let response = self.post(token, path, body).await;
        let status = response.status().as_u16();
        let view: Value = response.json().await.unwrap();
        assert_eq!(status, 200, "POST {} failed: {}", path, view);
        view
    }

    /// Walks a topic test from the home page to the confirmation page.
    pub async fn prepare_topic_test(&self, token: &str, num_questions: u32, timed: Option<u32>) -> Value {
        self.step(token, "/api/session/method", json!({ "input_method": "topic" }))
            .await;

        let time_settings = match timed {
            Some(total_seconds) => json!({ "type": "timed", "total_seconds": total_seconds }),
            None => json!({ "type": "untimed" }),
        };
        self.step(
            token,
            "/api/session/config",
            json!({
                "input_method": "topic",
                "content": "Photosynthesis",
                "num_questions": num_questions,
                "time_settings": time_settings,
                "negative_marking": { "enabled": false, "marks_per_question": 0.0 }
            }),
        )
        .await
    }
}
