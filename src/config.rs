// src/config.rs

use std::env;

use dotenvy::dotenv;
use url::Url;

use crate::generation::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Clone)]
pub struct Config {
    /// Without it the server keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub gemini_api_keys: Vec<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Directory of the per-user in-progress test mirrors.
    pub snapshot_dir: String,
    /// Seconds before an untouched workspace is dropped from memory.
    pub session_idle_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let gemini_api_keys = env::var("GEMINI_API_KEYS")
            .or_else(|_| env::var("API_KEY"))
            .map(|v| parse_key_list(&v))
            .unwrap_or_default();

        let gemini_model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let gemini_base_url =
            env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Url::parse(&gemini_base_url).expect("GEMINI_BASE_URL must be a valid URL");

        let snapshot_dir =
            env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "data/snapshots".to_string());

        let session_idle_seconds = env::var("SESSION_IDLE_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            gemini_api_keys,
            gemini_model,
            gemini_base_url,
            snapshot_dir,
            session_idle_seconds,
        }
    }
}

/// Comma separated, blanks dropped.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
