// src/store/mod.rs

//! Persistence of users, completed sessions (history) and saved tests.
//!
//! All history and saved-test operations are scoped to one user id.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        history::{HistoryEntry, HistoryStats, SavedTest, SessionRecord},
        user::{NewUser, User, UserProfile},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Everything the leaderboard needs in one read.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardData {
    /// In registration order.
    pub users: Vec<UserProfile>,
    /// Keyed by user email.
    pub histories: HashMap<String, Vec<HistoryStats>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn update_profile(
        &self,
        id: i64,
        name: Option<String>,
        initials: Option<String>,
    ) -> Result<UserProfile, AppError>;

    /// Inserts the result, or replaces the entry with the same session id.
    async fn save_session(&self, user_id: i64, record: SessionRecord)
    -> Result<HistoryEntry, AppError>;

    /// Newest first.
    async fn list_history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, AppError>;

    /// Returns false when nothing matched.
    async fn delete_history(&self, user_id: i64, id: &str) -> Result<bool, AppError>;

    async fn clear_history(&self, user_id: i64) -> Result<u64, AppError>;

    async fn save_test(&self, user_id: i64, saved: &SavedTest) -> Result<(), AppError>;

    /// Newest first.
    async fn list_saved_tests(&self, user_id: i64) -> Result<Vec<SavedTest>, AppError>;

    async fn delete_saved_test(&self, user_id: i64, id: &str) -> Result<bool, AppError>;

    async fn leaderboard_data(&self) -> Result<LeaderboardData, AppError>;
}
