// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        history::{HistoryEntry, SavedTest, SessionRecord},
        user::{NewUser, User, UserProfile},
    },
    store::{LeaderboardData, Store},
};

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    users: Vec<User>,
    /// Per user, oldest first.
    history: HashMap<i64, Vec<HistoryEntry>>,
    saved: HashMap<i64, Vec<SavedTest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.lock()?;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            name: user.name,
            email: user.email,
            initials: user.initials,
            password: user.password_hash,
            created_at: Some(chrono::Utc::now()),
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_profile(
        &self,
        id: i64,
        name: Option<String>,
        initials: Option<String>,
    ) -> Result<UserProfile, AppError> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(initials) = initials {
            user.initials = initials;
        }
        Ok(user.profile())
    }

    async fn save_session(
        &self,
        user_id: i64,
        record: SessionRecord,
    ) -> Result<HistoryEntry, AppError> {
        let entry = record.into_entry(chrono::Utc::now());
        let mut inner = self.lock()?;
        let history = inner.history.entry(user_id).or_default();
        history.retain(|h| h.id != entry.id);
        history.push(entry.clone());
        Ok(entry)
    }

    async fn list_history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .history
            .get(&user_id)
            .map(|h| h.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_history(&self, user_id: i64, id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        let Some(history) = inner.history.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = history.len();
        history.retain(|h| h.id != id);
        Ok(history.len() != before)
    }

    async fn clear_history(&self, user_id: i64) -> Result<u64, AppError> {
        let removed = self.lock()?.history.remove(&user_id).unwrap_or_default();
        Ok(removed.len() as u64)
    }

    async fn save_test(&self, user_id: i64, saved: &SavedTest) -> Result<(), AppError> {
        self.lock()?
            .saved
            .entry(user_id)
            .or_default()
            .push(saved.clone());
        Ok(())
    }

    async fn list_saved_tests(&self, user_id: i64) -> Result<Vec<SavedTest>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .saved
            .get(&user_id)
            .map(|s| s.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_saved_test(&self, user_id: i64, id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        let Some(saved) = inner.saved.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = saved.len();
        saved.retain(|s| s.id != id);
        Ok(saved.len() != before)
    }

    async fn leaderboard_data(&self) -> Result<LeaderboardData, AppError> {
        let inner = self.lock()?;
        let mut data = LeaderboardData {
            users: inner.users.iter().map(User::profile).collect(),
            histories: HashMap::new(),
        };
        for user in &inner.users {
            if let Some(history) = inner.history.get(&user.id) {
                data.histories
                    .insert(user.email.clone(), history.iter().map(HistoryEntry::stats).collect());
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{question::fixtures::choice, test_config::fixtures::topic_config};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".into(),
            email: email.into(),
            initials: "TU".into(),
            password_hash: "hash".into(),
        }
    }

    fn record(session_id: &str, score: f64) -> SessionRecord {
        SessionRecord {
            session_id: session_id.into(),
            test_name: "Quiz".into(),
            score_percentage: score,
            total_questions: 1,
            correct_answers: 1,
            attempted_questions: 1,
            questions: vec![choice("1", 0)],
            config: topic_config("Quiz"),
            was_corrected_by_user: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io")).await.unwrap();
        let err = store.create_user(new_user("a@x.io")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_save_session_upserts_by_session_id() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@x.io")).await.unwrap();

        store.save_session(user.id, record("s1", 40.0)).await.unwrap();
        store.save_session(user.id, record("s2", 60.0)).await.unwrap();
        let mut corrected = record("s1", 90.0);
        corrected.was_corrected_by_user = true;
        store.save_session(user.id, corrected).await.unwrap();

        let history = store.list_history(user.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "s1");
        assert_eq!(history[0].score_percentage, 90.0);
        assert!(history[0].was_corrected_by_user);

        // Other users are isolated.
        assert!(store.list_history(user.id + 1).await.unwrap().is_empty());
        assert!(!store.delete_history(user.id + 1, "s1").await.unwrap());

        assert!(store.delete_history(user.id, "s2").await.unwrap());
        assert_eq!(store.clear_history(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_data_keys_by_email() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a@x.io")).await.unwrap();
        store.create_user(new_user("b@x.io")).await.unwrap();
        store.save_session(a.id, record("s1", 75.0)).await.unwrap();

        let data = store.leaderboard_data().await.unwrap();
        assert_eq!(data.users.len(), 2);
        assert_eq!(data.histories["a@x.io"][0].score_percentage, 75.0);
        assert!(!data.histories.contains_key("b@x.io"));
    }
}
