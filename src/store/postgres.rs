// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        history::{HistoryEntry, HistoryStats, SavedTest, SessionRecord},
        question::Question,
        test_config::{NegativeMarking, TestConfig},
        user::{NewUser, User, UserProfile},
    },
    store::{LeaderboardData, Store},
};

/// Postgres-backed store. Questions and configurations live in JSONB columns.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    test_name: String,
    completed_at: chrono::DateTime<chrono::Utc>,
    score_percentage: f64,
    total_questions: i64,
    correct_answers: i64,
    attempted_questions: i64,
    negative_marking: Json<NegativeMarking>,
    original_config: Json<TestConfig>,
    questions: Json<Vec<Question>>,
    was_corrected_by_user: bool,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry {
            id: row.id,
            test_name: row.test_name,
            completed_at: row.completed_at,
            score_percentage: row.score_percentage,
            total_questions: row.total_questions,
            correct_answers: row.correct_answers,
            attempted_questions: row.attempted_questions,
            negative_marking: row.negative_marking.0,
            original_config: row.original_config.0,
            questions: row.questions.0,
            was_corrected_by_user: row.was_corrected_by_user,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SavedTestRow {
    id: String,
    questions: Json<Vec<Question>>,
    current_question_index: i64,
    time_remaining_seconds: Option<i64>,
    test_duration_seconds: Option<i64>,
    config: Json<TestConfig>,
    session_id: String,
    saved_at: chrono::DateTime<chrono::Utc>,
}

impl From<SavedTestRow> for SavedTest {
    fn from(row: SavedTestRow) -> Self {
        SavedTest {
            id: row.id,
            questions: row.questions.0,
            current_question_index: usize::try_from(row.current_question_index).unwrap_or(0),
            time_remaining_seconds: row.time_remaining_seconds.and_then(|s| u32::try_from(s).ok()),
            test_duration_seconds: row.test_duration_seconds.and_then(|s| u32::try_from(s).ok()),
            config: row.config.0,
            session_id: row.session_id,
            saved_at: row.saved_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    email: String,
    score_percentage: f64,
    attempted_questions: i64,
}

const HISTORY_COLUMNS: &str = r#"
    id, test_name, completed_at, score_percentage, total_questions, correct_answers,
    attempted_questions, negative_marking, original_config, questions, was_corrected_by_user
"#;

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, initials, password)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, initials, password, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.initials)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Email '{}' is already registered", user.email))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, initials, password, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, initials, password, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: i64,
        name: Option<String>,
        initials: Option<String>,
    ) -> Result<UserProfile, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                initials = COALESCE($3, initials)
            WHERE id = $1
            RETURNING id, name, email, initials
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(initials)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn save_session(
        &self,
        user_id: i64,
        record: SessionRecord,
    ) -> Result<HistoryEntry, AppError> {
        let query = format!(
            r#"
            INSERT INTO test_sessions (
                id, user_id, test_name, completed_at, score_percentage, total_questions,
                correct_answers, attempted_questions, negative_marking, original_config,
                questions, was_corrected_by_user
            )
            VALUES ($1, $2, $3, CURRENT_TIMESTAMP, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id, id) DO UPDATE SET
                test_name = EXCLUDED.test_name,
                completed_at = EXCLUDED.completed_at,
                score_percentage = EXCLUDED.score_percentage,
                total_questions = EXCLUDED.total_questions,
                correct_answers = EXCLUDED.correct_answers,
                attempted_questions = EXCLUDED.attempted_questions,
                negative_marking = EXCLUDED.negative_marking,
                original_config = EXCLUDED.original_config,
                questions = EXCLUDED.questions,
                was_corrected_by_user = EXCLUDED.was_corrected_by_user
            RETURNING {}
            "#,
            HISTORY_COLUMNS
        );

        let row = sqlx::query_as::<_, HistoryRow>(&query)
            .bind(&record.session_id)
            .bind(user_id)
            .bind(&record.test_name)
            .bind(record.score_percentage)
            .bind(record.total_questions)
            .bind(record.correct_answers)
            .bind(record.attempted_questions)
            .bind(Json(record.config.negative_marking))
            .bind(Json(&record.config))
            .bind(Json(&record.questions))
            .bind(record.was_corrected_by_user)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to save session {}: {:?}", record.session_id, e);
                AppError::from(e)
            })?;

        Ok(row.into())
    }

    async fn list_history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
        let query = format!(
            "SELECT {} FROM test_sessions WHERE user_id = $1 ORDER BY completed_at DESC",
            HISTORY_COLUMNS
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn delete_history(&self, user_id: i64, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM test_sessions WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_history(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM test_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn save_test(&self, user_id: i64, saved: &SavedTest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO saved_tests (
                id, user_id, questions, current_question_index, time_remaining_seconds,
                test_duration_seconds, config, session_id, saved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&saved.id)
        .bind(user_id)
        .bind(Json(&saved.questions))
        .bind(saved.current_question_index as i64)
        .bind(saved.time_remaining_seconds.map(i64::from))
        .bind(saved.test_duration_seconds.map(i64::from))
        .bind(Json(&saved.config))
        .bind(&saved.session_id)
        .bind(saved.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save test {}: {:?}", saved.id, e);
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn list_saved_tests(&self, user_id: i64) -> Result<Vec<SavedTest>, AppError> {
        let rows = sqlx::query_as::<_, SavedTestRow>(
            r#"
            SELECT id, questions, current_question_index, time_remaining_seconds,
                   test_duration_seconds, config, session_id, saved_at
            FROM saved_tests
            WHERE user_id = $1
            ORDER BY saved_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SavedTest::from).collect())
    }

    async fn delete_saved_test(&self, user_id: i64, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM saved_tests WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn leaderboard_data(&self) -> Result<LeaderboardData, AppError> {
        let users = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, email, initials FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT u.email, s.score_percentage, s.attempted_questions
            FROM test_sessions s
            JOIN users u ON s.user_id = u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut histories: HashMap<String, Vec<HistoryStats>> = HashMap::new();
        for row in rows {
            histories.entry(row.email).or_default().push(HistoryStats {
                score_percentage: row.score_percentage,
                attempted_questions: row.attempted_questions,
            });
        }

        Ok(LeaderboardData { users, histories })
    }
}
