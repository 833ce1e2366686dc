// src/handlers/history.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{history::HistoryEntry, test_config::NegativeMarking},
    session::{Event, SessionRuntime},
    store::Store,
    utils::jwt::Claims,
};

/// History row without the question payload.
#[derive(Debug, Serialize)]
pub struct HistorySummary {
    pub id: String,
    pub test_name: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub score_percentage: f64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub attempted_questions: i64,
    pub negative_marking: NegativeMarking,
    pub was_corrected_by_user: bool,
}

impl From<HistoryEntry> for HistorySummary {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            test_name: entry.test_name,
            completed_at: entry.completed_at,
            score_percentage: entry.score_percentage,
            total_questions: entry.total_questions,
            correct_answers: entry.correct_answers,
            attempted_questions: entry.attempted_questions,
            negative_marking: entry.negative_marking,
            was_corrected_by_user: entry.was_corrected_by_user,
        }
    }
}

/// Completed tests of the caller, newest first.
pub async fn list_history(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let history = store.list_history(claims.user_id()?).await?;
    let summaries: Vec<HistorySummary> = history.into_iter().map(HistorySummary::from).collect();
    Ok(Json(summaries))
}

pub async fn clear_history(
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let removed = store.clear_history(user_id).await?;
    tracing::info!("User {} cleared {} history entries", user_id, removed);

    sessions.reload_history(user_id).await?;
    Ok(Json(json!({ "deleted": removed })))
}

pub async fn delete_entry(
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    if !store.delete_history(user_id, &id).await? {
        return Err(AppError::NotFound(format!("History entry '{}' not found", id)));
    }

    sessions.reload_history(user_id).await?;
    Ok(Json(json!({ "deleted": 1 })))
}

/// Opens the full question list of a past attempt.
pub async fn view_details(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .dispatch(claims.user_id()?, Event::ViewHistoryDetails(id))
        .await?;
    Ok(Json(view))
}

/// Reopens the score screen of a past attempt.
pub async fn view_score(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .dispatch(claims.user_id()?, Event::ViewHistoryScore(id))
        .await?;
    Ok(Json(view))
}

pub async fn retake(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.dispatch(claims.user_id()?, Event::Retake(id)).await?;
    Ok(Json(view))
}
