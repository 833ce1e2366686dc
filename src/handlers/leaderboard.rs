// src/handlers/leaderboard.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, ranking::rank_users, store::Store};

/// Ranks every user with at least one completed test. Public.
pub async fn get_leaderboard(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let data = store.leaderboard_data().await.map_err(|e| {
        tracing::error!("Failed to load leaderboard: {}", e);
        e
    })?;

    Ok(Json(rank_users(&data.users, &data.histories)))
}
