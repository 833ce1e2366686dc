// src/handlers/profile.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{UpdateProfileRequest, UserProfile},
    ranking::{rank_of, rank_users},
    store::Store,
    session::SessionRuntime,
    utils::jwt::Claims,
};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
    /// `None` until the user completes a test.
    pub rank: Option<usize>,
    pub composite_score: Option<f64>,
    pub ranked_users: usize,
}

async fn build_profile(store: &dyn Store, user: UserProfile) -> Result<ProfileResponse, AppError> {
    let data = store.leaderboard_data().await?;
    let ranked = rank_users(&data.users, &data.histories);
    let position = rank_of(&ranked, &user.email);

    Ok(ProfileResponse {
        user,
        rank: position.map(|(rank, _)| rank),
        composite_score: position.map(|(_, score)| score),
        ranked_users: ranked.len(),
    })
}

/// Get current user's profile and leaderboard position.
pub async fn get_profile(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(build_profile(store.as_ref(), user.profile()).await?))
}

/// Edits name and/or initials. The open workspace picks up the change.
pub async fn update_profile(
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let name = payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let initials = payload
        .initials
        .map(|i| i.trim().to_uppercase())
        .filter(|i| !i.is_empty());

    let profile = store
        .update_profile(claims.user_id()?, name, initials)
        .await?;
    tracing::info!("User {} updated their profile", profile.id);

    sessions.update_user(profile.clone()).await?;

    Ok(Json(build_profile(store.as_ref(), profile).await?))
}
