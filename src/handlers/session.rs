// src/handlers/session.rs

//! Thin translations from HTTP payloads to workspace events. Every handler
//! answers with the workspace view after the event and its effects.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::test_config::{ConfigRequest, InputMethod},
    session::{Event, SessionRuntime, WorkspaceView},
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct MethodRequest {
    pub input_method: InputMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub test_name: Option<String>,
}

/// Either `option` (multiple choice) or `text` (typed answer).
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub index: usize,
    #[serde(default)]
    pub option: Option<usize>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Home,
    History,
    Profile,
    Leaderboard,
    New,
    LeaveSetup,
    BackToHistory,
}

#[derive(Debug, Deserialize)]
pub struct GoRequest {
    pub to: Destination,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must not be empty"))]
    pub message: String,
}

async fn dispatch(
    sessions: &SessionRuntime,
    claims: &Claims,
    event: Event,
) -> Result<Json<WorkspaceView>, AppError> {
    let view = sessions.dispatch(claims.user_id()?, event).await?;
    Ok(Json(view))
}

fn answer_event(req: AnswerRequest, review: bool) -> Result<Event, AppError> {
    match (req.option, req.text) {
        (Some(option), None) if review => Ok(Event::CorrectOption { index: req.index, option }),
        (Some(option), None) => Ok(Event::SelectOption { index: req.index, option }),
        (None, Some(text)) if review => Ok(Event::CorrectText { index: req.index, text }),
        (None, Some(text)) => Ok(Event::EnterText { index: req.index, text }),
        _ => Err(AppError::BadRequest(
            "Provide exactly one of 'option' or 'text'".to_string(),
        )),
    }
}

/// Current workspace of the caller.
pub async fn get_view(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.view(claims.user_id()?).await?;
    Ok(Json(view))
}

pub async fn choose_method(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MethodRequest>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::ChooseMethod(req.input_method)).await
}

/// Submits the setup form. Generation runs before the response is sent.
pub async fn submit_config(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConfigRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    dispatch(&sessions, &claims, Event::SubmitConfig(req)).await
}

pub async fn edit_settings(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::EditSettings).await
}

pub async fn start_test(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    req: Option<Json<StartRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.unwrap_or_default();
    dispatch(&sessions, &claims, Event::StartTest { test_name: req.test_name }).await
}

pub async fn answer(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = answer_event(req, false)?;
    dispatch(&sessions, &claims, event).await
}

pub async fn clear_selection(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::ClearSelection(req.index)).await
}

pub async fn toggle_mark(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::ToggleReviewMark(req.index)).await
}

pub async fn navigate(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::Navigate(req.index)).await
}

pub async fn submit(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::Submit).await
}

pub async fn save_and_exit(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::SaveAndExit).await
}

/// Continues the test found in the in-progress mirror.
pub async fn resume(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::ResumeSnapshot).await
}

pub async fn discard(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::DiscardSnapshot).await
}

pub async fn enter_review(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::EnterReview).await
}

/// Rewrites the answer key of one question in the review draft.
pub async fn correct(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = answer_event(req, true)?;
    dispatch(&sessions, &claims, event).await
}

pub async fn back_to_results(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::BackToResults).await
}

pub async fn apply_corrections(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&sessions, &claims, Event::ApplyCorrections).await
}

pub async fn go(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = match req.to {
        Destination::Home => Event::GoHome,
        Destination::History => Event::OpenHistory,
        Destination::Profile => Event::OpenProfile,
        Destination::Leaderboard => Event::OpenLeaderboard,
        Destination::New => Event::StartNew,
        Destination::LeaveSetup => Event::LeaveSetup,
        Destination::BackToHistory => Event::BackToHistory,
    };
    dispatch(&sessions, &claims, event).await
}

pub async fn explanation(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, AppError> {
    let explanation = sessions.explain(claims.user_id()?, index).await?;
    Ok(Json(json!({ "index": index, "explanation": explanation })))
}

pub async fn chat(
    State(sessions): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path(index): Path<usize>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let turns = sessions.chat(claims.user_id()?, index, req.message).await?;
    Ok(Json(json!({ "index": index, "turns": turns })))
}
