// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, history, leaderboard, profile, saved_tests, session},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Auth and leaderboard routes are public; the rest require a bearer token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .layer(require_auth.clone()),
        );

    let session_routes = Router::new()
        .route("/", get(session::get_view))
        .route("/method", post(session::choose_method))
        .route("/config", post(session::submit_config))
        .route("/confirm/edit", post(session::edit_settings))
        .route("/start", post(session::start_test))
        .route("/answer", post(session::answer))
        .route("/clear", post(session::clear_selection))
        .route("/mark", post(session::toggle_mark))
        .route("/navigate", post(session::navigate))
        .route("/submit", post(session::submit))
        .route("/save-exit", post(session::save_and_exit))
        .route("/resume", post(session::resume))
        .route("/discard", post(session::discard))
        .route("/review", post(session::enter_review))
        .route("/review/correct", post(session::correct))
        .route("/review/back", post(session::back_to_results))
        .route("/review/apply", post(session::apply_corrections))
        .route("/go", post(session::go))
        .route("/questions/{index}/explanation", post(session::explanation))
        .route("/questions/{index}/chat", post(session::chat))
        .layer(require_auth.clone());

    let history_routes = Router::new()
        .route("/", get(history::list_history).delete(history::clear_history))
        .route("/{id}", delete(history::delete_entry))
        .route("/{id}/details", post(history::view_details))
        .route("/{id}/score", post(history::view_score))
        .route("/{id}/retake", post(history::retake))
        .layer(require_auth.clone());

    let saved_routes = Router::new()
        .route("/", get(saved_tests::list_saved_tests))
        .route("/{id}/resume", post(saved_tests::resume_saved))
        .layer(require_auth.clone());

    let profile_routes = Router::new()
        .route("/", get(profile::get_profile).put(profile::update_profile))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/session", session_routes)
        .nest("/api/history", history_routes)
        .nest("/api/saved-tests", saved_routes)
        .nest("/api/profile", profile_routes)
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
