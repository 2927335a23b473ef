// LMS rewards backend
// Coin ledger and the quiz/chapter completion-to-reward pipeline

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod rewards;
pub mod service;
pub mod tracker;

use axum::{
    routing::{get, post, put},
    Router,
};
use database::DbPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

/// Build the HTTP router over a shared connection pool.
pub fn router(db: DbPool) -> Router {
    let state = Arc::new(AppState { db });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/quizzes/:quiz_id/submissions",
            post(handlers::submit_quiz),
        )
        .route(
            "/api/chapters/:chapter_id/progress",
            put(handlers::update_chapter_progress),
        )
        .route("/api/wallet", get(handlers::get_own_wallet))
        .route("/api/users/:user_id/wallet", get(handlers::get_user_wallet))
        .route(
            "/api/users/:user_id/wallet/redemptions",
            post(handlers::redeem_coins),
        )
        .route(
            "/api/users/:user_id/reconcile",
            post(handlers::reconcile_user),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
