// HTTP handlers for the rewards and wallet endpoints

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::LedgerResult;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::identity::Identity;
use crate::ledger;
use crate::models::{
    ChapterProgressRequest, ChapterProgressUpdate, LedgerTransaction, QuizSubmission,
    ReconcileReport, RedeemRequest, SubmitQuizRequest, WalletQuery, WalletView,
};
use crate::service;
use crate::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_health = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();

    Json(serde_json::json!({
        "status": if db_health { "healthy" } else { "unhealthy" },
        "database": if db_health { "up" } else { "down" },
    }))
}

/// Submit a quiz score for the calling user
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    PathParams(quiz_id): PathParams<i64>,
    JsonBody(req): JsonBody<SubmitQuizRequest>,
) -> LedgerResult<Json<QuizSubmission>> {
    let submission =
        service::submit_quiz_result(&state.db, identity.user_id, quiz_id, req.score).await?;
    Ok(Json(submission))
}

/// Update chapter playback progress for the calling user
pub async fn update_chapter_progress(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    PathParams(chapter_id): PathParams<i64>,
    JsonBody(req): JsonBody<ChapterProgressRequest>,
) -> LedgerResult<Json<ChapterProgressUpdate>> {
    let update = service::record_chapter_progress(
        &state.db,
        identity.user_id,
        chapter_id,
        req.completed,
        req.current_time,
    )
    .await?;
    Ok(Json(update))
}

/// Wallet of the calling user
pub async fn get_own_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    QueryParams(page): QueryParams<WalletQuery>,
) -> LedgerResult<Json<WalletView>> {
    let wallet = ledger::get_wallet(&state.db, identity.user_id, page).await?;
    Ok(Json(wallet))
}

/// Wallet of any user (owner or admin)
pub async fn get_user_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    PathParams(user_id): PathParams<i64>,
    QueryParams(page): QueryParams<WalletQuery>,
) -> LedgerResult<Json<WalletView>> {
    identity.authorize_wallet_read(user_id)?;
    let wallet = ledger::get_wallet(&state.db, user_id, page).await?;
    Ok(Json(wallet))
}

/// Debit coins from a user's wallet (admin only)
pub async fn redeem_coins(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    PathParams(user_id): PathParams<i64>,
    JsonBody(req): JsonBody<RedeemRequest>,
) -> LedgerResult<Json<LedgerTransaction>> {
    identity.authorize_ledger_admin()?;
    let entry = ledger::redeem(&state.db, user_id, req.amount, &req.note).await?;
    Ok(Json(entry))
}

/// Recompute a user's totals from the ledger (admin only)
pub async fn reconcile_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    PathParams(user_id): PathParams<i64>,
) -> LedgerResult<Json<ReconcileReport>> {
    identity.authorize_ledger_admin()?;
    let report = ledger::reconcile(&state.db, user_id).await?;
    Ok(Json(report))
}
