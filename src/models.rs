// Database models and API payloads for the LMS rewards backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Closed set of roles carried by an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// Ledger entry direction, matching the `transaction_type` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Earned,
    Redeemed,
}

/// Kind of content a reward can be tied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reward_unit_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Chapter,
    Quiz,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Chapter => write!(f, "chapter"),
            UnitKind::Quiz => write!(f, "quiz"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub coin_value: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub chapter_id: i64,
    pub title: String,
    pub pass_score: i32,
    pub coin_value: i32,
}

/// A chapter or quiz as seen by the reward rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardableUnit {
    pub kind: UnitKind,
    pub id: i64,
    pub title: String,
    pub coin_value: i32,
}

impl From<&Chapter> for RewardableUnit {
    fn from(chapter: &Chapter) -> Self {
        Self {
            kind: UnitKind::Chapter,
            id: chapter.id,
            title: chapter.title.clone(),
            coin_value: chapter.coin_value,
        }
    }
}

impl From<&Quiz> for RewardableUnit {
    fn from(quiz: &Quiz) -> Self {
        Self {
            kind: UnitKind::Quiz,
            id: quiz.id,
            title: quiz.title.clone(),
            coin_value: quiz.coin_value,
        }
    }
}

/// Per-user progress through a chapter
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub user_id: i64,
    pub chapter_id: i64,
    pub completed: bool,
    #[sqlx(rename = "current_time_secs")]
    pub current_time: f64,
    pub watched_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Latest attempt of a user at a quiz
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub user_id: i64,
    pub quiz_id: i64,
    pub score: i32,
    pub passed: bool,
    pub attempted_at: DateTime<Utc>,
    pub first_passed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
}

/// Immutable ledger entry stored in the `transactions` table
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub id: i64,
    pub wallet_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub note: String,
    pub unit_kind: Option<UnitKind>,
    pub unit_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Signed effect of this entry on the wallet balance.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionType::Earned => self.amount,
            TransactionType::Redeemed => -self.amount,
        }
    }
}

/// Request body for a quiz submission
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub score: i32,
}

/// Request body for a chapter progress update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgressRequest {
    pub completed: bool,
    #[serde(default)]
    pub current_time: f64,
}

/// Request body for a coin redemption
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub amount: i64,
    pub note: String,
}

/// Pagination for wallet transaction listings
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WalletQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for WalletQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub quiz_id: i64,
    pub score: i32,
    pub passed: bool,
    pub coins_awarded: i64,
    pub transaction_note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgressUpdate {
    pub progress: ChapterProgress,
    pub coins_awarded: i64,
}

/// Wallet balance with a page of its ledger, newest first
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub user_id: i64,
    pub balance: i64,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub transactions: Vec<LedgerTransaction>,
}

/// Outcome of recomputing a user's totals from the ledger
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub user_id: i64,
    pub ledger_earned: i64,
    pub ledger_redeemed: i64,
    pub wallet_balance: i64,
    pub coins_earned_before: i64,
    pub coins_earned_after: i64,
    pub balance_consistent: bool,
}

impl ReconcileReport {
    pub fn ledger_balance(&self) -> i64 {
        self.ledger_earned - self.ledger_redeemed
    }

    pub fn drift_detected(&self) -> bool {
        !self.balance_consistent || self.coins_earned_before != self.coins_earned_after
    }
}
