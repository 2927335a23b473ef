// Completion-to-reward pipeline
//
// validate -> load unit -> check user -> BEGIN -> track -> evaluate ->
// apply reward -> COMMIT. Any failure after BEGIN rolls back the completion
// update together with the reward.

use crate::database::{Database, DbPool};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger;
use crate::models::{ChapterProgressUpdate, QuizSubmission, RewardableUnit};
use crate::rewards;
use crate::tracker;
use tracing::info;

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

pub fn validate_score(score: i32) -> LedgerResult<()> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(LedgerError::Validation(format!(
            "score must be between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        )))
    }
}

pub fn validate_current_time(current_time: f64) -> LedgerResult<()> {
    if current_time.is_finite() && current_time >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::Validation(
            "currentTime must be a non-negative number of seconds".to_string(),
        ))
    }
}

async fn ensure_user(pool: &DbPool, user_id: i64) -> LedgerResult<()> {
    if Database::user_exists(pool, user_id).await? {
        Ok(())
    } else {
        Err(LedgerError::NotFound(format!("user {}", user_id)))
    }
}

pub async fn submit_quiz_result(
    pool: &DbPool,
    user_id: i64,
    quiz_id: i64,
    score: i32,
) -> LedgerResult<QuizSubmission> {
    validate_score(score)?;

    let quiz = Database::find_quiz(pool, quiz_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("quiz {}", quiz_id)))?;
    ensure_user(pool, user_id).await?;

    let unit = RewardableUnit::from(&quiz);
    let mut tx = pool.begin().await?;

    let tracked = tracker::record_quiz_attempt(&mut *tx, user_id, &quiz, score).await?;
    let decision = rewards::evaluate(&tracked.transition, &unit);

    let awarded = if decision.grant {
        Some(ledger::apply_reward(&mut *tx, user_id, &decision).await?)
    } else {
        None
    };

    tx.commit().await?;

    info!(
        "User {} submitted quiz {}: score={} (previous {:?}) passed={} coins_awarded={}",
        user_id,
        quiz_id,
        score,
        tracked.prior.as_ref().map(|prior| prior.score),
        tracked.current.passed,
        awarded.as_ref().map(|t| t.amount).unwrap_or(0)
    );

    Ok(QuizSubmission {
        quiz_id,
        score: tracked.current.score,
        passed: tracked.current.passed,
        coins_awarded: awarded.as_ref().map(|t| t.amount).unwrap_or(0),
        transaction_note: awarded.map(|t| t.note),
    })
}

pub async fn record_chapter_progress(
    pool: &DbPool,
    user_id: i64,
    chapter_id: i64,
    completed: bool,
    current_time: f64,
) -> LedgerResult<ChapterProgressUpdate> {
    validate_current_time(current_time)?;

    let chapter = Database::find_chapter(pool, chapter_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("chapter {}", chapter_id)))?;
    ensure_user(pool, user_id).await?;

    let unit = RewardableUnit::from(&chapter);
    let mut tx = pool.begin().await?;

    let tracked =
        tracker::record_chapter_progress(&mut *tx, user_id, &chapter, completed, current_time)
            .await?;
    let decision = rewards::evaluate(&tracked.transition, &unit);

    let coins_awarded = if decision.grant {
        ledger::apply_reward(&mut *tx, user_id, &decision)
            .await?
            .amount
    } else {
        0
    };

    tx.commit().await?;

    if coins_awarded > 0 {
        info!(
            "User {} completed chapter {} (first watched {:?}): coins_awarded={}",
            user_id,
            chapter_id,
            tracked.prior.as_ref().map(|prior| prior.watched_at),
            coins_awarded
        );
    }

    Ok(ChapterProgressUpdate {
        progress: tracked.current,
        coins_awarded,
    })
}
