// Completion tracking for chapters and quizzes
//
// Every write happens on the caller's connection so that the record update
// commits or rolls back together with any reward it triggers.

use crate::error::LedgerResult;
use crate::models::{Chapter, ChapterProgress, Quiz, QuizResult, UnitKind};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, info};

/// Where a (user, unit) pair stands relative to its passed/completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// No record existed.
    Absent,
    /// A record exists but the unit was not reached.
    Pending,
    /// Passed or completed. For the prior side this means "ever reached".
    Reached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub prior: CompletionState,
    pub current: CompletionState,
}

/// Result of recording progress: the record before and after the write.
#[derive(Debug, Clone)]
pub struct Tracked<R> {
    pub prior: Option<R>,
    pub current: R,
    pub transition: Transition,
}

/// Common view over chapter progress and quiz results.
pub trait CompletionRecord {
    /// Whether the latest write left the unit passed/completed.
    fn reached(&self) -> bool;
    /// Sticky marker set the first time the unit was reached.
    fn first_reached_at(&self) -> Option<DateTime<Utc>>;

    fn ever_reached(&self) -> bool {
        self.reached() || self.first_reached_at().is_some()
    }
}

impl CompletionRecord for QuizResult {
    fn reached(&self) -> bool {
        self.passed
    }

    fn first_reached_at(&self) -> Option<DateTime<Utc>> {
        self.first_passed_at
    }
}

impl CompletionRecord for ChapterProgress {
    fn reached(&self) -> bool {
        self.completed
    }

    fn first_reached_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// Record a quiz attempt. The latest attempt overwrites score and pass flag.
pub async fn record_quiz_attempt(
    conn: &mut PgConnection,
    user_id: i64,
    quiz: &Quiz,
    score: i32,
) -> LedgerResult<Tracked<QuizResult>> {
    let passed = score >= quiz.pass_score;
    let attempted_at = Utc::now();

    let prior = sqlx::query_as::<_, QuizResult>(
        r#"
        SELECT user_id, quiz_id, score, passed, attempted_at, first_passed_at
        FROM quiz_results
        WHERE user_id = $1 AND quiz_id = $2
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(quiz.id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut current = sqlx::query_as::<_, QuizResult>(
        r#"
        INSERT INTO quiz_results (user_id, quiz_id, score, passed, attempted_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, quiz_id) DO UPDATE
        SET score = EXCLUDED.score,
            passed = EXCLUDED.passed,
            attempted_at = EXCLUDED.attempted_at
        RETURNING user_id, quiz_id, score, passed, attempted_at, first_passed_at
        "#,
    )
    .bind(user_id)
    .bind(quiz.id)
    .bind(score)
    .bind(passed)
    .bind(attempted_at)
    .fetch_one(&mut *conn)
    .await?;

    let marker_seen = current.first_passed_at.is_some();
    let mut claim_lost = false;
    if current.passed && !marker_seen {
        let claimed = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE quiz_results
            SET first_passed_at = $3
            WHERE user_id = $1 AND quiz_id = $2 AND first_passed_at IS NULL
            RETURNING first_passed_at
            "#,
        )
        .bind(user_id)
        .bind(quiz.id)
        .bind(attempted_at)
        .fetch_optional(&mut *conn)
        .await?;

        match claimed {
            Some(at) => current.first_passed_at = Some(at),
            None => claim_lost = true,
        }
    }

    let transition = resolve_transition(
        prior.as_ref(),
        &current,
        marker_seen || claim_lost,
        UnitKind::Quiz,
        user_id,
        quiz.id,
    );

    debug!(
        "Quiz {} attempt by user {}: score={} passed={} transition={:?}",
        quiz.id, user_id, score, passed, transition
    );

    Ok(Tracked {
        prior,
        current,
        transition,
    })
}

/// Record chapter progress. Completion is sticky; playback position is not.
pub async fn record_chapter_progress(
    conn: &mut PgConnection,
    user_id: i64,
    chapter: &Chapter,
    completed: bool,
    current_time: f64,
) -> LedgerResult<Tracked<ChapterProgress>> {
    let watched_at = Utc::now();

    let prior = sqlx::query_as::<_, ChapterProgress>(
        r#"
        SELECT user_id, chapter_id, completed, current_time_secs, watched_at, completed_at
        FROM chapter_progress
        WHERE user_id = $1 AND chapter_id = $2
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(chapter.id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut current = sqlx::query_as::<_, ChapterProgress>(
        r#"
        INSERT INTO chapter_progress (user_id, chapter_id, completed, current_time_secs, watched_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, chapter_id) DO UPDATE
        SET completed = chapter_progress.completed OR EXCLUDED.completed,
            current_time_secs = EXCLUDED.current_time_secs,
            watched_at = EXCLUDED.watched_at
        RETURNING user_id, chapter_id, completed, current_time_secs, watched_at, completed_at
        "#,
    )
    .bind(user_id)
    .bind(chapter.id)
    .bind(completed)
    .bind(current_time)
    .bind(watched_at)
    .fetch_one(&mut *conn)
    .await?;

    let marker_seen = current.completed_at.is_some();
    let mut claim_lost = false;
    if current.completed && !marker_seen {
        let claimed = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE chapter_progress
            SET completed_at = $3
            WHERE user_id = $1 AND chapter_id = $2 AND completed_at IS NULL
            RETURNING completed_at
            "#,
        )
        .bind(user_id)
        .bind(chapter.id)
        .bind(watched_at)
        .fetch_optional(&mut *conn)
        .await?;

        match claimed {
            Some(at) => current.completed_at = Some(at),
            None => claim_lost = true,
        }
    }

    let transition = resolve_transition(
        prior.as_ref(),
        &current,
        marker_seen || claim_lost,
        UnitKind::Chapter,
        user_id,
        chapter.id,
    );

    debug!(
        "Chapter {} progress for user {}: completed={} position={} transition={:?}",
        chapter.id, user_id, current.completed, current.current_time, transition
    );

    Ok(Tracked {
        prior,
        current,
        transition,
    })
}

/// Derive the transition from the record read before the write.
///
/// `marker_taken` is true when the first-reached marker was already set by the
/// time this request wrote, or when the compare-and-swap on it failed. If the
/// prior read did not show the unit as reached, a concurrent request won the
/// race and its grant stands.
fn resolve_transition<R: CompletionRecord>(
    prior: Option<&R>,
    current: &R,
    marker_taken: bool,
    kind: UnitKind,
    user_id: i64,
    unit_id: i64,
) -> Transition {
    let mut prior_state = match prior {
        None => CompletionState::Absent,
        Some(record) if record.ever_reached() => CompletionState::Reached,
        Some(_) => CompletionState::Pending,
    };

    if prior_state != CompletionState::Reached && marker_taken {
        info!(
            "Concurrent completion of {} {} for user {}; keeping the other request's grant",
            kind, unit_id, user_id
        );
        prior_state = CompletionState::Reached;
    }

    let current_state = if current.reached() {
        CompletionState::Reached
    } else {
        CompletionState::Pending
    };

    Transition {
        prior: prior_state,
        current: current_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool, first_passed: bool) -> QuizResult {
        QuizResult {
            user_id: 1,
            quiz_id: 2,
            score: if passed { 80 } else { 40 },
            passed,
            attempted_at: Utc::now(),
            first_passed_at: first_passed.then(Utc::now),
        }
    }

    fn resolve(prior: Option<&QuizResult>, current: &QuizResult, taken: bool) -> Transition {
        resolve_transition(prior, current, taken, UnitKind::Quiz, 1, 2)
    }

    #[test]
    fn test_first_attempt() {
        let t = resolve(None, &result(true, true), false);
        assert_eq!(t.prior, CompletionState::Absent);
        assert_eq!(t.current, CompletionState::Reached);

        let t = resolve(None, &result(false, false), false);
        assert_eq!(t.current, CompletionState::Pending);
    }

    #[test]
    fn test_failed_after_pass_is_still_reached() {
        let prior = result(false, true);
        assert!(prior.ever_reached());
        let t = resolve(Some(&prior), &result(true, true), true);
        assert_eq!(t.prior, CompletionState::Reached);
    }

    #[test]
    fn test_pending_prior() {
        let prior = result(false, false);
        let t = resolve(Some(&prior), &result(true, true), false);
        assert_eq!(t.prior, CompletionState::Pending);
        assert_eq!(t.current, CompletionState::Reached);
    }

    #[test]
    fn test_lost_race_reports_reached() {
        // prior read saw nothing, but another request set the marker first
        let t = resolve(None, &result(true, true), true);
        assert_eq!(t.prior, CompletionState::Reached);
        assert_eq!(t.current, CompletionState::Reached);
    }

    #[test]
    fn test_chapter_record_view() {
        let progress = ChapterProgress {
            user_id: 1,
            chapter_id: 3,
            completed: true,
            current_time: 512.5,
            watched_at: Utc::now(),
            completed_at: None,
        };
        assert!(progress.reached());
        assert!(progress.ever_reached());
        assert!(progress.first_reached_at().is_none());
    }
}
