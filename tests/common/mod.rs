// Shared fixtures for store-backed tests
//
// Store-backed tests need a Postgres instance; they run when
// TEST_DATABASE_URL is set and print a skip notice otherwise. Run
// `cargo test -- --nocapture` to see which ones were skipped.

#![allow(dead_code)]

use lms_backend::database::{Database, DbPool};
use lms_backend::models::Role;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQ: AtomicU64 = AtomicU64::new(0);

pub async fn test_pool() -> Option<DbPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("skipped: TEST_DATABASE_URL is not set, store-backed test did not run");
        return None;
    };
    let pool = Database::init(&url, 10)
        .await
        .expect("failed to initialize test database");
    Some(pool)
}

fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{}-{}-{}",
        std::process::id(),
        nanos,
        SEQ.fetch_add(1, Ordering::SeqCst)
    )
}

pub async fn create_user(pool: &DbPool, role: Role) -> i64 {
    let suffix = unique_suffix();
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, name, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("user-{}@example.com", suffix))
    .bind(format!("User {}", suffix))
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert user")
}

pub async fn create_chapter(pool: &DbPool, title: &str, coin_value: i32) -> i64 {
    let course_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO courses (title) VALUES ($1) RETURNING id",
    )
    .bind(format!("Course {}", unique_suffix()))
    .fetch_one(pool)
    .await
    .expect("insert course");

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO chapters (course_id, title, coin_value) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(course_id)
    .bind(title)
    .bind(coin_value)
    .fetch_one(pool)
    .await
    .expect("insert chapter")
}

pub async fn create_quiz(pool: &DbPool, title: &str, pass_score: i32, coin_value: i32) -> i64 {
    let chapter_id = create_chapter(pool, &format!("{} chapter", title), 0).await;

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes (chapter_id, title, pass_score, coin_value) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(chapter_id)
    .bind(title)
    .bind(pass_score)
    .bind(coin_value)
    .fetch_one(pool)
    .await
    .expect("insert quiz")
}

pub async fn coins_earned(pool: &DbPool, user_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT coins_earned FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("query user")
}

/// Balance stored on the wallet row, or None when no wallet exists.
pub async fn wallet_balance(pool: &DbPool, user_id: i64) -> Option<i64> {
    sqlx::query_scalar::<_, i64>("SELECT balance FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .expect("query wallet")
}

/// Signed sum of the user's ledger entries.
pub async fn ledger_sum(pool: &DbPool, user_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(CASE WHEN t.type = 'EARNED' THEN t.amount ELSE -t.amount END), 0)::BIGINT
        FROM transactions t
        JOIN wallets w ON w.id = t.wallet_id
        WHERE w.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("sum ledger")
}

pub async fn transaction_count(pool: &DbPool, user_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transactions t JOIN wallets w ON w.id = t.wallet_id WHERE w.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count transactions")
}

pub async fn assert_ledger_invariant(pool: &DbPool, user_id: i64) {
    let balance = wallet_balance(pool, user_id).await.unwrap_or(0);
    assert_eq!(
        balance,
        ledger_sum(pool, user_id).await,
        "wallet balance must equal the signed ledger sum"
    );
}
