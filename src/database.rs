// Database layer for the LMS rewards backend

use crate::models::{Chapter, Quiz};
use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

pub type DbPool = Pool<Postgres>;

pub struct Database;

impl Database {
    /// Initialize database connection pool
    pub async fn init(database_url: &str, max_connections: u32) -> Result<DbPool> {
        info!("Connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        // Run migrations
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(pool)
    }

    pub async fn user_exists(pool: &DbPool, user_id: i64) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_quiz(pool: &DbPool, quiz_id: i64) -> sqlx::Result<Option<Quiz>> {
        sqlx::query_as::<_, Quiz>(
            "SELECT id, chapter_id, title, pass_score, coin_value FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_chapter(pool: &DbPool, chapter_id: i64) -> sqlx::Result<Option<Chapter>> {
        sqlx::query_as::<_, Chapter>(
            "SELECT id, course_id, title, coin_value FROM chapters WHERE id = $1",
        )
        .bind(chapter_id)
        .fetch_optional(pool)
        .await
    }
}
