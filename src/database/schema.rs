use crate::error::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Creates the quiz history table and its index when missing.
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database structures");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quiz_sessions (
            id TEXT PRIMARY KEY,
            generation_session_id TEXT NOT NULL,
            words TEXT NOT NULL,
            score INTEGER NOT NULL,
            max_score INTEGER NOT NULL,
            percentage REAL NOT NULL,
            graded_answers TEXT NOT NULL,
            duration_seconds INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quiz_sessions_created_at ON quiz_sessions (created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
