use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz_session::{GradedAnswer, QuizSessionRecord};
use crate::services::grading_service::GradeSummary;

#[derive(Debug, Serialize)]
pub struct PaginatedQuizSessions {
    #[serde(rename = "items")]
    pub sessions: Vec<QuizSessionRecord>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone)]
pub struct NewQuizSession {
    pub generation_session_id: Uuid,
    pub words: Vec<String>,
    pub summary: GradeSummary,
    pub duration_seconds: Option<i64>,
}

#[derive(Clone)]
pub struct HistoryService {
    pool: SqlitePool,
}

impl HistoryService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, new: NewQuizSession) -> Result<QuizSessionRecord> {
        let record = QuizSessionRecord {
            id: Uuid::new_v4(),
            generation_session_id: new.generation_session_id,
            words: new.words,
            score: new.summary.score,
            max_score: new.summary.max_score,
            percentage: new.summary.percentage,
            graded_answers: new.summary.graded,
            duration_seconds: new.duration_seconds,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (
                id, generation_session_id, words, score, max_score,
                percentage, graded_answers, duration_seconds, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.generation_session_id.to_string())
        .bind(serde_json::to_string(&record.words)?)
        .bind(record.score)
        .bind(record.max_score)
        .bind(record.percentage)
        .bind(serde_json::to_string(&record.graded_answers)?)
        .bind(record.duration_seconds)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            quiz_session_id = %record.id,
            generation_session_id = %record.generation_session_id,
            score = record.score,
            max_score = record.max_score,
            "quiz session recorded"
        );

        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<QuizSessionRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, generation_session_id, words, score, max_score,
                   percentage, graded_answers, duration_seconds, created_at
            FROM quiz_sessions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        record_from_row(&row)
    }

    pub async fn list(&self, page: i64, per_page: i64) -> Result<PaginatedQuizSessions> {
        let offset = (page - 1) * per_page;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_sessions")
            .fetch_one(&self.pool)
            .await?;

        let total_pages = if per_page > 0 {
            ((total as f64) / (per_page as f64)).ceil() as i64
        } else {
            1
        };

        let rows = sqlx::query(
            r#"
            SELECT id, generation_session_id, words, score, max_score,
                   percentage, graded_answers, duration_seconds, created_at
            FROM quiz_sessions
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let sessions = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(PaginatedQuizSessions {
            sessions,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quiz_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<QuizSessionRecord> {
    let words: String = row.try_get("words")?;
    let graded: String = row.try_get("graded_answers")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(QuizSessionRecord {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        generation_session_id: parse_uuid(&row.try_get::<String, _>("generation_session_id")?)?,
        words: serde_json::from_str(&words)?,
        score: row.try_get("score")?,
        max_score: row.try_get("max_score")?,
        percentage: row.try_get("percentage")?,
        graded_answers: serde_json::from_str::<Vec<GradedAnswer>>(&graded)?,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Corrupt id '{}' in history: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::connect;
    use crate::database::schema::initialize_database;
    use crate::models::section::SectionKind;

    async fn setup_test_db() -> SqlitePool {
        let pool = connect("sqlite::memory:").await.expect("Failed to create test pool");
        initialize_database(&pool).await.expect("Failed to create schema");
        pool
    }

    fn new_session(score: i64) -> NewQuizSession {
        NewQuizSession {
            generation_session_id: Uuid::new_v4(),
            words: vec!["vivid".into(), "stoic".into()],
            summary: GradeSummary {
                score,
                max_score: 2,
                percentage: score as f64 * 50.0,
                graded: vec![GradedAnswer {
                    section: SectionKind::SentenceFillIn,
                    question_id: 1,
                    word: "vivid".into(),
                    prompt: "A ____ dream.".into(),
                    submitted_answer: serde_json::json!("vivid"),
                    correct_answer: "vivid".into(),
                    is_correct: true,
                    points_earned: 1,
                    max_points: 1,
                }],
            },
            duration_seconds: Some(42),
        }
    }

    #[tokio::test]
    async fn record_then_get_round_trips() {
        let service = HistoryService::new(setup_test_db().await);

        let saved = service.record(new_session(1)).await.unwrap();
        let loaded = service.get(saved.id).await.unwrap();

        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.generation_session_id, saved.generation_session_id);
        assert_eq!(loaded.words, vec!["vivid", "stoic"]);
        assert_eq!(loaded.score, 1);
        assert_eq!(loaded.percentage, 50.0);
        assert_eq!(loaded.graded_answers, saved.graded_answers);
        assert_eq!(loaded.duration_seconds, Some(42));
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let service = HistoryService::new(setup_test_db().await);
        let first = service.record(new_session(0)).await.unwrap();
        let second = service.record(new_session(2)).await.unwrap();

        let page = service.list(1, 1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].id, second.id);

        let page = service.list(2, 1).await.unwrap();
        assert_eq!(page.sessions[0].id, first.id);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let service = HistoryService::new(setup_test_db().await);
        let saved = service.record(new_session(2)).await.unwrap();

        assert!(service.delete(saved.id).await.unwrap());
        assert!(matches!(service.get(saved.id).await, Err(Error::NotFound(_))));
        assert!(!service.delete(saved.id).await.unwrap());
    }
}
