use crate::database::store::{LogOutcome, ProctorStore};
use crate::error::{Error, Result};
use crate::models::cheating_event::CheatingEvent;
use crate::models::event_weight::DEFAULT_EVENT_WEIGHT;
use crate::models::exam_attempt::{AttemptStanding, AttemptStatus, ExamAttempt};
use crate::services::scoring_service::ScoringService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn not_found(attempt_id: Uuid) -> Error {
    Error::NotFound(format!("Attempt {} not found", attempt_id))
}

#[async_trait]
impl ProctorStore for PgStore {
    async fn create_attempt(
        &self,
        user_id: &str,
        exam_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt> {
        let attempt = sqlx::query_as::<_, ExamAttempt>(
            r#"
            INSERT INTO exam_attempts (id, user_id, exam_id, cheating_score, status, started_at)
            VALUES ($1, $2, $3, 0, 'ONGOING', $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(exam_id)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ExamAttempt> {
        sqlx::query_as::<_, ExamAttempt>(r#"SELECT * FROM exam_attempts WHERE id = $1"#)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(attempt_id))
    }

    async fn list_attempts(&self) -> Result<Vec<ExamAttempt>> {
        let rows = sqlx::query_as::<_, ExamAttempt>(
            r#"SELECT * FROM exam_attempts ORDER BY started_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_events(&self, attempt_id: Uuid) -> Result<Vec<CheatingEvent>> {
        let rows = sqlx::query_as::<_, CheatingEvent>(
            r#"SELECT * FROM cheating_events WHERE attempt_id = $1 ORDER BY created_at ASC, id ASC"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_score_and_status(&self, attempt_id: Uuid) -> Result<AttemptStanding> {
        let row: Option<(i32, String)> = sqlx::query_as(
            r#"SELECT cheating_score, status FROM exam_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        let (score, status) = row.ok_or_else(|| not_found(attempt_id))?;
        Ok(AttemptStanding {
            score,
            status: status.parse()?,
        })
    }

    async fn log_events(
        &self,
        attempt_id: Uuid,
        event_types: &[String],
        at: DateTime<Utc>,
        close_with: Option<AttemptStatus>,
    ) -> Result<LogOutcome> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i32, String)> = sqlx::query_as(
            r#"SELECT cheating_score, status FROM exam_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (mut score, status) = row.ok_or_else(|| not_found(attempt_id))?;
        let mut status: AttemptStatus = status.parse()?;

        if status.is_closed() {
            tx.rollback().await?;
            return Ok(LogOutcome::Skipped(AttemptStanding { score, status }));
        }

        let mut events = Vec::with_capacity(event_types.len());
        for event_type in event_types {
            let weight: Option<i32> =
                sqlx::query_scalar(r#"SELECT weight FROM event_weights WHERE event_type = $1"#)
                    .bind(event_type)
                    .fetch_optional(&mut *tx)
                    .await?;
            let weight = weight.unwrap_or(DEFAULT_EVENT_WEIGHT);

            let event = sqlx::query_as::<_, CheatingEvent>(
                r#"
                INSERT INTO cheating_events (attempt_id, event_type, weight, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(attempt_id)
            .bind(event_type)
            .bind(weight)
            .bind(at)
            .fetch_one(&mut *tx)
            .await?;

            score = sqlx::query_scalar(
                r#"
                UPDATE exam_attempts
                SET cheating_score = cheating_score + $1
                WHERE id = $2
                RETURNING cheating_score
                "#,
            )
            .bind(weight)
            .bind(attempt_id)
            .fetch_one(&mut *tx)
            .await?;

            events.push(event);
        }

        if let Some(closed) = close_with {
            sqlx::query(r#"UPDATE exam_attempts SET status = $1 WHERE id = $2"#)
                .bind(closed.as_str())
                .bind(attempt_id)
                .execute(&mut *tx)
                .await?;
            status = closed;
        }

        tx.commit().await?;

        Ok(LogOutcome::Logged {
            events,
            standing: AttemptStanding { score, status },
        })
    }

    async fn set_status(&self, attempt_id: Uuid, status: AttemptStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE exam_attempts SET status = $1 WHERE id = $2 AND status = 'ONGOING'"#,
        )
        .bind(status.as_str())
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish an unknown id from a lost race.
            self.get_score_and_status(attempt_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn end_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<ExamAttempt> {
        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, ExamAttempt>(
            r#"SELECT * FROM exam_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(attempt_id))?;

        let current = attempt.attempt_status()?;
        if current.is_closed() {
            tx.rollback().await?;
            return Err(Error::AlreadyTerminal(attempt_id, current.to_string()));
        }

        let final_status = ScoringService::final_status(attempt.cheating_score);
        let ended = sqlx::query_as::<_, ExamAttempt>(
            r#"
            UPDATE exam_attempts
            SET status = $1, ended_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(final_status.as_str())
        .bind(at)
        .bind(attempt_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ended)
    }

    async fn get_embedding(&self, attempt_id: Uuid) -> Result<Option<Vec<f32>>> {
        let row: Option<(Option<Vec<f32>>,)> =
            sqlx::query_as(r#"SELECT face_embedding FROM exam_attempts WHERE id = $1"#)
                .bind(attempt_id)
                .fetch_optional(&self.pool)
                .await?;
        let (embedding,) = row.ok_or_else(|| not_found(attempt_id))?;
        Ok(embedding)
    }

    async fn set_embedding(&self, attempt_id: Uuid, embedding: &[f32]) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE exam_attempts SET face_embedding = $1 WHERE id = $2 AND face_embedding IS NULL"#,
        )
        .bind(embedding)
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.get_score_and_status(attempt_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn flag_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE exam_attempts
            SET status = 'FLAGGED'
            WHERE status = 'ONGOING'
              AND ended_at IS NULL
              AND started_at < $1
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
