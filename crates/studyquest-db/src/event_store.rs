//! Operations on the `events` and `event_questions` tables.
//!
//! The engine only ever rewrites `status`, `is_enabled`, and `updated_at`.
//! [`EventStore::insert_event`] and [`EventStore::insert_questions`] stand
//! in for the external authoring flow in tests and seed scripts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use studyquest_types::{Event, EventId, EventStatus, Question, QuestionAnswerKind};
use uuid::Uuid;

use crate::error::DbError;

const EVENT_COLUMNS: &str = "id, title, description, category, start_time, duration_minutes, \
     xp_reward, is_enabled, status::TEXT AS status, created_at, updated_at";

/// Operations on the event catalog.
pub struct EventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All events ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Corrupt`] if a row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY start_time, id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// A single event.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Corrupt`] if the row cannot be decoded.
    pub async fn get(&self, event_id: EventId) -> Result<Option<Event>, DbError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(event_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        row.map(EventRow::into_event).transpose()
    }

    /// Overwrite the cached status. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_status(
        &self,
        event_id: EventId,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE events SET status = $2::event_status, updated_at = $3 WHERE id = $1",
        )
        .bind(event_id.into_inner())
        .bind(status.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the kill switch. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_enabled(
        &self,
        event_id: EventId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE events SET is_enabled = $2, updated_at = $3 WHERE id = $1")
            .bind(event_id.into_inner())
            .bind(enabled)
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// An event's questions in position order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Serialization`] if an answer kind cannot be decoded.
    pub async fn questions(&self, event_id: EventId) -> Result<Vec<Question>, DbError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r"SELECT id, event_id, position, prompt, answer
              FROM event_questions
              WHERE event_id = $1
              ORDER BY position",
        )
        .bind(event_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(QuestionRow::into_question).collect()
    }

    /// Insert an event row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails, or
    /// [`DbError::Corrupt`] if `duration_minutes` does not fit the column.
    pub async fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO events (id, title, description, category, start_time, duration_minutes,
                                  xp_reward, is_enabled, status, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::event_status, $10, $11)",
        )
        .bind(event.id.into_inner())
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.category)
        .bind(event.start_time)
        .bind(to_i32(event.duration_minutes, "duration_minutes")?)
        .bind(event.xp_reward)
        .bind(event.is_enabled)
        .bind(event.status.as_str())
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(event_id = %event.id, "Inserted event");
        Ok(())
    }

    /// Insert an event's questions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any insert fails.
    pub async fn insert_questions(&self, questions: &[Question]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for question in questions {
            sqlx::query(
                r"INSERT INTO event_questions (id, event_id, position, prompt, answer)
                  VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(question.id.into_inner())
            .bind(question.event_id.into_inner())
            .bind(to_i32(question.position, "position")?)
            .bind(&question.prompt)
            .bind(serde_json::to_value(&question.answer)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event ID.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Subject category.
    pub category: String,
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window length.
    pub duration_minutes: i32,
    /// XP for a perfect score.
    pub xp_reward: i64,
    /// Kill switch.
    pub is_enabled: bool,
    /// Cached status as text (cast from the `PostgreSQL` enum).
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    /// Convert into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] for an unknown status or a negative
    /// duration.
    pub fn into_event(self) -> Result<Event, DbError> {
        let status = EventStatus::parse(&self.status)
            .ok_or_else(|| DbError::Corrupt(format!("event {}: status {:?}", self.id, self.status)))?;
        Ok(Event {
            id: EventId::from(self.id),
            title: self.title,
            description: self.description,
            category: self.category,
            start_time: self.start_time,
            duration_minutes: to_u32(self.duration_minutes, "duration_minutes")?,
            xp_reward: self.xp_reward,
            is_enabled: self.is_enabled,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row from the `event_questions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionRow {
    /// Question ID.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// 0-based position.
    pub position: i32,
    /// Prompt text.
    pub prompt: String,
    /// Tagged answer kind.
    pub answer: serde_json::Value,
}

impl QuestionRow {
    /// Convert into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the answer kind is malformed,
    /// or [`DbError::Corrupt`] for a negative position.
    pub fn into_question(self) -> Result<Question, DbError> {
        let answer: QuestionAnswerKind = serde_json::from_value(self.answer)?;
        Ok(Question {
            id: self.id.into(),
            event_id: self.event_id.into(),
            position: to_u32(self.position, "position")?,
            prompt: self.prompt,
            answer,
        })
    }
}

/// Narrow a `u32` into an `INTEGER` column.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|e| DbError::Corrupt(format!("{column} {value}: {e}")))
}

/// Widen an `INTEGER` column into a `u32`, rejecting negatives.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|e| DbError::Corrupt(format!("{column} {value}: {e}")))
}
