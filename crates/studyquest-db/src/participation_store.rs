//! Operations on the `participations` table.
//!
//! Rows are written once and never updated. The
//! `participations_event_user_key` constraint is what rejects a second
//! attempt; callers detect it with [`DbError::is_unique_violation`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use studyquest_core::NewParticipation;
use studyquest_types::{Answer, EventId, Participation, ParticipationId, UserId};
use uuid::Uuid;

use crate::error::DbError;
use crate::event_store::{to_i32, to_u32};

/// Operations on participations.
pub struct ParticipationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ParticipationStore<'a> {
    /// Create a new participation store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether a row exists for the pair.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn exists(&self, event_id: EventId, user_id: UserId) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM participations WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a participation as one atomic single-row write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails; a duplicate pair
    /// surfaces as a unique violation.
    pub async fn insert(&self, new: NewParticipation) -> Result<Participation, DbError> {
        let row = sqlx::query_as::<_, ParticipationRow>(
            r"INSERT INTO participations (id, event_id, user_id, answers, score, total_questions,
                                          time_taken_minutes, xp_earned, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
              RETURNING id, event_id, user_id, answers, score, total_questions,
                        time_taken_minutes, xp_earned, completed_at",
        )
        .bind(ParticipationId::new().into_inner())
        .bind(new.event_id.into_inner())
        .bind(new.user_id.into_inner())
        .bind(serde_json::to_value(&new.answers)?)
        .bind(to_i32(new.score, "score")?)
        .bind(to_i32(new.total_questions, "total_questions")?)
        .bind(to_i32(new.time_taken_minutes, "time_taken_minutes")?)
        .bind(new.xp_earned)
        .bind(new.completed_at)
        .fetch_one(self.pool)
        .await?;

        row.into_participation()
    }
}

/// A row from the `participations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipationRow {
    /// Participation ID.
    pub id: Uuid,
    /// Event attempted.
    pub event_id: Uuid,
    /// Submitting user.
    pub user_id: Uuid,
    /// Answers as JSONB.
    pub answers: serde_json::Value,
    /// Correct answers.
    pub score: i32,
    /// Questions at submission time.
    pub total_questions: i32,
    /// Self-reported time.
    pub time_taken_minutes: i32,
    /// XP earned.
    pub xp_earned: i64,
    /// Submission time.
    pub completed_at: DateTime<Utc>,
}

impl ParticipationRow {
    /// Convert into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] for malformed answers or
    /// [`DbError::Corrupt`] for negative counters.
    pub fn into_participation(self) -> Result<Participation, DbError> {
        let answers: Vec<Answer> = serde_json::from_value(self.answers)?;
        Ok(Participation {
            id: self.id.into(),
            event_id: self.event_id.into(),
            user_id: self.user_id.into(),
            answers,
            score: to_u32(self.score, "score")?,
            total_questions: to_u32(self.total_questions, "total_questions")?,
            time_taken_minutes: to_u32(self.time_taken_minutes, "time_taken_minutes")?,
            xp_earned: self.xp_earned,
            completed_at: self.completed_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn row_decodes_tagged_answers() {
        let row = ParticipationRow {
            id: Uuid::now_v7(),
            event_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            answers: serde_json::json!([
                { "type": "choice", "value": 1 },
                { "type": "text", "value": "photosynthesis" },
                { "type": "skipped" }
            ]),
            score: 1,
            total_questions: 3,
            time_taken_minutes: 7,
            xp_earned: 17,
            completed_at: Utc::now(),
        };
        let participation = row.into_participation().unwrap();
        assert_eq!(
            participation.answers,
            vec![
                Answer::Choice(1),
                Answer::Text("photosynthesis".to_owned()),
                Answer::Skipped,
            ]
        );
        assert_eq!(participation.xp_earned, 17);
    }
}
