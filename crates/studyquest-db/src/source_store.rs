//! Direct reads of the XP sources, plus the writes the study-plan and
//! identity flows own.
//!
//! [`SourceStore::read_sources`] is the fallback path: it reads the three
//! sources without going through `calculate_xp`, in a single statement so
//! all three come from one snapshot. The same statement runs inside the
//! XP snapshot and verified-write transactions.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use studyquest_types::{PlanId, UserId, XpSources};
use uuid::Uuid;

use crate::error::DbError;

/// Reads XP sources and manages the rows behind them.
pub struct SourceStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SourceStore<'a> {
    /// Create a new source store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read all three XP sources for a user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn read_sources(&self, user_id: UserId) -> Result<XpSources, DbError> {
        read_sources_with(self.pool, user_id).await
    }

    /// Create or rename a user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_user(&self, user_id: UserId, username: &str) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO users (id, username) VALUES ($1, $2)
              ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username",
        )
        .bind(user_id.into_inner())
        .bind(username)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Create a current study plan.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn create_plan(&self, user_id: UserId, title: &str) -> Result<PlanId, DbError> {
        let plan_id = PlanId::new();
        sqlx::query("INSERT INTO study_plans (id, user_id, title) VALUES ($1, $2, $3)")
            .bind(plan_id.into_inner())
            .bind(user_id.into_inner())
            .bind(title)
            .execute(self.pool)
            .await?;
        Ok(plan_id)
    }

    /// Mark a plan day completed, creating the day row if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn complete_day(
        &self,
        plan_id: PlanId,
        day_number: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO study_plan_days (id, plan_id, day_number, is_completed, completed_at)
              VALUES ($1, $2, $3, TRUE, $4)
              ON CONFLICT (plan_id, day_number)
              DO UPDATE SET is_completed = TRUE, completed_at = EXCLUDED.completed_at",
        )
        .bind(Uuid::now_v7())
        .bind(plan_id.into_inner())
        .bind(crate::event_store::to_i32(day_number, "day_number")?)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Archive a plan, recording the XP it earned.
    ///
    /// Returns `false` if no such plan exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn archive_plan(
        &self,
        plan_id: PlanId,
        xp_earned: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE study_plans
              SET is_archived = TRUE, xp_earned = $2, archived_at = $3
              WHERE id = $1",
        )
        .bind(plan_id.into_inner())
        .bind(xp_earned)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Read the three XP sources on any executor, pool or open transaction.
pub(crate) async fn read_sources_with<'e, E>(executor: E, user_id: UserId) -> Result<XpSources, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SourcesRow>(
        r"SELECT
              COALESCE((SELECT SUM(xp_earned) FROM participations WHERE user_id = $1), 0)::BIGINT
                  AS event_xp,
              COALESCE((SELECT SUM(xp_earned) FROM study_plans
                        WHERE user_id = $1 AND is_archived), 0)::BIGINT
                  AS archived_plan_xp,
              (SELECT COUNT(*) FROM study_plan_days d
               JOIN study_plans p ON p.id = d.plan_id
               WHERE p.user_id = $1 AND NOT p.is_archived AND d.is_completed)
                  AS active_plan_completed_days",
    )
    .bind(user_id.into_inner())
    .fetch_one(executor)
    .await?;

    Ok(XpSources {
        event_xp: row.event_xp,
        archived_plan_xp: row.archived_plan_xp,
        active_plan_completed_days: row.active_plan_completed_days,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct SourcesRow {
    event_xp: i64,
    archived_plan_xp: i64,
    active_plan_completed_days: i64,
}
