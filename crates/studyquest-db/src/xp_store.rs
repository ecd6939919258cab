//! Operations on the `xp_records` table and the `calculate_xp` function.
//!
//! Snapshots run `calculate_xp` and the source read in one `REPEATABLE
//! READ` transaction. Writes take a per-user transaction-scoped advisory
//! lock, so writers for one user are serialized even before the row exists,
//! and re-read the sources under that lock before overwriting the total.
//!
//! Leaderboard queries use the same total order as
//! [`studyquest_xp::leaderboard_order`]: `total_xp DESC, updated_at ASC,
//! user_id ASC`. The `xp_records_leaderboard_idx` index covers it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use studyquest_core::XpWrite;
use studyquest_types::{UserId, XpRecord, XpSources};
use uuid::Uuid;

use crate::error::DbError;
use crate::source_store::read_sources_with;

/// Operations on XP records.
pub struct XpStore<'a> {
    pool: &'a PgPool,
}

impl<'a> XpStore<'a> {
    /// Create a new XP store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Call the store-side aggregate and read the sources it sums, both
    /// from one snapshot.
    ///
    /// The inner result carries a failed source read; the aggregate's value
    /// stands regardless.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the aggregate call fails, including
    /// when the function does not exist.
    pub async fn snapshot(
        &self,
        user_id: UserId,
    ) -> Result<(i64, Result<XpSources, DbError>), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let primary: i64 = sqlx::query_scalar("SELECT calculate_xp($1)")
            .bind(user_id.into_inner())
            .fetch_one(&mut *tx)
            .await?;
        let sources = read_sources_with(&mut *tx, user_id).await;
        if sources.is_ok() {
            tx.commit().await?;
        }
        Ok((primary, sources))
    }

    /// Create or overwrite a user's total.
    ///
    /// With a `basis`, the sources are re-read under the user's write lock
    /// and nothing is written if they differ. The username is resolved from
    /// `users`, falling back to the user ID. `updated_at` moves only when
    /// the total changes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the lock, the re-read or the upsert
    /// fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        total_xp: i64,
        basis: Option<XpSources>,
        now: DateTime<Utc>,
    ) -> Result<XpWrite, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended(($1::UUID)::TEXT, 0))")
            .bind(user_id.into_inner())
            .execute(&mut *tx)
            .await?;

        if let Some(basis) = basis {
            let current = read_sources_with(&mut *tx, user_id).await?;
            if current != basis {
                tx.rollback().await?;
                tracing::debug!(%user_id, total_xp, "XP sources moved, upsert skipped");
                return Ok(XpWrite::SourcesMoved);
            }
        }

        let row = sqlx::query_as::<_, XpRecordRow>(
            r"INSERT INTO xp_records (user_id, username, total_xp, updated_at)
              VALUES ($1, COALESCE((SELECT username FROM users WHERE id = $1), $1::TEXT), $2, $3)
              ON CONFLICT (user_id) DO UPDATE SET
                  username = EXCLUDED.username,
                  total_xp = EXCLUDED.total_xp,
                  updated_at = CASE
                      WHEN xp_records.total_xp = EXCLUDED.total_xp THEN xp_records.updated_at
                      ELSE EXCLUDED.updated_at
                  END
              RETURNING user_id, username, total_xp, updated_at",
        )
        .bind(user_id.into_inner())
        .bind(total_xp)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(%user_id, total_xp, "Upserted XP record");
        Ok(XpWrite::Committed(row.into()))
    }

    /// A user's record, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Option<XpRecord>, DbError> {
        let row = sqlx::query_as::<_, XpRecordRow>(
            "SELECT user_id, username, total_xp, updated_at FROM xp_records WHERE user_id = $1",
        )
        .bind(user_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Up to `limit` records with positive XP in leaderboard order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn top(&self, limit: usize) -> Result<Vec<XpRecord>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, XpRecordRow>(
            r"SELECT user_id, username, total_xp, updated_at
              FROM xp_records
              WHERE total_xp > 0
              ORDER BY total_xp DESC, updated_at ASC, user_id ASC
              LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count ranked records ahead of `target` in leaderboard order.
    ///
    /// A missing or zero-XP target is behind every ranked record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count_ahead(&self, target: Option<&XpRecord>) -> Result<u64, DbError> {
        let count: i64 = match target.filter(|t| t.total_xp > 0) {
            Some(t) => {
                sqlx::query_scalar(
                    r"SELECT COUNT(*) FROM xp_records
                      WHERE total_xp > 0
                        AND user_id <> $1
                        AND (total_xp > $2
                             OR (total_xp = $2 AND updated_at < $3)
                             OR (total_xp = $2 AND updated_at = $3 AND user_id < $1))",
                )
                .bind(t.user_id.into_inner())
                .bind(t.total_xp)
                .bind(t.updated_at)
                .fetch_one(self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM xp_records WHERE total_xp > 0")
                    .fetch_one(self.pool)
                    .await?
            }
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Total number of records.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM xp_records")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// A row from the `xp_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct XpRecordRow {
    /// Owning user.
    pub user_id: Uuid,
    /// Display name at last recompute.
    pub username: String,
    /// XP total.
    pub total_xp: i64,
    /// When `total_xp` last changed.
    pub updated_at: DateTime<Utc>,
}

impl From<XpRecordRow> for XpRecord {
    fn from(row: XpRecordRow) -> Self {
        Self {
            user_id: row.user_id.into(),
            username: row.username,
            total_xp: row.total_xp,
            updated_at: row.updated_at,
        }
    }
}
