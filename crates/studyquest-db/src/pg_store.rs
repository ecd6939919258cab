//! [`GamificationStore`] backed by `PostgreSQL`.

use chrono::{DateTime, Utc};
use studyquest_core::{GamificationStore, NewParticipation, StoreError, XpSnapshot, XpWrite};
use studyquest_types::{
    Event, EventId, EventStatus, Participation, Question, UserId, XpRecord, XpSources,
};

use crate::event_store::EventStore;
use crate::participation_store::ParticipationStore;
use crate::postgres::PostgresPool;
use crate::source_store::SourceStore;
use crate::xp_store::XpStore;

/// The production store: each trait method delegates to one table store.
#[derive(Debug, Clone)]
pub struct PgGamificationStore {
    pool: PostgresPool,
}

impl PgGamificationStore {
    /// Wrap a connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    fn events(&self) -> EventStore<'_> {
        EventStore::new(self.pool.pool())
    }

    fn participations(&self) -> ParticipationStore<'_> {
        ParticipationStore::new(self.pool.pool())
    }

    fn xp(&self) -> XpStore<'_> {
        XpStore::new(self.pool.pool())
    }

    fn sources(&self) -> SourceStore<'_> {
        SourceStore::new(self.pool.pool())
    }
}

impl GamificationStore for PgGamificationStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.events().list().await?)
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.events().get(event_id).await?)
    }

    async fn set_event_status(
        &self,
        event_id: EventId,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.events().set_status(event_id, status, now).await?)
    }

    async fn set_event_enabled(
        &self,
        event_id: EventId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.events().set_enabled(event_id, enabled, now).await?)
    }

    async fn get_questions(&self, event_id: EventId) -> Result<Vec<Question>, StoreError> {
        Ok(self.events().questions(event_id).await?)
    }

    async fn has_participated(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self.participations().exists(event_id, user_id).await?)
    }

    async fn insert_participation(
        &self,
        participation: NewParticipation,
    ) -> Result<Participation, StoreError> {
        Ok(self.participations().insert(participation).await?)
    }

    async fn read_xp_snapshot(&self, user_id: UserId) -> Result<XpSnapshot, StoreError> {
        let (primary, sources) = self.xp().snapshot(user_id).await?;
        Ok(XpSnapshot {
            primary,
            sources: sources.map_err(StoreError::from),
        })
    }

    async fn read_xp_sources(&self, user_id: UserId) -> Result<XpSources, StoreError> {
        Ok(self.sources().read_sources(user_id).await?)
    }

    async fn upsert_xp_record(
        &self,
        user_id: UserId,
        total_xp: i64,
        basis: Option<XpSources>,
        now: DateTime<Utc>,
    ) -> Result<XpWrite, StoreError> {
        Ok(self.xp().upsert(user_id, total_xp, basis, now).await?)
    }

    async fn get_xp_record(&self, user_id: UserId) -> Result<Option<XpRecord>, StoreError> {
        Ok(self.xp().get(user_id).await?)
    }

    async fn top_xp_records(&self, limit: usize) -> Result<Vec<XpRecord>, StoreError> {
        Ok(self.xp().top(limit).await?)
    }

    async fn count_ranked_ahead(&self, target: Option<&XpRecord>) -> Result<u64, StoreError> {
        Ok(self.xp().count_ahead(target).await?)
    }

    async fn count_xp_records(&self) -> Result<u64, StoreError> {
        Ok(self.xp().count().await?)
    }
}
