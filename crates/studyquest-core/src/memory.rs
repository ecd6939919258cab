//! In-memory [`GamificationStore`] implementation.
//!
//! Mirrors the `PostgreSQL` store's contract closely enough to exercise
//! every service path without a database:
//!
//! - participation inserts check-and-insert under one write lock, which is
//!   the in-process equivalent of the `UNIQUE(event_id, user_id)` index;
//! - XP snapshots read the aggregate and the sources under one read lock,
//!   and `calculate_xp` sums the sources independently of
//!   [`studyquest_xp::total_xp`], as the SQL function does;
//! - XP writes re-check their basis under the write lock;
//! - fault switches simulate an unavailable aggregate function, failing
//!   source reads, failing XP writes and a drifted aggregate. A gate can
//!   hold snapshot reads open to force interleavings.
//!
//! Study plans are written by an external flow in production; the
//! `add_plan` / `complete_plan_day` / `archive_plan` helpers stand in for it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use studyquest_types::{
    Event, EventId, EventStatus, Participation, ParticipationId, PlanId, Question, UserId,
    XpRecord, XpSources,
};
use studyquest_xp::ranking::{is_ranked, leaderboard_order, rank_among};
use tokio::sync::{Notify, RwLock};

use crate::error::StoreError;
use crate::store::{GamificationStore, NewParticipation, XpSnapshot, XpWrite};

/// A study plan as the XP sources see it.
#[derive(Debug, Clone)]
struct MemoryPlan {
    user_id: UserId,
    is_archived: bool,
    xp_earned: i64,
    completed_days: BTreeSet<u32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    events: BTreeMap<EventId, Event>,
    questions: BTreeMap<EventId, Vec<Question>>,
    participations: BTreeMap<(EventId, UserId), Participation>,
    xp_records: BTreeMap<UserId, XpRecord>,
    usernames: BTreeMap<UserId, String>,
    plans: BTreeMap<PlanId, MemoryPlan>,
}

/// Fault switches for exercising degraded paths.
#[derive(Debug, Default)]
struct Faults {
    aggregate_unavailable: AtomicBool,
    sources_unavailable: AtomicBool,
    xp_writes_unavailable: AtomicBool,
    catalog_unavailable: AtomicBool,
    aggregate_skew: AtomicI64,
    snapshot_gate: Mutex<Option<Arc<Notify>>>,
    snapshot_reads: AtomicUsize,
}

/// A [`GamificationStore`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    faults: Faults,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Add or replace an event.
    pub async fn insert_event(&self, event: Event) {
        self.state.write().await.events.insert(event.id, event);
    }

    /// Replace an event's question list. Questions are stored by position.
    pub async fn insert_questions(&self, event_id: EventId, mut questions: Vec<Question>) {
        questions.sort_by_key(|q| q.position);
        self.state.write().await.questions.insert(event_id, questions);
    }

    /// Register a display name, as the identity service would.
    pub async fn register_user(&self, user_id: UserId, username: &str) {
        self.state
            .write()
            .await
            .usernames
            .insert(user_id, username.to_owned());
    }

    /// Create a current (non-archived) study plan for a user.
    pub async fn add_plan(&self, user_id: UserId) -> PlanId {
        let plan_id = PlanId::new();
        self.state.write().await.plans.insert(
            plan_id,
            MemoryPlan {
                user_id,
                is_archived: false,
                xp_earned: 0,
                completed_days: BTreeSet::new(),
            },
        );
        plan_id
    }

    /// Mark one day of a plan complete. Returns `false` for unknown plans.
    pub async fn complete_plan_day(&self, plan_id: PlanId, day_number: u32) -> bool {
        self.state
            .write()
            .await
            .plans
            .get_mut(&plan_id)
            .is_some_and(|plan| {
                plan.completed_days.insert(day_number);
                true
            })
    }

    /// Archive a plan, recording the XP it earned.
    pub async fn archive_plan(&self, plan_id: PlanId, xp_earned: i64) -> bool {
        self.state
            .write()
            .await
            .plans
            .get_mut(&plan_id)
            .is_some_and(|plan| {
                plan.is_archived = true;
                plan.xp_earned = xp_earned;
                true
            })
    }

    /// Overwrite an XP record directly (for leaderboard fixtures).
    pub async fn put_xp_record(&self, record: XpRecord) {
        self.state
            .write()
            .await
            .xp_records
            .insert(record.user_id, record);
    }

    /// Number of stored participations.
    pub async fn participation_count(&self) -> usize {
        self.state.read().await.participations.len()
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Make `calculate_xp` fail as if the function were missing or timing out.
    pub fn set_aggregate_unavailable(&self, unavailable: bool) {
        self.faults
            .aggregate_unavailable
            .store(unavailable, Ordering::Release);
    }

    /// Make direct XP source reads fail.
    pub fn set_sources_unavailable(&self, unavailable: bool) {
        self.faults
            .sources_unavailable
            .store(unavailable, Ordering::Release);
    }

    /// Make XP record writes fail.
    pub fn set_xp_writes_unavailable(&self, unavailable: bool) {
        self.faults
            .xp_writes_unavailable
            .store(unavailable, Ordering::Release);
    }

    /// Make every catalog and XP-record read fail.
    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.faults
            .catalog_unavailable
            .store(unavailable, Ordering::Release);
    }

    /// Add a constant to every `calculate_xp` result, simulating drift
    /// between the aggregate function and the source rule.
    pub fn set_aggregate_skew(&self, skew: i64) {
        self.faults.aggregate_skew.store(skew, Ordering::Release);
    }

    /// Hold each XP snapshot, after it has been read, until `gate` is
    /// notified. `None` stops holding later reads.
    pub fn hold_xp_snapshots(&self, gate: Option<Arc<Notify>>) {
        *self
            .faults
            .snapshot_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = gate;
    }

    /// How many XP snapshots have been read so far.
    pub fn xp_snapshot_reads(&self) -> usize {
        self.faults.snapshot_reads.load(Ordering::Acquire)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::Acquire) {
            Err(StoreError::Unavailable(format!("{what} unavailable")))
        } else {
            Ok(())
        }
    }

    fn catalog(&self) -> Result<(), StoreError> {
        Self::check(&self.faults.catalog_unavailable, "catalog")
    }
}

fn sources_of(state: &MemoryState, user_id: UserId) -> XpSources {
    let event_xp = state
        .participations
        .values()
        .filter(|p| p.user_id == user_id)
        .fold(0_i64, |acc, p| acc.saturating_add(p.xp_earned));

    let mut archived_plan_xp = 0_i64;
    let mut active_plan_completed_days = 0_i64;
    for plan in state.plans.values().filter(|p| p.user_id == user_id) {
        if plan.is_archived {
            archived_plan_xp = archived_plan_xp.saturating_add(plan.xp_earned);
        } else {
            let days = i64::try_from(plan.completed_days.len()).unwrap_or(i64::MAX);
            active_plan_completed_days = active_plan_completed_days.saturating_add(days);
        }
    }

    XpSources {
        event_xp,
        archived_plan_xp,
        active_plan_completed_days,
    }
}

impl GamificationStore for MemoryStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        self.catalog()?;
        let state = self.state.read().await;
        let mut events: Vec<Event> = state.events.values().cloned().collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        self.catalog()?;
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn set_event_status(
        &self,
        event_id: EventId,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.catalog()?;
        let mut state = self.state.write().await;
        Ok(state.events.get_mut(&event_id).is_some_and(|event| {
            event.status = status;
            event.updated_at = now;
            true
        }))
    }

    async fn set_event_enabled(
        &self,
        event_id: EventId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.catalog()?;
        let mut state = self.state.write().await;
        Ok(state.events.get_mut(&event_id).is_some_and(|event| {
            event.is_enabled = enabled;
            event.updated_at = now;
            true
        }))
    }

    async fn get_questions(&self, event_id: EventId) -> Result<Vec<Question>, StoreError> {
        self.catalog()?;
        Ok(self
            .state
            .read()
            .await
            .questions
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_participated(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .participations
            .contains_key(&(event_id, user_id)))
    }

    async fn insert_participation(
        &self,
        new: NewParticipation,
    ) -> Result<Participation, StoreError> {
        let mut state = self.state.write().await;
        let key = (new.event_id, new.user_id);
        if state.participations.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "participations_event_id_user_id_key ({}, {})",
                new.event_id, new.user_id
            )));
        }

        let row = Participation {
            id: ParticipationId::new(),
            event_id: new.event_id,
            user_id: new.user_id,
            answers: new.answers,
            score: new.score,
            total_questions: new.total_questions,
            time_taken_minutes: new.time_taken_minutes,
            xp_earned: new.xp_earned,
            completed_at: new.completed_at,
        };
        state.participations.insert(key, row.clone());
        Ok(row)
    }

    async fn read_xp_snapshot(&self, user_id: UserId) -> Result<XpSnapshot, StoreError> {
        Self::check(&self.faults.aggregate_unavailable, "calculate_xp")?;
        let snapshot = {
            let state = self.state.read().await;
            let sources = sources_of(&state, user_id);
            let day_xp = sources.active_plan_completed_days.saturating_mul(100);
            let skew = self.faults.aggregate_skew.load(Ordering::Acquire);
            XpSnapshot {
                primary: sources
                    .event_xp
                    .saturating_add(sources.archived_plan_xp)
                    .saturating_add(day_xp)
                    .saturating_add(skew),
                sources: Self::check(&self.faults.sources_unavailable, "XP sources")
                    .map(|()| sources),
            }
        };
        self.faults.snapshot_reads.fetch_add(1, Ordering::AcqRel);

        let gate = self
            .faults
            .snapshot_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn read_xp_sources(&self, user_id: UserId) -> Result<XpSources, StoreError> {
        Self::check(&self.faults.sources_unavailable, "XP sources")?;
        Ok(sources_of(&*self.state.read().await, user_id))
    }

    async fn upsert_xp_record(
        &self,
        user_id: UserId,
        total_xp: i64,
        basis: Option<XpSources>,
        now: DateTime<Utc>,
    ) -> Result<XpWrite, StoreError> {
        Self::check(&self.faults.xp_writes_unavailable, "xp_records")?;
        let mut state = self.state.write().await;
        if basis.is_some_and(|basis| basis != sources_of(&state, user_id)) {
            return Ok(XpWrite::SourcesMoved);
        }
        let username = state
            .usernames
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string());

        let record = state
            .xp_records
            .entry(user_id)
            .and_modify(|existing| {
                if existing.total_xp != total_xp {
                    existing.total_xp = total_xp;
                    existing.updated_at = now;
                }
                existing.username.clone_from(&username);
            })
            .or_insert_with(|| XpRecord {
                user_id,
                username: username.clone(),
                total_xp,
                updated_at: now,
            });
        Ok(XpWrite::Committed(record.clone()))
    }

    async fn get_xp_record(&self, user_id: UserId) -> Result<Option<XpRecord>, StoreError> {
        self.catalog()?;
        Ok(self.state.read().await.xp_records.get(&user_id).cloned())
    }

    async fn top_xp_records(&self, limit: usize) -> Result<Vec<XpRecord>, StoreError> {
        self.catalog()?;
        let state = self.state.read().await;
        let mut records: Vec<XpRecord> = state
            .xp_records
            .values()
            .filter(|r| is_ranked(r))
            .cloned()
            .collect();
        records.sort_by(leaderboard_order);
        records.truncate(limit);
        Ok(records)
    }

    async fn count_ranked_ahead(&self, target: Option<&XpRecord>) -> Result<u64, StoreError> {
        self.catalog()?;
        let state = self.state.read().await;
        Ok(rank_among(target, state.xp_records.values()).saturating_sub(1))
    }

    async fn count_xp_records(&self) -> Result<u64, StoreError> {
        self.catalog()?;
        let count = self.state.read().await.xp_records.len();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
