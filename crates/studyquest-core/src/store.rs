//! The persistent-store seam.
//!
//! The engine treats its store as a black-box relational database with
//! snapshot reads, per-user serialized XP writes, a uniqueness constraint
//! on `(event_id, user_id)` participations and a `calculate_xp` aggregate
//! function. [`GamificationStore`] is that contract. The `PostgreSQL`
//! implementation lives in `studyquest-db`; [`MemoryStore`] is an
//! in-process implementation for tests and local runs.
//!
//! Every method returns a `Send` future so services can be shared across
//! Tokio tasks and recomputes can be driven from a detached single-flight
//! future.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use core::future::Future;

use chrono::{DateTime, Utc};
use studyquest_types::{
    Answer, Event, EventId, EventStatus, Participation, Question, UserId, XpRecord, XpSources,
};

use crate::error::StoreError;

/// A participation row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipation {
    /// The event attempted.
    pub event_id: EventId,
    /// The user attempting it.
    pub user_id: UserId,
    /// Answers in question order.
    pub answers: Vec<Answer>,
    /// Correct answer count.
    pub score: u32,
    /// Question count at submission time.
    pub total_questions: u32,
    /// Self-reported time spent.
    pub time_taken_minutes: u32,
    /// XP to persist verbatim.
    pub xp_earned: i64,
    /// Submission time.
    pub completed_at: DateTime<Utc>,
}

/// A user's XP as seen by one consistent read.
///
/// `primary` is the aggregate function's answer; `sources` are the raw
/// inputs read in the same snapshot. A failed source read does not void
/// the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpSnapshot {
    /// `calculate_xp(user_id)`.
    pub primary: i64,
    /// The three sources, or why they could not be read.
    pub sources: Result<XpSources, StoreError>,
}

/// Outcome of a verified XP record write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XpWrite {
    /// The record was written.
    Committed(XpRecord),
    /// The sources no longer match the ones the total was computed from.
    /// Nothing was written.
    SourcesMoved,
}

/// Storage operations the gamification services depend on.
pub trait GamificationStore: Send + Sync + 'static {
    // -- Event catalog ------------------------------------------------------

    /// All events, ordered by start time.
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send;

    /// A single event, if it exists.
    fn get_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Overwrite an event's cached status. Returns `false` if no such event.
    fn set_event_status(
        &self,
        event_id: EventId,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Flip an event's kill switch. Returns `false` if no such event.
    fn set_event_enabled(
        &self,
        event_id: EventId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// The event's questions in position order.
    fn get_questions(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Question>, StoreError>> + Send;

    // -- Participations -----------------------------------------------------

    /// Whether a participation row exists for the pair.
    fn has_participated(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a participation row.
    ///
    /// Must fail with [`StoreError::UniqueViolation`] when a row for the
    /// same `(event_id, user_id)` already exists, including when the
    /// competing row is written concurrently.
    fn insert_participation(
        &self,
        participation: NewParticipation,
    ) -> impl Future<Output = Result<Participation, StoreError>> + Send;

    // -- XP sources ---------------------------------------------------------

    /// Run `calculate_xp(user_id)` and read the three sources in one
    /// snapshot.
    ///
    /// Fails only when the aggregate itself fails; a source read failure
    /// is reported inside the snapshot.
    fn read_xp_snapshot(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<XpSnapshot, StoreError>> + Send;

    /// Read the three XP sources directly.
    fn read_xp_sources(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<XpSources, StoreError>> + Send;

    // -- XP records ---------------------------------------------------------

    /// Create or overwrite a user's XP record.
    ///
    /// Writes for one user are serialized. With a `basis`, the store
    /// re-reads the sources inside the write and returns
    /// [`XpWrite::SourcesMoved`] without writing if they differ, so a total
    /// computed from a stale read never lands. `updated_at` moves to `now`
    /// only when `total_xp` differs from the stored value. The username is
    /// resolved by the store.
    fn upsert_xp_record(
        &self,
        user_id: UserId,
        total_xp: i64,
        basis: Option<XpSources>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<XpWrite, StoreError>> + Send;

    /// A user's XP record, if one has been created.
    fn get_xp_record(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<XpRecord>, StoreError>> + Send;

    /// Up to `limit` records with positive XP, in leaderboard order.
    fn top_xp_records(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<XpRecord>, StoreError>> + Send;

    /// How many ranked records sit ahead of `target` in leaderboard order.
    ///
    /// With no target, or a target with zero XP, every ranked record
    /// counts as ahead.
    fn count_ranked_ahead(
        &self,
        target: Option<&XpRecord>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Total number of XP records, ranked or not.
    fn count_xp_records(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
