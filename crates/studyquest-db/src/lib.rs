//! `PostgreSQL` data layer for the StudyQuest gamification engine.
//!
//! # Architecture
//!
//! ```text
//! Gamification services
//!     |
//!     +-- GamificationStore --> PgGamificationStore
//!                                  |-- EventStore          (events, event_questions)
//!                                  |-- ParticipationStore  (participations, UNIQUE(event_id, user_id))
//!                                  |-- XpStore             (xp_records, calculate_xp(), snapshots)
//!                                  +-- SourceStore         (direct source reads, plans, users)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- The shared `PostgreSQL` pool and migrations
//! - [`event_store`] -- Event catalog reads and status write-back
//! - [`participation_store`] -- One-row participation inserts
//! - [`xp_store`] -- XP record upserts and leaderboard queries
//! - [`source_store`] -- Direct XP source reads
//! - [`pg_store`] -- The [`GamificationStore`](studyquest_core::GamificationStore) impl
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod participation_store;
pub mod pg_store;
pub mod postgres;
pub mod source_store;
pub mod xp_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use event_store::{EventRow, EventStore, QuestionRow};
pub use participation_store::{ParticipationRow, ParticipationStore};
pub use pg_store::PgGamificationStore;
pub use postgres::PostgresPool;
pub use source_store::SourceStore;
pub use xp_store::{XpRecordRow, XpStore};
