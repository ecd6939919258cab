//! Services for the StudyQuest gamification engine.
//!
//! This crate owns the four services and the store seam they share:
//! event lifecycle, participation recording, XP aggregation, and
//! leaderboard ranking. [`Gamification`] wires them together over a single
//! [`GamificationStore`].
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `studyquest-config.yaml`
//!   into strongly-typed structs.
//! - [`error`] -- [`StoreError`], [`ValidationError`], and
//!   [`GamificationError`].
//! - [`store`] -- The [`GamificationStore`] trait.
//! - [`memory`] -- [`MemoryStore`], an in-process store with fault
//!   injection.
//! - [`lifecycle`] -- Status derivation, write-back, and the action gate.
//! - [`participation`] -- The one-attempt-per-user ledger.
//! - [`singleflight`] -- Per-key coalescing of concurrent computations.
//! - [`aggregator`] -- Primary/fallback XP recompute and crediting.
//! - [`leaderboard`] -- Top-N and per-user rank.
//! - [`engine`] -- The [`Gamification`] facade.
//!
//! [`StoreError`]: error::StoreError
//! [`ValidationError`]: error::ValidationError
//! [`GamificationError`]: error::GamificationError
//! [`GamificationStore`]: store::GamificationStore
//! [`MemoryStore`]: memory::MemoryStore
//! [`Gamification`]: engine::Gamification

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod lifecycle;
pub mod memory;
pub mod participation;
pub mod singleflight;
pub mod store;

pub use aggregator::{CreditStatus, RecomputeOutcome, RecomputePhase, XpAggregator};
pub use config::{ConfigError, GamificationConfig};
pub use engine::{EventView, Gamification, SubmissionOutcome, run_status_refresh};
pub use error::{GamificationError, StoreError, ValidationError};
pub use leaderboard::LeaderboardRanker;
pub use lifecycle::{LifecycleManager, RefreshReport, compute_status, countdown, ensure_active};
pub use memory::MemoryStore;
pub use participation::{ParticipationLedger, Submission};
pub use store::{GamificationStore, NewParticipation, XpSnapshot, XpWrite};
