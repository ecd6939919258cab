//! XP rules for the StudyQuest gamification engine.
//!
//! Every XP number the engine persists or displays is derived by the pure
//! functions in this crate. Keeping the rule in one place means the
//! store-side `calculate_xp` function and the direct-read fallback have a
//! single reference implementation to be checked against.
//!
//! # Modules
//!
//! - [`scoring`] -- Answer validation, positional scoring, and the
//!   score-to-XP conversion.
//! - [`sources`] -- The three-source XP total rule.
//! - [`level`] -- The level law.
//! - [`consistency`] -- Primary vs. fallback total comparison.
//! - [`ranking`] -- Leaderboard total order and rank assignment.
//!
//! # XP Rule
//!
//! ```text
//! total_xp = sum(participation.xp_earned)
//!          + sum(archived_plan.xp_earned)
//!          + completed_days(active plans) * 100
//! ```
//!
//! # Usage
//!
//! ```
//! use studyquest_types::XpSources;
//! use studyquest_xp::{level::level_progress, sources::total_xp};
//!
//! let sources = XpSources {
//!     event_xp: 1_200,
//!     archived_plan_xp: 1_000,
//!     active_plan_completed_days: 3,
//! };
//! let total = total_xp(&sources).ok();
//! assert_eq!(total, Some(2_500));
//!
//! let level = level_progress(2_500);
//! assert_eq!(level.level, 3);
//! assert_eq!(level.progress_percent, 50);
//! ```

pub mod consistency;
pub mod level;
pub mod ranking;
pub mod scoring;
pub mod sources;

// Re-export primary items at crate root.
pub use consistency::{XpConsistency, verify_consistency};
pub use level::{XP_PER_LEVEL, level_progress};
pub use ranking::{leaderboard_order, rank_records};
pub use scoring::{AnswerError, score_answers, validate_answers, xp_for_score};
pub use sources::{XP_PER_COMPLETED_DAY, total_xp};

use studyquest_types::UserId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by XP arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XpError {
    /// A sum or product left the `i64` range.
    #[error("XP arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    /// An input that must be non-negative was negative.
    #[error("{field} must be non-negative, got {value}")]
    Negative {
        /// Which input was negative.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// A score was computed against an event with no questions.
    #[error("cannot derive XP for an event with zero questions")]
    NoQuestions,
}

// ---------------------------------------------------------------------------
// Mismatch type
// ---------------------------------------------------------------------------

/// The primary and fallback computations disagreed for one user.
///
/// This is the engine's integrity alert for XP: two implementations of
/// the same rule drifted apart. It is never reconciled automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpMismatch {
    /// The user whose total was being recomputed.
    pub user_id: UserId,
    /// Total reported by the store-side aggregate function.
    pub primary: i64,
    /// Total derived from direct source reads.
    pub fallback: i64,
    /// Human-readable description.
    pub message: String,
}

impl core::fmt::Display for XpMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
