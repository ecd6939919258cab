//! Core entity structs for the gamification engine.
//!
//! Events and their questions form the catalog, participations are the
//! immutable attempt records, and XP records are the persisted totals the
//! leaderboard reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EventStatus;
use crate::ids::{EventId, ParticipationId, QuestionId, UserId};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A scheduled, time-boxed competitive quiz with a fixed XP reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Display title.
    pub title: String,
    /// Free-form description shown before the quiz starts.
    pub description: String,
    /// Subject category (e.g. "mathematics").
    pub category: String,
    /// When the event window opens.
    pub start_time: DateTime<Utc>,
    /// Length of the event window in minutes.
    pub duration_minutes: u32,
    /// XP awarded for a perfect score.
    pub xp_reward: i64,
    /// Kill switch: a disabled event is never active.
    pub is_enabled: bool,
    /// Cached lifecycle status.
    pub status: EventStatus,
    /// When the event row was authored.
    pub created_at: DateTime<Utc>,
    /// When the event row last changed.
    pub updated_at: DateTime<Utc>,
}

/// How a question is answered, fixed when the question is authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum QuestionAnswerKind {
    /// Pick one of `options`; `correct_index` is 0-based.
    MultipleChoice {
        /// Option labels in display order.
        options: Vec<String>,
        /// Index of the correct option.
        correct_index: u32,
    },
    /// Free text; not auto-scored.
    FreeText,
}

/// A question belonging to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Question {
    /// Question identifier.
    pub id: QuestionId,
    /// Owning event.
    pub event_id: EventId,
    /// 0-based position within the event.
    pub position: u32,
    /// Question text.
    pub prompt: String,
    /// Answer format and key.
    pub answer: QuestionAnswerKind,
}

// ---------------------------------------------------------------------------
// Participation
// ---------------------------------------------------------------------------

/// One submitted answer, positionally matched to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Answer {
    /// Index of the chosen option.
    Choice(u32),
    /// Free-text response.
    Text(String),
    /// The user left the question blank.
    Skipped,
}

/// A user's single, immutable attempt record for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Participation {
    /// Participation identifier.
    pub id: ParticipationId,
    /// The event attempted.
    pub event_id: EventId,
    /// The user who attempted it.
    pub user_id: UserId,
    /// Submitted answers in question order.
    pub answers: Vec<Answer>,
    /// Number of correct answers.
    pub score: u32,
    /// Number of questions in the event at submission time.
    pub total_questions: u32,
    /// Self-reported time spent, in minutes.
    pub time_taken_minutes: u32,
    /// XP earned by this attempt, persisted verbatim.
    pub xp_earned: i64,
    /// When the attempt was recorded.
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// XP
// ---------------------------------------------------------------------------

/// A user's persisted XP total.
///
/// Only ever written by a full recompute from source rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct XpRecord {
    /// Owner of the total.
    pub user_id: UserId,
    /// Display name, denormalized from the identity service.
    pub username: String,
    /// Total XP across all sources.
    pub total_xp: i64,
    /// When `total_xp` last changed.
    pub updated_at: DateTime<Utc>,
}

/// The three independent inputs to a user's XP total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct XpSources {
    /// Sum of `xp_earned` over the user's participations.
    pub event_xp: i64,
    /// Sum of `xp_earned` over the user's archived study plans.
    pub archived_plan_xp: i64,
    /// Completed days in the user's current (non-archived) plans.
    pub active_plan_completed_days: i64,
}

/// Level breakdown derived from an XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LevelProgress {
    /// 1-based level.
    pub level: i64,
    /// XP accumulated inside the current level.
    pub current_xp: i64,
    /// XP needed to complete a level.
    pub required_xp: i64,
    /// Whole-percent progress through the current level (0-99).
    pub progress_percent: i64,
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// A query-time ranked view of one [`XpRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: u32,
    /// Ranked user.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// XP total.
    pub total_xp: i64,
    /// Level derived from `total_xp`.
    pub level: i64,
    /// When `total_xp` last changed.
    pub updated_at: DateTime<Utc>,
}

/// A Top-N leaderboard read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Leaderboard {
    /// Ranked entries, best first.
    pub entries: Vec<LeaderboardEntry>,
    /// True when the read failed and an empty board is served instead.
    pub degraded: bool,
}

/// A user's standing, computed independently of any Top-N query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserRank {
    /// The user.
    pub user_id: UserId,
    /// 1-based rank among all users.
    pub rank: u64,
    /// The user's XP total (0 when no record exists yet).
    pub total_xp: i64,
    /// Level breakdown for `total_xp`.
    pub level: LevelProgress,
}

/// Presentational countdown for an event view.
///
/// Drives client-side timers only; the server re-derives status whenever
/// an action depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "phase", content = "seconds", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Countdown {
    /// Seconds until the window opens.
    StartsIn(i64),
    /// Seconds until the window closes.
    EndsIn(i64),
    /// The window has closed or the event is disabled.
    Over,
}
