//! Shared type definitions for the StudyQuest gamification engine.
//!
//! This crate is the single source of truth for the types used across the
//! workspace. Types defined here flow downstream to `TypeScript` via
//! `ts-rs` for the web client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all identifiers
//! - [`enums`] -- Event status, catalog filter, XP computation path
//! - [`structs`] -- Events, questions, participations, XP records, leaderboard views

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventFilter, EventStatus, XpPath};
pub use ids::{EventId, ParticipationId, PlanId, QuestionId, UserId};
pub use structs::{
    Answer, Countdown, Event, Leaderboard, LeaderboardEntry, LevelProgress, Participation,
    Question, QuestionAnswerKind, UserRank, XpRecord, XpSources,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::QuestionId::export_all();
        let _ = crate::ids::ParticipationId::export_all();
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::PlanId::export_all();

        // Enums
        let _ = crate::enums::EventStatus::export_all();
        let _ = crate::enums::EventFilter::export_all();
        let _ = crate::enums::XpPath::export_all();

        // Structs
        let _ = crate::structs::Event::export_all();
        let _ = crate::structs::QuestionAnswerKind::export_all();
        let _ = crate::structs::Question::export_all();
        let _ = crate::structs::Answer::export_all();
        let _ = crate::structs::Participation::export_all();
        let _ = crate::structs::XpRecord::export_all();
        let _ = crate::structs::XpSources::export_all();
        let _ = crate::structs::LevelProgress::export_all();
        let _ = crate::structs::LeaderboardEntry::export_all();
        let _ = crate::structs::Leaderboard::export_all();
        let _ = crate::structs::UserRank::export_all();
        let _ = crate::structs::Countdown::export_all();
    }

    #[test]
    fn answer_wire_format_is_adjacently_tagged() {
        let json = serde_json::to_value(crate::Answer::Choice(2)).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({ "type": "choice", "value": 2 }))
        );
        let skipped = serde_json::to_value(crate::Answer::Skipped).ok();
        assert_eq!(skipped, Some(serde_json::json!({ "type": "skipped" })));
    }

    #[test]
    fn question_kind_wire_format_is_internally_tagged() {
        let kind = crate::QuestionAnswerKind::MultipleChoice {
            options: vec!["a".to_owned(), "b".to_owned()],
            correct_index: 1,
        };
        let json = serde_json::to_value(&kind).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({
                "kind": "multiple_choice",
                "options": ["a", "b"],
                "correct_index": 1
            }))
        );
    }
}
