//! Enumeration types for the gamification engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of a quiz event.
///
/// The persisted value is a cached projection of the event's schedule,
/// its enable flag, and the current time. An admin override may set it
/// directly; the next refresh re-derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventStatus {
    /// The event has not started yet.
    Upcoming,
    /// The event window is open and the event is enabled.
    Active,
    /// The window has closed, or the event was disabled.
    Finished,
}

impl EventStatus {
    /// The database / wire string for this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    /// Parse a status from its database string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upcoming" => Some(Self::Upcoming),
            "active" => Some(Self::Active),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl core::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which events a catalog listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventFilter {
    /// Only events that are active and enabled right now.
    #[serde(alias = "active")]
    ActiveOnly,
    /// Every event in the catalog.
    #[default]
    All,
}

/// Which computation produced a persisted XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum XpPath {
    /// The store-side `calculate_xp` aggregate function.
    Primary,
    /// Direct reads of the three XP sources.
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [EventStatus::Upcoming, EventStatus::Active, EventStatus::Finished] {
            assert_eq!(EventStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EventStatus::parse("disabled"), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&EventStatus::Active).ok();
        assert_eq!(json.as_deref(), Some("\"active\""));
    }

    #[test]
    fn filter_defaults_to_all() {
        assert_eq!(EventFilter::default(), EventFilter::All);
        let parsed: Result<EventFilter, _> = serde_json::from_str("\"active_only\"");
        assert_eq!(parsed.ok(), Some(EventFilter::ActiveOnly));
    }
}
