//! Error taxonomy for the gamification engine.
//!
//! Two layers:
//!
//! - [`StoreError`] is what a [`GamificationStore`](crate::store::GamificationStore)
//!   implementation reports. It knows nothing about business rules.
//! - [`GamificationError`] is what the services surface to callers. It is
//!   the taxonomy the API maps onto HTTP statuses.
//!
//! Both are `Clone` so a single recompute result can be handed to every
//! caller that joined the same in-flight computation.

use studyquest_types::{EventId, EventStatus, UserId};
use studyquest_xp::{AnswerError, XpError};

use crate::singleflight::FlightAborted;

/// Failures reported by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("uniqueness constraint violated: {0}")]
    UniqueViolation(String),

    /// The store could not be reached or the operation timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row the operation depends on does not exist.
    #[error("row not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// A submission that cannot be accepted as sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The answer sheet does not fit the event's questions.
    #[error(transparent)]
    Answers(#[from] AnswerError),

    /// The event is not open at the moment of submission.
    #[error("event {event_id} is {status}, not active")]
    EventNotActive {
        /// The event that was targeted.
        event_id: EventId,
        /// Its status re-derived at submission time.
        status: EventStatus,
    },

    /// The event's reward settings cannot produce an XP value.
    #[error(transparent)]
    Reward(#[from] XpError),
}

/// Errors surfaced by the gamification services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GamificationError {
    /// Malformed submission. Terminal, never retried.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The user already has a participation for this event. Terminal.
    #[error("user {user_id} already participated in event {event_id}")]
    AlreadyParticipated {
        /// The event.
        event_id: EventId,
        /// The user.
        user_id: UserId,
    },

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store failed in a way that may succeed later.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// The primary and fallback XP computations disagree.
    #[error("XP aggregation mismatch for user {user_id}: primary {primary}, fallback {fallback}")]
    AggregationMismatch {
        /// The user being recomputed.
        user_id: UserId,
        /// Total from the store-side aggregate function.
        primary: i64,
        /// Total from direct source reads.
        fallback: i64,
    },

    /// Stored data violates an invariant the engine relies on.
    #[error("data integrity error: {0}")]
    Corrupt(String),
}

impl From<StoreError> for GamificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::TransientStore(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            // Only participation inserts can hit a uniqueness constraint and
            // the ledger maps those itself. Anywhere else it is a schema bug.
            StoreError::UniqueViolation(msg) | StoreError::Corrupt(msg) => Self::Corrupt(msg),
        }
    }
}

impl From<FlightAborted> for GamificationError {
    fn from(err: FlightAborted) -> Self {
        Self::TransientStore(err.to_string())
    }
}

impl GamificationError {
    /// Whether retrying the same call could succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_store_is_transient() {
        let err = GamificationError::from(StoreError::Unavailable("timeout".to_owned()));
        assert!(err.is_transient());
    }

    #[test]
    fn terminal_errors_are_not_transient() {
        let err = GamificationError::AlreadyParticipated {
            event_id: EventId::new(),
            user_id: UserId::new(),
        };
        assert!(!err.is_transient());
        let err = GamificationError::from(ValidationError::from(AnswerError::NoQuestions));
        assert!(!err.is_transient());
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let err = GamificationError::from(StoreError::NotFound("event".to_owned()));
        assert_eq!(err, GamificationError::NotFound("event".to_owned()));
    }
}
