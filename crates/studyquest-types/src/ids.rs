//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every row the engine touches has a strongly-typed ID so an event ID can
//! never be passed where a user ID is expected. IDs use UUID v7
//! (time-ordered) for efficient index locality.
//!
//! `PostgreSQL` generates most IDs via `DEFAULT` clauses. The `new()`
//! constructors exist for app-side generation (tests, seed data, the
//! in-memory store).

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a scheduled quiz event.
    EventId
}

define_id! {
    /// Unique identifier for a question belonging to an event.
    QuestionId
}

define_id! {
    /// Unique identifier for a participation (one user's attempt at one event).
    ParticipationId
}

define_id! {
    /// Unique identifier for a platform user, issued by the identity service.
    UserId
}

define_id! {
    /// Unique identifier for a study plan.
    PlanId
}
