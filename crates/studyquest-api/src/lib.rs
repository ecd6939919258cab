//! HTTP API for the StudyQuest gamification engine.
//!
//! An Axum server exposing the event catalog, participation submission,
//! XP recompute, and leaderboard reads over REST. Engine errors map onto
//! HTTP statuses in [`error::ApiError`]:
//!
//! | Error | Status |
//! |-------|--------|
//! | validation | 422 |
//! | already participated | 409 |
//! | not found | 404 |
//! | transient store failure | 503 |
//! | aggregation mismatch, corrupt data | 500 |
//! | malformed path, query, or body | 400 |

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
