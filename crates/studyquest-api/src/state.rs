//! Shared application state for the API server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use studyquest_core::{Gamification, GamificationStore};

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState<S> {
    /// The gamification engine.
    pub engine: Arc<Gamification<S>>,
    /// When the server state was created, for `/health`.
    pub started_at: DateTime<Utc>,
}

impl<S: GamificationStore> AppState<S> {
    /// Wrap an engine.
    pub fn new(engine: Arc<Gamification<S>>) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }
}
