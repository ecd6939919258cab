//! Axum router construction.
//!
//! Assembles every route into a single [`Router`] with CORS and request
//! tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use studyquest_core::GamificationStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router over a shared engine.
///
/// See the [`handlers`] module for the endpoint table. CORS allows any
/// origin.
pub fn build_router<S: GamificationStore>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::<S>))
        // Events
        .route("/api/events", get(handlers::list_events::<S>))
        .route("/api/events/refresh", post(handlers::refresh_statuses::<S>))
        .route("/api/events/{id}", get(handlers::get_event::<S>))
        .route("/api/events/{id}/status", put(handlers::override_status::<S>))
        .route("/api/events/{id}/enabled", put(handlers::set_enabled::<S>))
        // Participations
        .route(
            "/api/events/{id}/participations",
            post(handlers::submit_participation::<S>),
        )
        .route(
            "/api/events/{id}/participations/{user_id}",
            get(handlers::check_participation::<S>),
        )
        // Leaderboard and XP
        .route("/api/leaderboard", get(handlers::get_leaderboard::<S>))
        .route("/api/users/{id}/rank", get(handlers::get_user_rank::<S>))
        .route("/api/users/{id}/level", get(handlers::get_user_level::<S>))
        .route(
            "/api/users/{id}/xp/recompute",
            post(handlers::recompute_xp::<S>),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
