//! REST endpoint handlers.
//!
//! Every handler is generic over the [`GamificationStore`] so the same
//! router serves `PostgreSQL` in production and the in-memory store in
//! tests.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and uptime |
//! | `GET` | `/api/events` | List events (`?filter=active\|all`) |
//! | `GET` | `/api/events/{id}` | One event with countdown |
//! | `PUT` | `/api/events/{id}/status` | Admin status override |
//! | `PUT` | `/api/events/{id}/enabled` | Kill switch |
//! | `GET` | `/api/events/{id}/participations/{user_id}` | Participation check |
//! | `POST` | `/api/events/{id}/participations` | Submit answers |
//! | `GET` | `/api/leaderboard` | Top-N (`?limit=&viewer=`) |
//! | `GET` | `/api/users/{id}/rank` | A user's rank |
//! | `GET` | `/api/users/{id}/level` | A user's level |
//! | `POST` | `/api/users/{id}/xp/recompute` | Force a recompute |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use studyquest_core::{
    EventView, GamificationStore, RecomputeOutcome, RefreshReport, Submission, SubmissionOutcome,
};
use studyquest_types::{
    Answer, EventFilter, EventId, EventStatus, Leaderboard, LevelProgress, UserId, UserRank,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Which events to return. Defaults to every event.
    #[serde(default)]
    pub filter: EventFilter,
}

/// Response body for `GET /api/events`.
#[derive(Debug, Serialize)]
pub struct EventList {
    /// Number of events returned.
    pub count: usize,
    /// The events, ordered by start time.
    pub events: Vec<EventView>,
}

/// Body of `PUT /api/events/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    /// The status to force.
    pub status: EventStatus,
}

/// Body of `PUT /api/events/{id}/enabled`.
#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    /// New kill-switch value.
    pub enabled: bool,
}

/// Body of `POST /api/events/{id}/participations`.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    /// The submitting user.
    pub user_id: UserId,
    /// One answer per question, in question order.
    pub answers: Vec<Answer>,
    /// Self-reported time spent.
    #[serde(default)]
    pub time_taken_minutes: u32,
}

/// Response body for the participation check.
#[derive(Debug, Serialize)]
pub struct ParticipationCheck {
    /// The event.
    pub event_id: EventId,
    /// The user.
    pub user_id: UserId,
    /// Whether a participation exists.
    pub participated: bool,
}

/// Query parameters for `GET /api/leaderboard`.
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// Maximum entries; clamped to the configured bounds.
    pub limit: Option<usize>,
    /// The user looking at the board, if known.
    pub viewer: Option<String>,
}

/// Response body for `GET /api/users/{id}/level`.
#[derive(Debug, Serialize)]
pub struct UserLevel {
    /// The user.
    pub user_id: UserId,
    /// Level breakdown of their persisted total.
    #[serde(flatten)]
    pub progress: LevelProgress,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<serde_json::Value> {
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds()
        .max(0);
    Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": uptime,
    }))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// `GET /api/events`
pub async fn list_events<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<EventList> {
    let Query(query) = query?;
    let events = state.engine.list_events(query.filter, Utc::now()).await?;
    Ok(Json(EventList {
        count: events.len(),
        events,
    }))
}

/// `GET /api/events/{id}`
pub async fn get_event<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<EventView> {
    let event_id = EventId::from(parse_uuid(&id)?);
    Ok(Json(state.engine.get_event(event_id, Utc::now()).await?))
}

/// `PUT /api/events/{id}/status`
pub async fn override_status<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<EventView> {
    let event_id = EventId::from(parse_uuid(&id)?);
    let Json(body) = body?;
    let view = state
        .engine
        .override_status(event_id, body.status, Utc::now())
        .await?;
    tracing::info!(%event_id, status = %body.status, "Event status overridden");
    Ok(Json(view))
}

/// `PUT /api/events/{id}/enabled`
pub async fn set_enabled<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<EnabledBody>, JsonRejection>,
) -> ApiResult<EventView> {
    let event_id = EventId::from(parse_uuid(&id)?);
    let Json(body) = body?;
    let view = state
        .engine
        .set_enabled(event_id, body.enabled, Utc::now())
        .await?;
    tracing::info!(%event_id, enabled = body.enabled, "Event kill switch changed");
    Ok(Json(view))
}

/// `POST /api/events/refresh`
pub async fn refresh_statuses<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<RefreshReport> {
    Ok(Json(state.engine.refresh_statuses(Utc::now()).await?))
}

// ---------------------------------------------------------------------------
// Participations
// ---------------------------------------------------------------------------

/// `GET /api/events/{id}/participations/{user_id}`
pub async fn check_participation<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, user)): Path<(String, String)>,
) -> ApiResult<ParticipationCheck> {
    let event_id = EventId::from(parse_uuid(&id)?);
    let user_id = UserId::from(parse_uuid(&user)?);
    let participated = state.engine.has_participated(event_id, user_id).await?;
    Ok(Json(ParticipationCheck {
        event_id,
        user_id,
        participated,
    }))
}

/// `POST /api/events/{id}/participations`
///
/// Responds `201 Created` once the participation is recorded, even when
/// crediting the XP is still pending.
pub async fn submit_participation<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), ApiError> {
    let event_id = EventId::from(parse_uuid(&id)?);
    let Json(body) = body?;
    let submission = Submission {
        event_id,
        user_id: body.user_id,
        answers: body.answers,
        time_taken_minutes: body.time_taken_minutes,
    };
    let outcome = state
        .engine
        .submit_participation(&submission, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// ---------------------------------------------------------------------------
// Leaderboard and XP
// ---------------------------------------------------------------------------

/// `GET /api/leaderboard`
///
/// Never fails on store errors; a failed read yields `degraded: true`.
pub async fn get_leaderboard<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Leaderboard> {
    let Query(query) = query?;
    let viewer = query
        .viewer
        .as_deref()
        .map(parse_uuid)
        .transpose()?
        .map(UserId::from);
    Ok(Json(
        state
            .engine
            .get_leaderboard(query.limit, viewer, Utc::now())
            .await,
    ))
}

/// `GET /api/users/{id}/rank`
pub async fn get_user_rank<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<UserRank> {
    let user_id = UserId::from(parse_uuid(&id)?);
    Ok(Json(state.engine.get_user_rank(user_id).await?))
}

/// `GET /api/users/{id}/level`
pub async fn get_user_level<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<UserLevel> {
    let user_id = UserId::from(parse_uuid(&id)?);
    let progress = state.engine.get_user_level(user_id).await?;
    Ok(Json(UserLevel { user_id, progress }))
}

/// `POST /api/users/{id}/xp/recompute`
pub async fn recompute_xp<S: GamificationStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<RecomputeOutcome> {
    let user_id = UserId::from(parse_uuid(&id)?);
    Ok(Json(state.engine.recompute_xp(user_id, Utc::now()).await?))
}

fn parse_uuid(s: &str) -> Result<Uuid, ApiError> {
    s.parse::<Uuid>()
        .map_err(|e| ApiError::InvalidUuid(format!("{s}: {e}")))
}
