//! Integration tests for the REST API.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` over the
//! in-memory store, without starting a TCP server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use studyquest_api::{AppState, build_router};
use studyquest_core::{Gamification, GamificationConfig, MemoryStore};
use studyquest_types::{
    Event, EventId, EventStatus, Question, QuestionAnswerKind, QuestionId, UserId, XpRecord,
};
use tower::ServiceExt;

struct Fixture {
    store: Arc<MemoryStore>,
    state: Arc<AppState<MemoryStore>>,
    open_event: EventId,
    future_event: EventId,
}

fn event(start_offset: Duration, xp_reward: i64) -> Event {
    let now = Utc::now();
    Event {
        id: EventId::new(),
        title: "Weekly quiz".to_owned(),
        description: "Ten questions".to_owned(),
        category: "science".to_owned(),
        start_time: now + start_offset,
        duration_minutes: 60,
        xp_reward,
        is_enabled: true,
        status: EventStatus::Upcoming,
        created_at: now,
        updated_at: now,
    }
}

fn questions(event_id: EventId, count: u32) -> Vec<Question> {
    (0..count)
        .map(|position| Question {
            id: QuestionId::new(),
            event_id,
            position,
            prompt: format!("Question {position}"),
            answer: QuestionAnswerKind::MultipleChoice {
                options: vec!["a".to_owned(), "b".to_owned()],
                correct_index: 0,
            },
        })
        .collect()
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());

    let open = event(-Duration::minutes(10), 50);
    let open_event = open.id;
    store.insert_event(open).await;
    store.insert_questions(open_event, questions(open_event, 10)).await;

    let future = event(Duration::hours(2), 30);
    let future_event = future.id;
    store.insert_event(future).await;

    let engine = Arc::new(Gamification::new(
        Arc::clone(&store),
        GamificationConfig::default(),
    ));
    let state = Arc::new(AppState::new(engine));
    Fixture {
        store,
        state,
        open_event,
        future_event,
    }
}

async fn send(fx: &Fixture, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(&fx.state))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(fx: &Fixture, uri: &str) -> (StatusCode, Value) {
    send(fx, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn with_json(fx: &Fixture, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(fx, request).await
}

fn answers(correct: usize, total: usize) -> Value {
    let sheet: Vec<Value> = (0..total)
        .map(|i| json!({ "type": "choice", "value": u32::from(i >= correct) }))
        .collect();
    Value::Array(sheet)
}

fn submit_body(user: UserId, correct: usize, total: usize) -> Value {
    json!({
        "user_id": user,
        "answers": answers(correct, total),
        "time_taken_minutes": 12,
    })
}

fn record(total_xp: i64, minutes_ago: i64) -> XpRecord {
    let user_id = UserId::new();
    XpRecord {
        user_id,
        username: format!("user-{total_xp}"),
        total_xp,
        updated_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

// ---------------------------------------------------------------------------
// Health and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let fx = fixture().await;
    let (status, body) = get(&fx, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn list_events_applies_filter() {
    let fx = fixture().await;

    let (status, body) = get(&fx, "/api/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = get(&fx, "/api/events?filter=active_only").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["id"], json!(fx.open_event));
    assert_eq!(body["events"][0]["status"], "active");

    let (_, short) = get(&fx, "/api/events?filter=active").await;
    assert_eq!(short["count"], 1);
}

#[tokio::test]
async fn unknown_filter_is_bad_request() {
    let fx = fixture().await;
    let (status, body) = get(&fx, "/api/events?filter=sometimes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn event_view_carries_countdown() {
    let fx = fixture().await;

    let (status, body) = get(&fx, &format!("/api/events/{}", fx.open_event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["countdown"]["phase"], "ends_in");
    let remaining = body["countdown"]["seconds"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 50 * 60);

    let (_, body) = get(&fx, &format!("/api/events/{}", fx.future_event)).await;
    assert_eq!(body["status"], "upcoming");
    assert_eq!(body["countdown"]["phase"], "starts_in");
}

#[tokio::test]
async fn missing_event_is_not_found_and_bad_id_is_bad_request() {
    let fx = fixture().await;

    let (status, body) = get(&fx, &format!("/api/events/{}", EventId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (status, _) = get(&fx, "/api/events/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_outage_is_service_unavailable() {
    let fx = fixture().await;
    fx.store.set_catalog_unavailable(true);
    let (status, _) = get(&fx, "/api/events").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_override_sets_status() {
    let fx = fixture().await;
    let uri = format!("/api/events/{}/status", fx.future_event);

    let (status, body) = with_json(&fx, "PUT", &uri, &json!({ "status": "active" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, _) = with_json(&fx, "PUT", &uri, &json!({ "status": "paused" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Participations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_scores_and_credits_xp() {
    let fx = fixture().await;
    let user = UserId::new();
    let uri = format!("/api/events/{}/participations", fx.open_event);

    let (status, body) = with_json(&fx, "POST", &uri, &submit_body(user, 8, 10)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["score"], 8);
    assert_eq!(body["total_questions"], 10);
    assert_eq!(body["xp_earned"], 40);
    assert_eq!(body["credit"]["state"], "credited");
    assert_eq!(body["credit"]["total_xp"], 40);
    assert_eq!(body["credit"]["path"], "primary");

    let check = format!("/api/events/{}/participations/{user}", fx.open_event);
    let (status, body) = get(&fx, &check).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participated"], true);
}

#[tokio::test]
async fn second_submission_conflicts() {
    let fx = fixture().await;
    let user = UserId::new();
    let uri = format!("/api/events/{}/participations", fx.open_event);

    let (first, _) = with_json(&fx, "POST", &uri, &submit_body(user, 10, 10)).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, body) = with_json(&fx, "POST", &uri, &submit_body(user, 10, 10)).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
    assert_eq!(fx.store.participation_count().await, 1);
}

#[tokio::test]
async fn wrong_answer_count_is_unprocessable() {
    let fx = fixture().await;
    let uri = format!("/api/events/{}/participations", fx.open_event);
    let (status, _) = with_json(&fx, "POST", &uri, &submit_body(UserId::new(), 3, 3)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(fx.store.participation_count().await, 0);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let fx = fixture().await;
    let uri = format!("/api/events/{}/participations", fx.open_event);
    let (status, body) = with_json(&fx, "POST", &uri, &json!({ "answers": "all of them" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn submitting_to_upcoming_event_is_unprocessable() {
    let fx = fixture().await;
    let uri = format!("/api/events/{}/participations", fx.future_event);
    let (status, _) = with_json(&fx, "POST", &uri, &submit_body(UserId::new(), 1, 1)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn kill_switch_closes_event() {
    let fx = fixture().await;
    let toggle = format!("/api/events/{}/enabled", fx.open_event);

    let (status, body) = with_json(&fx, "PUT", &toggle, &json!({ "enabled": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_enabled"], false);
    assert_eq!(body["status"], "finished");
    assert_eq!(body["countdown"]["phase"], "over");

    let uri = format!("/api/events/{}/participations", fx.open_event);
    let (status, _) = with_json(&fx, "POST", &uri, &submit_body(UserId::new(), 10, 10)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn credit_failure_still_records_participation() {
    let fx = fixture().await;
    fx.store.set_xp_writes_unavailable(true);
    let uri = format!("/api/events/{}/participations", fx.open_event);

    let (status, body) = with_json(&fx, "POST", &uri, &submit_body(UserId::new(), 5, 10)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["xp_earned"], 25);
    assert_eq!(body["credit"]["state"], "pending");
    assert_eq!(fx.store.participation_count().await, 1);
}

// ---------------------------------------------------------------------------
// Leaderboard and XP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaderboard_orders_and_limits() {
    let fx = fixture().await;
    let leader = record(900, 30);
    let early = record(500, 20);
    let late = record(500, 10);
    for r in [&late, &leader, &early] {
        fx.store.put_xp_record(r.clone()).await;
    }

    let (status, body) = get(&fx, "/api/leaderboard?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], false);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user_id"], json!(leader.user_id));
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["user_id"], json!(early.user_id));
    assert_eq!(entries[1]["rank"], 2);

    let (status, body) = get(&fx, &format!("/api/users/{}/rank", late.user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rank"], 3);
    assert_eq!(body["total_xp"], 500);
}

#[tokio::test]
async fn leaderboard_degrades_when_store_fails() {
    let fx = fixture().await;
    fx.store.put_xp_record(record(300, 5)).await;
    fx.store.set_catalog_unavailable(true);

    let (status, body) = get(&fx, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], true);
    assert_eq!(body["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn bad_viewer_is_bad_request() {
    let fx = fixture().await;
    let (status, _) = get(&fx, "/api/leaderboard?viewer=nobody").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_user_ranks_after_everyone() {
    let fx = fixture().await;
    fx.store.put_xp_record(record(100, 5)).await;
    fx.store.put_xp_record(record(200, 5)).await;

    let (status, body) = get(&fx, &format!("/api/users/{}/rank", UserId::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rank"], 3);
    assert_eq!(body["total_xp"], 0);
    assert_eq!(body["level"]["level"], 1);
}

#[tokio::test]
async fn level_reflects_persisted_total() {
    let fx = fixture().await;
    let r = record(2500, 5);
    fx.store.put_xp_record(r.clone()).await;

    let (status, body) = get(&fx, &format!("/api/users/{}/level", r.user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], json!(r.user_id));
    assert_eq!(body["level"], 3);
    assert_eq!(body["current_xp"], 500);
    assert_eq!(body["required_xp"], 1000);
    assert_eq!(body["progress_percent"], 50);
}

#[tokio::test]
async fn recompute_uses_fallback_when_primary_is_down() {
    let fx = fixture().await;
    let user = UserId::new();
    let plan = fx.store.add_plan(user).await;
    fx.store.complete_plan_day(plan, 1).await;
    fx.store.complete_plan_day(plan, 2).await;
    fx.store.set_aggregate_unavailable(true);

    let uri = format!("/api/users/{user}/xp/recompute");
    let (status, body) = with_json(&fx, "POST", &uri, &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "fallback");
    assert_eq!(body["record"]["total_xp"], 200);
}

#[tokio::test]
async fn recompute_mismatch_is_internal_error() {
    let fx = fixture().await;
    let user = UserId::new();
    let plan = fx.store.add_plan(user).await;
    fx.store.complete_plan_day(plan, 1).await;
    fx.store.set_aggregate_skew(7);

    let uri = format!("/api/users/{user}/xp/recompute");
    let (status, body) = with_json(&fx, "POST", &uri, &json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);

    let (_, level) = get(&fx, &format!("/api/users/{user}/level")).await;
    assert_eq!(level["current_xp"], 0);
}

#[tokio::test]
async fn recompute_with_both_paths_down_is_unavailable() {
    let fx = fixture().await;
    fx.store.set_aggregate_unavailable(true);
    fx.store.set_sources_unavailable(true);

    let uri = format!("/api/users/{}/xp/recompute", UserId::new());
    let (status, _) = with_json(&fx, "POST", &uri, &json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
