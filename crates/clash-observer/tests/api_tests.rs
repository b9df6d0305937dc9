//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by the in-memory fake services.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use clash_core::config::DebateConfig;
use clash_core::prompt::PromptEngine;
use clash_core::testing::{FakeBackend, FakeServices};
use clash_core::DebateSession;
use clash_observer::router::build_router;
use clash_observer::state::AppState;
use clash_types::GraphRequest;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn make_state(fakes: &FakeServices) -> Arc<AppState<FakeBackend>> {
    let config = DebateConfig::default();
    let prompts = Arc::new(PromptEngine::builtin().unwrap());
    let session = DebateSession::generate(
        &config,
        &fakes.services(),
        Arc::clone(&prompts),
        GraphRequest::default(),
    )
    .await
    .unwrap();
    Arc::new(AppState::new(config, fakes.services(), prompts, session))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, path: &str) -> (StatusCode, Body) {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    (response.status(), response.into_body())
}

async fn post(router: &Router, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::post(path).body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Reads
// =========================================================================

#[tokio::test]
async fn test_get_session_before_start() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    let (status, body) = get(&router, "/api/session").await;
    assert_eq!(status, StatusCode::OK);

    let json = body_to_json(body).await;
    assert_eq!(json["turn"]["state"]["state"], "AwaitingFirstMove");
    assert_eq!(json["controls"]["can_start"], true);
    assert_eq!(json["controls"]["can_advance"], false);
    assert_eq!(json["simulation"]["status"], "idle");
    assert_eq!(json["ledger"]["influence_remaining"], 10);
}

#[tokio::test]
async fn test_results_csv_empty_is_404() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    let (status, body) = get(&router, "/api/results.csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json = body_to_json(body).await;
    assert_eq!(json["error"], "Nothing to download");
    assert_eq!(json["status"], 404);
}

// =========================================================================
// Turns
// =========================================================================

#[tokio::test]
async fn test_start_plays_red_opening() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    let (status, json) = post(&router, "/api/session/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["turn"]["state"]["state"], "BlueTurn");
    assert_eq!(json["turn"]["teams"][0]["turn_count"], 1);
    assert_eq!(json["turn"]["teams"][1]["turn_count"], 0);
    assert_eq!(json["controls"]["can_advance"], true);
    assert_eq!(fakes.engine.steps(), 1);

    let (status, _) = post(&router, "/api/session/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_advance_before_start_is_conflict() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    let (status, json) = post(&router, "/api/turn/advance", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
    assert_eq!(fakes.generator.calls(), 0);
}

#[tokio::test]
async fn test_advance_alternates_teams() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    post(&router, "/api/session/start", None).await;
    let (status, json) = post(&router, "/api/turn/advance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["turn"]["state"]["state"], "RedTurn");
    assert_eq!(json["turn"]["teams"][1]["turn_count"], 1);
    assert!(json["ledger"]["energy_remaining"].as_str().is_some());
}

#[tokio::test]
async fn test_human_team_submission() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);

    let (status, _) = post(
        &router,
        "/api/network",
        Some(json!({"nodes": 12, "blue": {"controller": "human", "topic": "Social media brings people together"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = post(&router, "/api/session/start", None).await;
    assert_eq!(json["turn"]["state"]["state"], "AwaitingHumanInput");
    assert_eq!(json["turn"]["state"]["team"], "Blue");
    assert_eq!(json["controls"]["awaiting_human"], "Blue");

    let (status, _) = post(&router, "/api/turn/advance", None).await;
    assert_eq!(status, StatusCode::OK, "advance on a human turn is a no-op");

    let (status, json) = post(
        &router,
        "/api/turn/human",
        Some(json!({"team": "Blue", "text": "Group chats keep families close"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["turn"]["state"]["state"], "RedTurn");
    assert_eq!(
        json["turn"]["teams"][1]["messages"][0]["text"],
        "Group chats keep families close"
    );
}

#[tokio::test]
async fn test_human_submission_for_wrong_team_is_conflict() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);
    post(&router, "/api/session/start", None).await;

    let (status, _) = post(
        &router,
        "/api/turn/human",
        Some(json!({"team": "Red", "text": "Out of turn"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// =========================================================================
// Network and lifecycle
// =========================================================================

#[tokio::test]
async fn test_invalid_network_is_rejected_before_service_call() {
    let fakes = FakeServices::compliant();
    let state = make_state(&fakes).await;
    let before = state.view().await.session_id;
    let router = build_router(Arc::clone(&state));

    let (status, json) = post(&router, "/api/network", Some(json!({"nodes": 80}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("nodes"));
    assert_eq!(fakes.graphs.requests().len(), 1, "only the initial graph");
    assert_eq!(state.view().await.session_id, before);
}

#[tokio::test]
async fn test_generate_network_replaces_session() {
    let fakes = FakeServices::compliant();
    let state = make_state(&fakes).await;
    let before = state.view().await.session_id;
    let router = build_router(Arc::clone(&state));
    post(&router, "/api/session/start", None).await;

    let (status, json) = post(
        &router,
        "/api/network",
        Some(json!({"kind": "watts_strogatz", "nodes": 20, "uncertainty": 0.333})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(json["session_id"], serde_json::to_value(before).unwrap());
    assert_eq!(json["turn"]["state"]["state"], "AwaitingFirstMove");

    let last = fakes.graphs.requests().pop().unwrap();
    assert_eq!(last.nodes, 20);
    assert!((last.uncertainty - 0.33).abs() < 1e-9);
}

#[tokio::test]
async fn test_restart_builds_fresh_session() {
    let fakes = FakeServices::compliant();
    let state = make_state(&fakes).await;
    let router = build_router(Arc::clone(&state));
    post(&router, "/api/session/start", None).await;

    let (status, json) = post(&router, "/api/session/restart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fakes.engine.restarts(), 1);
    assert_eq!(json["turn"]["teams"][0]["turn_count"], 0);
    assert_eq!(json["controls"]["can_start"], true);
}

// =========================================================================
// Simulation and results
// =========================================================================

#[tokio::test]
async fn test_manual_poll_and_results_csv() {
    let fakes = FakeServices::compliant();
    let router = build_router(make_state(&fakes).await);
    post(&router, "/api/session/start", None).await;

    let (status, json) = post(&router, "/api/simulation/poll", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");

    let response = router
        .clone()
        .oneshot(Request::get("/api/results.csv").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("sep=|\n"));
    assert!(csv.contains("|Red|"));
}

// =========================================================================
// Autoplay
// =========================================================================

#[tokio::test]
async fn test_play_before_start_is_conflict() {
    let fakes = FakeServices::compliant();
    let state = make_state(&fakes).await;
    let router = build_router(Arc::clone(&state));

    let (status, _) = post(&router, "/api/autoplay/play", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!state.autoplay().is_active());
}

#[tokio::test]
async fn test_manual_advance_rejected_during_autoplay() {
    let fakes = FakeServices::compliant();
    let gate = fakes.generator.gate();
    gate.add_permits(1);
    let state = make_state(&fakes).await;
    let router = build_router(Arc::clone(&state));
    post(&router, "/api/session/start", None).await;

    let (status, json) = post(&router, "/api/autoplay/play", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["controls"]["can_pause"], true);
    assert_eq!(json["controls"]["can_advance"], false);

    let (status, json) = post(&router, "/api/turn/advance", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("autoplay"));

    let (status, json) = post(&router, "/api/simulation/poll", None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{json}");

    let (status, json) = post(&router, "/api/autoplay/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["controls"]["can_pause"], false);
    assert!(!state.autoplay().is_active());
}

#[tokio::test]
async fn test_autoplay_failure_is_shown_until_next_success() {
    let fakes = FakeServices::compliant();
    let state = make_state(&fakes).await;
    let router = build_router(Arc::clone(&state));
    post(&router, "/api/session/start", None).await;
    fakes.generator.set_failing(true);

    let (status, _) = post(&router, "/api/autoplay/play", None).await;
    assert_eq!(status, StatusCode::OK);
    for _ in 0..100 {
        if !state.autoplay().is_active() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let (status, body) = get(&router, "/api/session").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert!(
        json["last_error"]
            .as_str()
            .unwrap()
            .contains("generator offline")
    );
    assert_eq!(json["controls"]["can_pause"], false);
    assert_eq!(json["controls"]["can_play"], true);

    fakes.generator.set_failing(false);
    let (status, json) = post(&router, "/api/turn/advance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["last_error"].is_null());
}

#[tokio::test]
async fn test_results_csv_does_not_wait_on_a_turn_in_flight() {
    let fakes = FakeServices::compliant();
    let gate = fakes.generator.gate();
    gate.add_permits(1);
    let state = make_state(&fakes).await;
    let router = build_router(Arc::clone(&state));
    post(&router, "/api/session/start", None).await;

    let (status, _) = post(&router, "/api/autoplay/play", None).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(fakes.generator.calls(), 1, "Blue's generation is parked");

    let (status, _) = get(&router, "/api/results.csv").await;
    assert_eq!(status, StatusCode::OK);

    post(&router, "/api/autoplay/pause", None).await;
    gate.add_permits(1);
}
