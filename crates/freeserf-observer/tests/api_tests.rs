//! Integration tests for the Observer API endpoints.
//!
//! These drive Axum's `Router` directly through `tower::ServiceExt`
//! rather than a live TCP listener, exercising routing and handler
//! logic without network I/O.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use freeserf_observer::router::build_router;
use freeserf_observer::state::AppState;
use freeserf_sim::PlayerState;
use serde_json::Value;
use tower::ServiceExt;

async fn make_test_state() -> Arc<AppState> {
    let state = Arc::new(AppState::new());
    {
        let mut snapshot = state.snapshot.write().await;
        snapshot.game_tick = 42;
        snapshot.game_speed = 0x1_0000;
        snapshot.paused = false;
        snapshot.map_cols = 64;
        snapshot.map_rows = 64;

        let mut player = PlayerState::new(0, 64, 64, 64);
        player.active = true;
        player.has_castle = true;
        player.total_land_area = 17;
        snapshot.players.push(player);
    }
    state
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_snapshot_reports_tick_and_players() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["game_tick"], 42);
    assert_eq!(body["players"][0]["player"], 0);
    assert_eq!(body["players"][0]["has_castle"], true);
}

#[tokio::test]
async fn get_player_returns_full_state_for_known_player() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/players/0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_land_area"], 17);
    assert!(body["flag_prio"].is_array());
}

#[tokio::test]
async fn get_player_404s_for_unknown_player() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/players/9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn observer_router_has_no_command_routes() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
