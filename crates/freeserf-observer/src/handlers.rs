//! REST endpoint handlers for the Observer server.
//!
//! Every handler reads from the in-memory [`SimulationSnapshot`] behind
//! [`AppState`] — there is no other data source, and no handler ever
//! mutates it. That asymmetry is the whole point of this crate: an
//! external dashboard can watch a running realm but never steer it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// One player's summary row in the `/snapshot` response.
#[derive(Debug, Serialize)]
struct PlayerSummary {
    player: freeserf_types::PlayerNum,
    active: bool,
    has_castle: bool,
    total_land_area: u32,
    total_building_score: u32,
    total_military_score: u32,
    notification_count: usize,
}

/// Realm-wide summary returned by `GET /snapshot`.
#[derive(Debug, Serialize)]
struct SnapshotResponse {
    game_tick: u32,
    game_speed: u32,
    paused: bool,
    map_cols: u32,
    map_rows: u32,
    players: Vec<PlayerSummary>,
}

/// `GET /snapshot` — map size, tick, and a per-player summary row with
/// running totals and notification counts.
pub async fn get_snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let snapshot = state.snapshot.read().await;
    let body = SnapshotResponse {
        game_tick: snapshot.game_tick,
        game_speed: snapshot.game_speed,
        paused: snapshot.paused,
        map_cols: snapshot.map_cols,
        map_rows: snapshot.map_rows,
        players: snapshot
            .players
            .iter()
            .map(|p| PlayerSummary {
                player: p.player,
                active: p.active,
                has_castle: p.has_castle,
                total_land_area: p.total_land_area,
                total_building_score: p.total_building_score,
                total_military_score: p.total_military_score,
                notification_count: p.notifications.len(),
            })
            .collect(),
    };
    Ok(Json(body))
}

/// `GET /players/:id` — one player's full priority tables, knight
/// occupation targets, and sampled statistics history.
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<freeserf_types::PlayerNum>,
) -> Result<impl IntoResponse, ObserverError> {
    let snapshot = state.snapshot.read().await;
    let player = snapshot
        .player(id)
        .ok_or_else(|| ObserverError::NotFound(format!("player {id}")))?;
    Ok(Json(serde_json::to_value(player)?))
}
