//! Axum router construction for the Observer API.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete read-only Observer router.
///
/// - `GET /snapshot` — realm summary.
/// - `GET /players/:id` — one player's priorities, knight occupation,
///   and stats history.
/// - `GET /ws` — `WebSocket` tick summary stream.
///
/// There is no POST/PUT/DELETE route anywhere in this router — the
/// observer cannot be used to submit a command.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/snapshot", get(handlers::get_snapshot))
        .route("/players/{id}", get(handlers::get_player))
        .route("/ws", get(ws::ws_ticks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
