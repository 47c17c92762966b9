//! Read-only Observer API for a running simulation.
//!
//! This crate is an `axum` server that lets an external dashboard or
//! test harness watch a simulation without ever being able to steer
//! it: every route is a `GET`, and the one `WebSocket` route only
//! pushes a tick summary outward. The engine binary owns the
//! [`state::AppState`] it's built from — refreshing the snapshot and
//! broadcasting after each completed tick is the engine's job, not
//! this crate's.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::{AppState, SimulationSnapshot, TickBroadcast};
