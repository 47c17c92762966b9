//! Observer HTTP server lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind address and port for the Observer server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// Errors that can occur starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the configured address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server stopped with a fatal I/O error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind to `config`'s address, build the router, and serve requests
/// until the process is terminated.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or the port
/// cannot be bound, or [`ServerError::Serve`] if accepting connections
/// fails fatally.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|err| ServerError::Bind(format!("invalid address: {err}")))?;

    let router = build_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Bind(format!("bind failed on {addr}: {err}")))?;

    info!(%addr, "observer server listening");

    axum::serve(listener, router)
        .await
        .map_err(|err| ServerError::Serve(format!("serve error: {err}")))?;

    Ok(())
}
