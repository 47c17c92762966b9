//! Error types for the engine binary.

/// Top-level error for the engine binary. Each variant wraps a specific
/// subsystem's error so `main` can propagate everything with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {0}")]
    Config(#[from] freeserf_sim::config::ConfigError),

    /// Map construction failed.
    #[error("map error: {0}")]
    Map(#[from] freeserf_map::MapError),

    /// A game tick failed to run to completion.
    #[error("tick error: {0}")]
    Tick(#[from] freeserf_sim::TickError),

    /// Snapshot save or load failed.
    #[error("persistence error: {0}")]
    Persist(#[from] freeserf_persistence::PersistError),

    /// The observer server failed to start or exited with an error.
    #[error("observer error: {0}")]
    Observer(#[from] freeserf_observer::ServerError),

    /// A filesystem or stdin/stdout operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
