//! Errors for map-grid operations.

use thiserror::Error;

/// Errors raised by [`crate::Map`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Map dimensions must be powers of two.
    #[error("map dimensions must be powers of two, got {cols}x{rows}")]
    DimensionsNotPowerOfTwo {
        /// Requested column count.
        cols: u32,
        /// Requested row count.
        rows: u32,
    },

    /// A position lay outside the map's tile count.
    #[error("position {0} is out of bounds")]
    OutOfBounds(u32),

    /// `add_path`/`remove_path` was asked to toggle a bit that was already
    /// in the requested state, or whose reverse bit was inconsistent.
    #[error("path invariant violated at {pos} direction {dir:?}: {reason}")]
    PathInvariant {
        /// The position at which the invariant failed.
        pos: u32,
        /// The direction in question.
        dir: freeserf_types::Direction,
        /// Human-readable explanation.
        reason: &'static str,
    },

    /// Attempted to remove more of a ground deposit or fish stock than is
    /// present.
    #[error("cannot remove {amount} from a deposit/fish stock of {available}")]
    InsufficientDeposit {
        /// Amount requested.
        amount: u8,
        /// Amount actually present.
        available: u8,
    },
}
