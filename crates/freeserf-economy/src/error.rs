//! Errors for road construction, flag search, and transport scheduling.

use freeserf_map::Pos;

/// Why a road could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoadError {
    /// An intermediate tile was not passable (object present, or already a
    /// road/flag where one cannot attach).
    #[error("tile {0} is blocked")]
    Blocked(Pos),

    /// An intermediate tile is not owned by the building player.
    #[error("tile {0} is not owned by the requesting player")]
    NotOwned(Pos),

    /// The height delta between two consecutive tiles exceeds 4.
    #[error("height step at {0} exceeds the maximum climb")]
    TooSteep(Pos),

    /// The path mixed land and water tiles, or crossed itself.
    #[error("road path is not a single connected land or water route")]
    NoPath,

    /// The source flag reference does not exist.
    #[error("flag handle does not refer to a live flag")]
    DanglingFlag,
}

/// Errors surfaced by [`crate::flagsearch::FlagSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// A single search exceeded `FLAG_SEARCH_MAX_STEPS`; this is a fatal
    /// invariant violation in the original engine (a bug, not a runtime
    /// condition), kept here as a recoverable error instead of a panic.
    #[error("flag search exceeded the maximum step budget")]
    Runaway,
}

/// Errors surfaced while scheduling transport of a flag's waiting
/// resources. Scheduling failures are absorbed locally per the source's
/// error policy (§7): the caller clears the offending slot's destination
/// or leaves it queued for the next pass rather than propagating this
/// upward as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// No reachable destination was found for a resource with an unknown
    /// destination.
    #[error("no reachable destination for the resource in flag slot {0}")]
    Unreachable(usize),

    /// The flag referenced by a scheduling operation is not allocated.
    #[error("flag handle does not refer to a live flag")]
    DanglingFlag,
}
