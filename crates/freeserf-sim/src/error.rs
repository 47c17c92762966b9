//! Errors for the simulation state, tick cycle, and command surface.

use freeserf_economy::{RoadError, SchedulerError, SearchError};
use freeserf_entities::EntityError;
use freeserf_map::MapError;
use freeserf_types::{BuildingId, FlagId, PlayerNum};

/// Errors surfaced by running a tick or applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// An entity arena operation failed (allocation exhausted, dangling
    /// handle).
    #[error("entity error: {0}")]
    Entity(#[from] EntityError),

    /// A map operation failed (out of bounds, invariant violated).
    #[error("map error: {0}")]
    Map(#[from] MapError),

    /// Road construction or demolition failed.
    #[error("road error: {0}")]
    Road(#[from] RoadError),

    /// A flag search ran away past its step budget.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Transport scheduling failed in a way the scheduler itself could
    /// not absorb locally.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// A command referenced a flag that does not exist.
    #[error("no such flag: {0:?}")]
    NoSuchFlag(FlagId),

    /// A command referenced a building that does not exist.
    #[error("no such building: {0:?}")]
    NoSuchBuilding(BuildingId),

    /// A command referenced a player slot that does not exist.
    #[error("no such player: {0}")]
    NoSuchPlayer(PlayerNum),

    /// A command targeted a tile the issuing player does not own.
    #[error("player {player} does not own position {pos}")]
    NotOwned {
        /// The player who issued the command.
        player: PlayerNum,
        /// The disputed position.
        pos: freeserf_map::Pos,
    },

    /// The simulation clock's tick counter would overflow.
    #[error("tick counter overflow")]
    TickOverflow,
}
