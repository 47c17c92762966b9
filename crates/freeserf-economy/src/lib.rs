//! The flag-to-flag road network: construction/demolition, generational
//! breadth-first search, and the transport scheduler that routes
//! resources across it.
//!
//! This crate sits between `freeserf-entities` (the flag/building/
//! inventory/serf data model) and `freeserf-sim` (the tick that drives
//! all of it forward). It owns everything that needs the map and the
//! flag graph together but does not yet need the serf finite-state
//! machine.

pub mod error;
pub mod flagsearch;
pub mod roadgraph;
pub mod scheduler;

pub use error::{RoadError, SchedulerError, SearchError};
pub use flagsearch::{FlagSearch, SearchCounter, SearchFilter};
pub use roadgraph::{build_road, demolish_road, split_path_at_flag};
pub use scheduler::{FlagPriorities, TransportScheduler};
