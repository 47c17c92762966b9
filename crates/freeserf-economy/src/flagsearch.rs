//! Generational breadth-first search over the flag graph.
//!
//! Every search gets a fresh, monotonically increasing id stamped into the
//! flags it visits (`Flag::search_num`), so membership in "already visited
//! by this search" is a single integer comparison rather than a
//! per-search `HashSet`. The counter wraps by resetting every flag's
//! `search_num` to zero and continuing from 1, matching the source's
//! wrap-around policy.

use std::collections::VecDeque;

use freeserf_entities::{Flag, FlagArena};
use freeserf_map::Map;
use freeserf_types::{Direction, FlagId, FlagOrBuilding, FLAG_SEARCH_MAX_STEPS};

use crate::error::SearchError;

/// Owns the monotonic search-id counter shared by every [`FlagSearch`]
/// created over one [`FlagArena`]. One instance lives as long as the
/// simulation (it is part of `SimulationState` in `freeserf-sim`).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchCounter {
    counter: u32,
}

impl SearchCounter {
    /// A fresh counter starting before the first search id (`0`, which no
    /// flag's `search_num` ever equals since flags start at `0` too — the
    /// first call to `next_id` advances past that).
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Allocate the next search id, resetting every flag's `search_num` to
    /// zero first if the counter would otherwise wrap to zero.
    pub fn next_id(&mut self, flags: &mut FlagArena) -> u32 {
        let Some(next) = self.counter.checked_add(1) else {
            for (_, flag) in flags.iter_mut() {
                flag.search_num = 0;
                flag.search_dir = None;
            }
            self.counter = 1;
            return self.counter;
        };
        self.counter = next;
        self.counter
    }
}

/// Filters applied while walking flag-to-flag edges during a search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilter {
    /// Only cross edges that are not water segments.
    pub land_only: bool,
    /// Only cross edges that already have at least one transporter
    /// assigned.
    pub transporter_required: bool,
}

/// A single generational BFS run over the flag graph.
///
/// Construct with [`FlagSearch::new`], seed one or more sources with
/// [`FlagSearch::add_source`], then consume it with
/// [`FlagSearch::execute`]. For the common one-source case, use
/// [`FlagSearch::single`].
pub struct FlagSearch {
    id: u32,
    queue: VecDeque<FlagId>,
}

impl FlagSearch {
    /// Begin a new search, allocating a fresh generation id.
    pub fn new(counter: &mut SearchCounter, flags: &mut FlagArena) -> Self {
        Self {
            id: counter.next_id(flags),
            queue: VecDeque::new(),
        }
    }

    /// Seed a source flag. Multiple calls seed a multi-source BFS. A flag
    /// already visited in this search (including a prior `add_source`
    /// call) is a no-op.
    pub fn add_source(&mut self, source: FlagId, flags: &mut FlagArena) {
        let Some(flag) = flags.get_mut(source) else {
            return;
        };
        if flag.search_num == self.id {
            return;
        }
        flag.search_num = self.id;
        flag.search_dir = None;
        self.queue.push_back(source);
    }

    /// Run the search to completion (or until `callback` returns `true`),
    /// visiting flags FIFO and their neighbors in descending direction
    /// order (5..0).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Runaway`] if more than
    /// [`FLAG_SEARCH_MAX_STEPS`] flags are popped without the callback
    /// halting the search — a fatal invariant violation in the original
    /// engine, surfaced here as a recoverable error.
    pub fn execute<F>(
        mut self,
        map: &Map,
        flags: &mut FlagArena,
        filter: SearchFilter,
        mut callback: F,
    ) -> Result<bool, SearchError>
    where
        F: FnMut(FlagId, &Flag) -> bool,
    {
        let mut steps = 0usize;
        while let Some(current) = self.queue.pop_front() {
            steps = steps.saturating_add(1);
            if steps > FLAG_SEARCH_MAX_STEPS {
                return Err(SearchError::Runaway);
            }

            let Some(current_flag) = flags.get(current) else {
                continue;
            };
            if callback(current, current_flag) {
                return Ok(true);
            }

            let neighbors: Vec<(Direction, FlagOrBuilding, bool, bool)> = Direction::descending()
                .into_iter()
                .filter_map(|dir| {
                    current_flag
                        .neighbors
                        .get(dir as usize)
                        .copied()
                        .flatten()
                        .map(|n| (dir, n, current_flag.is_water(dir), current_flag.has_transporter(dir)))
                })
                .collect();

            for (dir, neighbor, is_water, has_transporter) in neighbors {
                let FlagOrBuilding::Flag(next) = neighbor else {
                    continue;
                };
                if filter.land_only && is_water {
                    continue;
                }
                if filter.transporter_required && !has_transporter {
                    continue;
                }
                let Some(next_flag) = flags.get_mut(next) else {
                    continue;
                };
                if next_flag.search_num == self.id {
                    continue;
                }
                next_flag.search_num = self.id;
                next_flag.search_dir = Some(dir);
                self.queue.push_back(next);
            }
        }
        Ok(false)
    }

    /// Convenience: a single-source search.
    ///
    /// # Errors
    ///
    /// See [`FlagSearch::execute`].
    pub fn single<F>(
        counter: &mut SearchCounter,
        flags: &mut FlagArena,
        map: &Map,
        source: FlagId,
        filter: SearchFilter,
        callback: F,
    ) -> Result<bool, SearchError>
    where
        F: FnMut(FlagId, &Flag) -> bool,
    {
        let mut search = Self::new(counter, flags);
        search.add_source(source, flags);
        search.execute(map, flags, filter, callback)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_map::MapUpdateConfig;
    use freeserf_types::PlayerNum;

    fn chain(len: usize, map: &Map, flags: &mut FlagArena) -> Vec<FlagId> {
        let mut handles = Vec::new();
        for i in 0..len {
            let pos = map.from_col_row(i as u32, 0);
            let (h, _) = flags.alloc(Flag::new(pos, 0 as PlayerNum)).unwrap();
            handles.push(h);
        }
        for i in 0..len - 1 {
            let a = handles[i];
            let b = handles[i + 1];
            if let Some(fa) = flags.get_mut(a) {
                fa.set_path(Direction::Right);
                fa.neighbors[Direction::Right as usize] = Some(FlagOrBuilding::Flag(b));
            }
            if let Some(fb) = flags.get_mut(b) {
                fb.set_path(Direction::Left);
                fb.neighbors[Direction::Left as usize] = Some(FlagOrBuilding::Flag(a));
            }
        }
        handles
    }

    #[test]
    fn visits_each_flag_at_most_once() {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut flags = FlagArena::new(8, freeserf_entities::ArenaKind::Flag);
        let handles = chain(4, &map, &mut flags);
        let mut counter = SearchCounter::new();
        let mut visited = Vec::new();
        FlagSearch::single(
            &mut counter,
            &mut flags,
            &map,
            handles[0],
            SearchFilter::default(),
            |id, _| {
                visited.push(id);
                false
            },
        )
        .unwrap();
        assert_eq!(visited.len(), 4);
        let mut dedup = visited.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), visited.len());
    }

    #[test]
    fn callback_halts_search_early() {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut flags = FlagArena::new(8, freeserf_entities::ArenaKind::Flag);
        let handles = chain(4, &map, &mut flags);
        let mut counter = SearchCounter::new();
        let mut visited = Vec::new();
        let found = FlagSearch::single(
            &mut counter,
            &mut flags,
            &map,
            handles[0],
            SearchFilter::default(),
            |id, _| {
                visited.push(id);
                id == handles[1]
            },
        )
        .unwrap();
        assert!(found);
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn counter_wraps_and_resets_search_nums() {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut flags = FlagArena::new(8, freeserf_entities::ArenaKind::Flag);
        let handles = chain(2, &map, &mut flags);
        let mut counter = SearchCounter { counter: u32::MAX };
        let id = counter.next_id(&mut flags);
        assert_eq!(id, 1);
        assert_eq!(flags.get(handles[0]).unwrap().search_num, 0);
    }
}
