//! The fixed, seven-phase per-tick simulation pipeline.
//!
//! Every game tick runs the same phases in the same numbered order: map
//! growth, per-player bookkeeping, transporter dispatch, flag
//! scheduling, building production, serf stepping, and finally the
//! realm-wide stats rollup.
//! `run` advances exactly one game tick; [`crate::state::SimulationState::due_game_ticks`]
//! decides how many times to call it per real tick.

use thiserror::Error;
use tracing::debug;

use freeserf_economy::TransportScheduler;
use freeserf_types::SerfType;

use crate::building_update;
use crate::error::SimError;
use crate::player::ReproductionEvent;
use crate::serf_fsm;
use crate::state::SimulationState;
use crate::territory;

/// Everything that can go wrong while advancing one game tick.
#[derive(Debug, Error)]
pub enum TickError {
    /// A phase failed with a simulation error.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// The monotonic game tick counter would overflow `u32`.
    #[error("game tick counter overflowed")]
    Overflow,
}

/// A summary of what happened during one game tick, for logging and for
/// the observer API's per-tick push.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TickSummary {
    /// The game tick that just completed.
    pub game_tick: u32,
    /// How many reproduction events (generic spawn or knight promotion
    /// attempt) fired across all players this tick.
    pub reproduction_events: u32,
    /// How many buildings finished construction this tick.
    pub buildings_completed: u32,
    /// How many notifications were queued across all players this tick.
    pub notifications_emitted: u32,
}

/// Run one game tick to completion.
///
/// # Errors
///
/// Returns [`TickError`] if any phase fails, or if the game tick counter
/// would overflow.
pub fn run(sim: &mut SimulationState) -> Result<TickSummary, TickError> {
    let mut summary = TickSummary {
        game_tick: sim.game_tick,
        ..TickSummary::default()
    };

    // Phase 1: map growth, decay, and fish reproduction.
    sim.map.update(&mut sim.rng);
    debug!(tick = sim.game_tick, phase = 1, "map update");

    // Phase 2: per-player reproduction/stats bookkeeping.
    let total_resources = sim.resource_totals();
    let events: Vec<(freeserf_types::PlayerNum, ReproductionEvent)> = sim
        .players
        .iter_mut()
        .filter_map(|player| {
            let before = player.notifications.len();
            let event = player.tick(1, total_resources);
            summary.notifications_emitted +=
                u32::try_from(player.notifications.len().saturating_sub(before)).unwrap_or(0);
            event.map(|ev| (player.player, ev))
        })
        .collect();
    for (player, event) in events {
        apply_reproduction_event(sim, player, event);
        summary.reproduction_events += 1;
    }
    debug!(tick = sim.game_tick, phase = 2, "player update");

    // Phase 3: transporter dispatch — make sure every path with waiting
    // cargo and no transporter gets one called from a nearby inventory.
    let flag_dirs: Vec<(freeserf_types::FlagId, freeserf_types::Direction)> = sim
        .entities
        .flags
        .iter()
        .flat_map(|(id, flag)| {
            freeserf_types::Direction::descending()
                .into_iter()
                .filter(move |&dir| flag.has_path(dir))
                .map(move |dir| (id, dir))
        })
        .collect();
    for (flag_id, dir) in flag_dirs {
        let is_water = sim
            .entities
            .flags
            .get(flag_id)
            .is_some_and(|f| f.is_water(dir));
        TransportScheduler::call_transporter(
            flag_id,
            dir,
            is_water,
            &mut sim.entities.flags,
            &mut sim.entities.inventories,
            &sim.map,
            &mut sim.search_counter,
        );
    }
    debug!(tick = sim.game_tick, phase = 3, "transporter dispatch");

    // Phase 4: flag-to-flag resource scheduling.
    let flag_prio = sim
        .players
        .first()
        .map(|p| p.flag_prio)
        .unwrap_or([128; 26]);
    TransportScheduler::update(
        &mut sim.entities.flags,
        &sim.entities.buildings,
        &sim.entities.inventories,
        &sim.map,
        &mut sim.search_counter,
        &flag_prio,
    )?;
    debug!(tick = sim.game_tick, phase = 4, "flag scheduler");

    // Phase 5: building production and construction progress.
    let completed = building_update::update(sim)?;
    summary.buildings_completed = completed;
    debug!(tick = sim.game_tick, phase = 5, "building update");

    // Phase 6: serf stepping.
    serf_fsm::update(sim)?;
    debug!(tick = sim.game_tick, phase = 6, "serf update");

    // Phase 7: realm-wide land/building/military totals.
    let (buildings, serfs) = (&sim.entities.buildings, &sim.entities.serfs);
    territory::recompute_totals(&sim.map, buildings, serfs, &mut sim.players);
    debug!(tick = sim.game_tick, phase = 7, "stats update");

    sim.game_tick = sim.game_tick.checked_add(1).ok_or(TickError::Overflow)?;
    summary.game_tick = sim.game_tick;
    Ok(summary)
}

/// Resolve a player's reproduction event against its inventories.
///
/// Idle population lives as bookkeeping counts inside each
/// [`freeserf_entities::Inventory`], not as standalone serf entities, so
/// growing the population or promoting a knight is pure inventory
/// accounting until the serf actually leaves to do something.
fn apply_reproduction_event(
    sim: &mut SimulationState,
    player: freeserf_types::PlayerNum,
    event: ReproductionEvent,
) {
    let Some((inv_id, _)) = sim
        .entities
        .inventories
        .iter()
        .find(|(_, inv)| inv.player == player)
    else {
        return;
    };
    let Some(inv) = sim.entities.inventories.get_mut(inv_id) else {
        return;
    };
    match event {
        ReproductionEvent::SpawnGeneric => inv.add_serf(SerfType::Generic),
        ReproductionEvent::TryKnightPromotion => {
            if inv.serf_count(SerfType::Generic) > 0 {
                let _ = inv.remove_serf(SerfType::Generic);
                inv.add_serf(SerfType::Knight0);
            }
        }
    }
}
