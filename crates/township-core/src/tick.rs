//! Tick cycle: one simulation step for every agent.
//!
//! Each step runs through these phases:
//!
//! 1. **Occupancy** -- object events written last step go back to idle,
//!    every agent's event moves from the tile it was written to onto the
//!    tile it now stands on, and agents that have arrived write their
//!    object's event. All of it is staged and committed in one pass.
//!
//! 2. **Cognition** -- in name order, each agent perceives, recalls
//!    associations, plans (possibly starting a conversation that also
//!    changes its partner), reflects, and picks its next tile. A failing
//!    agent is logged and holds its position; the others carry on.
//!
//! 3. **Movement** -- every agent moves to its chosen tile at once, the
//!    step's movement record is folded into the log, and the clock
//!    advances.
//!
//! The cycle is deterministic given the same initial state, seed, and
//! oracle answers.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rand::SeedableRng;
use rand::rngs::StdRng;
use township_agents::{Agent, AgentError, NavigationContext, next_step};
use township_types::{AgentMovement, MovementLog, TickMovement, TileEvent, TilePos};
use township_world::{CommitReport, Grid, StagedWrites};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimClock, day_change};
use crate::oracle::OracleGuard;
use crate::perception::{associate, perceive};
use crate::planning::{PlanContext, plan};
use crate::reflect::reflect;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// One agent's step failed.
    #[error("agent error for {agent}: {source}")]
    Agent {
        /// The agent whose step failed.
        agent: String,
        /// The underlying agent error.
        source: AgentError,
    },
}

/// Summary of a single step.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The step that was executed.
    pub step: u64,
    /// Simulation time the step was computed at.
    pub curr_time: NaiveDateTime,
    /// What every agent did.
    pub movement: TickMovement,
    /// Agents whose step failed and who held their position.
    pub failed_agents: Vec<String>,
    /// Outcome of the occupancy commit.
    pub tile_writes: CommitReport,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// Step counter and simulation time.
    pub clock: SimClock,
    /// The world.
    pub grid: Grid,
    /// Every agent, by name.
    pub agents: BTreeMap<String, Agent>,
    /// Seeded randomness for target sampling and focus selection.
    pub rng: StdRng,
    /// Address used when an action address is unknown.
    pub fallback_address: String,
    /// Compressed movement replay.
    pub movement_log: MovementLog,
    /// Tile each agent's event was last written to.
    pub occupancy: BTreeMap<String, TilePos>,
    /// Object events written last step, idled at the start of the next.
    pub object_cleanup: Vec<(TilePos, TileEvent)>,
}

impl SimulationState {
    /// A fresh simulation.
    pub fn new(
        clock: SimClock,
        grid: Grid,
        agents: impl IntoIterator<Item = Agent>,
        seed: u64,
        fallback_address: impl Into<String>,
    ) -> Self {
        Self {
            clock,
            grid,
            agents: agents
                .into_iter()
                .map(|agent| (agent.name().to_owned(), agent))
                .collect(),
            rng: StdRng::seed_from_u64(seed),
            fallback_address: fallback_address.into(),
            movement_log: MovementLog::new(),
            occupancy: BTreeMap::new(),
            object_cleanup: Vec::new(),
        }
    }

    /// Where every agent stands.
    pub fn agent_tiles(&self) -> BTreeMap<String, TilePos> {
        self.agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.tile()))
            .collect()
    }
}

/// Read-only context for one agent's step.
struct StepContext<'a> {
    grid: &'a Grid,
    agent_tiles: &'a BTreeMap<String, TilePos>,
    fallback_address: &'a str,
    now: NaiveDateTime,
    sec_per_step: u32,
}

/// Execute one step for every agent.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if the clock cannot advance. Per-agent
/// failures never abort the step; they are reported in
/// [`TickSummary::failed_agents`].
pub fn run_tick(
    state: &mut SimulationState,
    guard: &mut OracleGuard,
) -> Result<TickSummary, TickError> {
    let step = state.clock.step();
    let now = state.clock.curr_time();
    debug!(step, time = %now, "Step started");

    // --- Phase 1: Occupancy ---
    let tile_writes = phase_occupancy(state);

    // --- Phase 2: Cognition ---
    let agent_tiles = state.agent_tiles();
    let ctx = StepContext {
        grid: &state.grid,
        agent_tiles: &agent_tiles,
        fallback_address: &state.fallback_address,
        now,
        sec_per_step: state.clock.sec_per_step(),
    };
    let mut next_tiles = BTreeMap::new();
    let mut failed_agents = Vec::new();
    let names: Vec<String> = state.agents.keys().cloned().collect();
    for name in names {
        let Some(mut agent) = state.agents.remove(&name) else {
            continue;
        };
        let next = match step_agent(&mut agent, &mut state.agents, &ctx, guard, &mut state.rng) {
            Ok(tile) => tile,
            Err(e) => {
                warn!(error = %e, "Agent step failed, holding position");
                failed_agents.push(name.clone());
                agent.tile()
            }
        };
        next_tiles.insert(name.clone(), next);
        state.agents.insert(name, agent);
    }

    // --- Phase 3: Movement ---
    let mut agents = BTreeMap::new();
    for (name, next_tile) in next_tiles {
        let Some(agent) = state.agents.get_mut(&name) else {
            continue;
        };
        agent.scratch.curr_tile = next_tile;
        let action = &agent.scratch.action;
        agents.insert(
            name,
            AgentMovement {
                next_tile,
                pronunciation: action.pronunciation.clone(),
                description: action.movement_description(),
                chat: action.chat.clone(),
            },
        );
    }
    let movement = TickMovement {
        step,
        curr_time: now,
        agents,
    };
    let changed = state.movement_log.record(&movement);
    state.clock.advance()?;

    info!(
        step,
        time = %now,
        agents = movement.agents.len(),
        changed,
        failed = failed_agents.len(),
        "Step complete"
    );
    Ok(TickSummary {
        step,
        curr_time: now,
        movement,
        failed_agents,
        tile_writes,
    })
}

/// Phase 1: move agent and object events to where agents now stand.
fn phase_occupancy(state: &mut SimulationState) -> CommitReport {
    let mut staged = StagedWrites::new();
    for (tile, event) in state.object_cleanup.drain(..) {
        staged.idle(tile, event);
    }
    for (name, agent) in &state.agents {
        let here = agent.tile();
        if let Some(previous) = state.occupancy.insert(name.clone(), here) {
            staged.clear_subject(previous, name.clone());
        }
        staged.add(here, agent.scratch.action.current_event(name));
        if agent.scratch.action.planned_path.is_empty()
            && let Some(object_event) = agent.scratch.action.current_object_event()
        {
            state.object_cleanup.push((here, object_event.clone()));
            staged.add(here, object_event);
        }
    }
    let report = state.grid.commit(staged);
    if report.rejected > 0 {
        warn!(rejected = report.rejected, "Occupancy writes rejected");
    }
    report
}

/// Phase 2 for one agent. Returns the tile to move to.
fn step_agent(
    agent: &mut Agent,
    others: &mut BTreeMap<String, Agent>,
    ctx: &StepContext<'_>,
    guard: &mut OracleGuard,
    rng: &mut StdRng,
) -> Result<TilePos, TickError> {
    let name = agent.name().to_owned();
    let wrap = |source: AgentError| TickError::Agent {
        agent: name.clone(),
        source,
    };

    let change = day_change(agent.scratch.curr_time, ctx.now);
    agent.scratch.curr_time = Some(ctx.now);

    let perceived = perceive(agent, ctx.grid, guard, ctx.now).map_err(wrap)?;
    let associations = associate(agent, &perceived);

    let plan_ctx = PlanContext {
        grid: ctx.grid,
        now: ctx.now,
        day_change: change,
        fallback_address: ctx.fallback_address,
    };
    plan(agent, others, &associations, &plan_ctx, guard, rng).map_err(wrap)?;
    if !agent.scratch.schedule.is_empty() {
        agent.scratch.schedule.enforce_day_total();
    }

    reflect(agent, ctx.now, ctx.sec_per_step, guard).map_err(wrap)?;

    let nav = NavigationContext {
        grid: ctx.grid,
        agent_tiles: ctx.agent_tiles,
        fallback_address: ctx.fallback_address,
    };
    let here = agent.tile();
    next_step(&mut agent.scratch.action, &name, here, &nav, rng).map_err(wrap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_agents::{AgentProfile, CognitiveConfig};
    use township_types::time::MINUTES_PER_DAY;
    use township_world::{SAMPLE_FALLBACK_ADDRESS, sample_town};

    use super::*;
    use crate::stub::{HashEmbedding, StubCognition};

    fn guard() -> OracleGuard {
        OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(HashEmbedding::new(16)),
            1,
        )
    }

    fn agent(name: &str, tile: TilePos) -> Agent {
        let profile = AgentProfile {
            name: name.to_owned(),
            living_area: "oakhaven:maple house:bedroom".to_owned(),
            ..AgentProfile::default()
        };
        Agent::new(profile, CognitiveConfig::default(), tile)
    }

    fn state(agents: Vec<Agent>) -> SimulationState {
        let start = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        SimulationState::new(
            SimClock::new(start, 60).unwrap(),
            Grid::from_definition(&sample_town()).unwrap(),
            agents,
            7,
            SAMPLE_FALLBACK_ADDRESS,
        )
    }

    fn tiles_with_subject(grid: &Grid, subject: &str) -> Vec<TilePos> {
        let mut found = Vec::new();
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let pos = TilePos::new(x, y);
                if grid.tile_at(pos).unwrap().has_subject(subject) {
                    found.push(pos);
                }
            }
        }
        found
    }

    #[test]
    fn first_step_plans_and_records_movement() {
        let mut sim = state(vec![
            agent("Klaus Mueller", TilePos::new(2, 3)),
            agent("Maria Lopez", TilePos::new(2, 4)),
        ]);
        let summary = run_tick(&mut sim, &mut guard()).unwrap();

        assert_eq!(summary.step, 0);
        assert!(summary.failed_agents.is_empty());
        assert_eq!(summary.movement.agents.len(), 2);
        assert_eq!(sim.clock.step(), 1);
        assert_eq!(sim.movement_log.len(), 1);
        for agent in sim.agents.values() {
            assert_eq!(agent.scratch.schedule.total_minutes(), MINUTES_PER_DAY);
            assert!(agent.scratch.action.target.is_some());
        }
        let klaus = summary.movement.agents.get("Klaus Mueller").unwrap();
        assert!(klaus.description.contains(" @ "));
    }

    #[test]
    fn agent_events_follow_the_agent() {
        let mut sim = state(vec![agent("Klaus Mueller", TilePos::new(2, 3))]);
        let mut oracles = guard();
        for _ in 0..15 {
            run_tick(&mut sim, &mut oracles).unwrap();
            // Occupancy is written at the start of the next step, so the
            // event sits where the agent stood when this step began.
            let tiles = tiles_with_subject(&sim.grid, "Klaus Mueller");
            assert_eq!(tiles.len(), 1);
        }
        assert_eq!(
            sim.occupancy.get("Klaus Mueller"),
            tiles_with_subject(&sim.grid, "Klaus Mueller").first()
        );
    }

    #[test]
    fn a_failing_agent_does_not_stop_the_others() {
        let mut sim = state(vec![
            agent("Ghost", TilePos::new(999, 999)),
            agent("Klaus Mueller", TilePos::new(2, 3)),
        ]);
        let summary = run_tick(&mut sim, &mut guard()).unwrap();

        assert_eq!(summary.failed_agents, vec!["Ghost".to_owned()]);
        assert_eq!(summary.tile_writes.rejected, 1);
        assert_eq!(
            summary.movement.agents.get("Ghost").unwrap().next_tile,
            TilePos::new(999, 999)
        );
        assert!(sim.agents.get("Klaus Mueller").unwrap().scratch.action.target.is_some());
    }

    #[test]
    fn steps_are_reproducible() {
        let run = || {
            let mut sim = state(vec![
                agent("Klaus Mueller", TilePos::new(2, 3)),
                agent("Isabella Rodriguez", TilePos::new(11, 3)),
            ]);
            let mut oracles = guard();
            for _ in 0..20 {
                run_tick(&mut sim, &mut oracles).unwrap();
            }
            sim.movement_log
        };
        assert_eq!(run(), run());
    }
}
