//! A full simulated day in the sample town with the offline oracles.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use township_agents::{Agent, AgentProfile, CognitiveConfig};
use township_core::clock::SimClock;
use township_core::oracle::OracleGuard;
use township_core::snapshot::SimulationSnapshot;
use township_core::stub::{HashEmbedding, StubCognition};
use township_core::tick::{SimulationState, run_tick};
use township_types::time::MINUTES_PER_DAY;
use township_types::{MemoryKind, TilePos};
use township_world::{Grid, SAMPLE_FALLBACK_ADDRESS, sample_town};

const RESIDENTS: [(&str, &str, (u32, u32)); 3] = [
    ("Isabella Rodriguez", "oakhaven:hobbs cafe:cafe", (11, 3)),
    ("Maria Lopez", "oakhaven:maple house:bedroom", (2, 4)),
    ("Klaus Mueller", "oakhaven:maple house:bedroom", (2, 3)),
];

fn town_state(sec_per_step: u32) -> SimulationState {
    let start = NaiveDate::from_ymd_opt(2023, 2, 13)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let agents = RESIDENTS.map(|(name, home, (x, y))| {
        let profile = AgentProfile {
            name: name.to_owned(),
            living_area: home.to_owned(),
            ..AgentProfile::default()
        };
        Agent::new(profile, CognitiveConfig::default(), TilePos::new(x, y))
    });
    SimulationState::new(
        SimClock::new(start, sec_per_step).unwrap(),
        Grid::from_definition(&sample_town()).unwrap(),
        agents,
        11,
        SAMPLE_FALLBACK_ADDRESS,
    )
}

fn guard() -> OracleGuard {
    OracleGuard::new(
        Box::new(StubCognition::new()),
        Box::new(HashEmbedding::new(32)),
        3,
    )
}

fn subject_tiles(grid: &Grid, subject: &str) -> usize {
    let mut count = 0;
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            if grid.tile_at(TilePos::new(x, y)).unwrap().has_subject(subject) {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn a_day_and_a_morning_keep_every_invariant() {
    // Five-minute steps from midnight to 01:00 the next day.
    let mut state = town_state(300);
    let mut oracles = guard();
    let mut previous: BTreeMap<String, TilePos> = state.agent_tiles();

    for _ in 0..300 {
        let summary = run_tick(&mut state, &mut oracles).unwrap();
        assert!(summary.failed_agents.is_empty(), "{:?}", summary.failed_agents);

        for (name, agent) in &state.agents {
            assert_eq!(agent.scratch.schedule.total_minutes(), MINUTES_PER_DAY, "{name}");
            assert_eq!(subject_tiles(&state.grid, name), 1, "{name}");

            let before = previous[name];
            let after = summary.movement.agents[name].next_tile;
            assert!(
                before.x.abs_diff(after.x) + before.y.abs_diff(after.y) <= 1,
                "{name} jumped from {before} to {after}"
            );
            assert!(state.grid.in_bounds(after));
            assert!(!state.grid.is_blocked(after));
        }
        previous = state.agent_tiles();
    }

    assert_eq!(
        state.clock.curr_time(),
        NaiveDate::from_ymd_opt(2023, 2, 14)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap()
    );
    for agent in state.agents.values() {
        let plans = agent
            .memory
            .sequence(MemoryKind::Thought)
            .filter(|t| t.triple.predicate == "plan")
            .count();
        assert_eq!(plans, 2, "{} should have planned two days", agent.name());
        assert!(
            agent.scratch.profile.currently.contains("Tuesday February 14"),
            "{} kept a stale status",
            agent.name()
        );
        assert!(agent.memory.sequence(MemoryKind::Event).count() > 0);
        assert!(!agent.spatial.sectors("oakhaven").is_empty());
    }
    assert!(!state.movement_log.is_empty());
    assert!(oracles.stats().attempts > 0);
}

#[test]
fn a_restored_run_continues() {
    let mut state = town_state(60);
    let mut oracles = guard();
    for _ in 0..30 {
        run_tick(&mut state, &mut oracles).unwrap();
    }

    let snapshot = SimulationSnapshot::capture(&state, 11);
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: SimulationSnapshot = serde_json::from_str(&json).unwrap();
    let mut resumed = restored
        .restore(Grid::from_definition(&sample_town()).unwrap(), SAMPLE_FALLBACK_ADDRESS)
        .unwrap();

    let next_id = |state: &SimulationState| -> BTreeMap<String, u64> {
        state
            .agents
            .iter()
            .map(|(name, agent)| (name.clone(), u64::try_from(agent.memory.nodes().count()).unwrap()))
            .collect()
    };
    let before = next_id(&resumed);
    for _ in 0..10 {
        let summary = run_tick(&mut resumed, &mut oracles).unwrap();
        assert!(summary.failed_agents.is_empty());
    }
    assert_eq!(resumed.clock.step(), 40);
    for (name, agent) in &resumed.agents {
        // Ids keep counting from where the saved store stopped.
        let ids: Vec<u64> = agent.memory.nodes().map(|n| n.id.0).collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1), "{name}");
        assert!(u64::try_from(ids.len()).unwrap() >= before[name]);
        assert_eq!(agent.scratch.schedule.total_minutes(), MINUTES_PER_DAY);
    }
}
