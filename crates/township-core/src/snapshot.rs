//! Snapshot save and restore.
//!
//! A snapshot holds the clock and every agent's persisted state: scratch
//! (schedule, current action, tile), the memory store, and the spatial
//! tree. Memory node ids are stored verbatim so evidence links survive a
//! round trip. The world itself is not stored; it is rebuilt from its
//! definition and checked against the recorded world name.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use township_agents::{Agent, AgentError, AgentSnapshot};
use township_types::TilePos;
use township_world::Grid;
use tracing::info;

use crate::clock::{ClockError, SimClock};
use crate::tick::SimulationState;

/// Errors that can occur saving or restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Reading or writing the file failed.
    #[error("snapshot I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file is not a valid snapshot document.
    #[error("snapshot JSON error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The snapshot was taken in a different world.
    #[error("snapshot is for world {expected}, but the grid is {found}")]
    WorldMismatch {
        /// World recorded in the snapshot.
        expected: String,
        /// World of the grid being restored into.
        found: String,
    },

    /// The recorded clock is inconsistent.
    #[error("snapshot clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An agent failed to restore.
    #[error("snapshot agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// An agent stands outside the grid.
    #[error("agent {agent} stands at {tile}, outside the grid")]
    AgentOffGrid {
        /// The misplaced agent.
        agent: String,
        /// Its recorded tile.
        tile: TilePos,
    },
}

/// Run-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// World the run takes place in.
    pub world: String,
    /// Simulation time of step 0.
    pub start_time: NaiveDateTime,
    /// Simulation time of the next step.
    pub curr_time: NaiveDateTime,
    /// Next step to run.
    pub step: u64,
    /// Simulated seconds per step.
    pub sec_per_step: u32,
    /// Seed the run started with.
    pub seed: u64,
}

/// Everything needed to continue a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Run-level metadata.
    pub meta: SnapshotMeta,
    /// Per-agent state, by name.
    pub agents: BTreeMap<String, AgentSnapshot>,
}

impl SimulationSnapshot {
    /// Capture `state`.
    pub fn capture(state: &SimulationState, seed: u64) -> Self {
        Self {
            meta: SnapshotMeta {
                world: state.grid.name().to_owned(),
                start_time: state.clock.start_time(),
                curr_time: state.clock.curr_time(),
                step: state.clock.step(),
                sec_per_step: state.clock.sec_per_step(),
                seed,
            },
            agents: state
                .agents
                .iter()
                .map(|(name, agent)| (name.clone(), agent.to_snapshot()))
                .collect(),
        }
    }

    /// Rebuild a simulation on `grid`. The random stream is reseeded from
    /// the recorded seed and step.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the world differs, the clock is
    /// inconsistent, or an agent fails validation.
    pub fn restore(
        self,
        grid: Grid,
        fallback_address: impl Into<String>,
    ) -> Result<SimulationState, SnapshotError> {
        if grid.name() != self.meta.world {
            return Err(SnapshotError::WorldMismatch {
                expected: self.meta.world,
                found: grid.name().to_owned(),
            });
        }
        let clock = SimClock::from_parts(
            self.meta.start_time,
            self.meta.curr_time,
            self.meta.step,
            self.meta.sec_per_step,
        )?;

        let mut agents = Vec::with_capacity(self.agents.len());
        for (name, snapshot) in self.agents {
            let agent = Agent::from_snapshot(snapshot)?;
            if !grid.in_bounds(agent.tile()) {
                return Err(SnapshotError::AgentOffGrid {
                    agent: name,
                    tile: agent.tile(),
                });
            }
            agents.push(agent);
        }

        let seed = self.meta.seed.wrapping_add(self.meta.step);
        Ok(SimulationState::new(clock, grid, agents, seed, fallback_address))
    }

    /// Write the snapshot as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(
            path = %path.display(),
            step = self.meta.step,
            agents = self.agents.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_agents::{AgentProfile, CognitiveConfig};
    use township_types::MemoryKind;
    use township_world::{SAMPLE_FALLBACK_ADDRESS, WorldDefinition, sample_town};

    use super::*;
    use crate::oracle::OracleGuard;
    use crate::stub::{HashEmbedding, StubCognition};
    use crate::tick::run_tick;

    fn town() -> Grid {
        Grid::from_definition(&sample_town()).unwrap()
    }

    fn ran_state() -> SimulationState {
        let start = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let agents = [("Klaus Mueller", TilePos::new(2, 3)), ("Isabella Rodriguez", TilePos::new(11, 3))]
            .map(|(name, tile)| {
                let profile = AgentProfile {
                    name: name.to_owned(),
                    ..AgentProfile::default()
                };
                Agent::new(profile, CognitiveConfig::default(), tile)
            });
        let mut state = SimulationState::new(
            SimClock::new(start, 60).unwrap(),
            town(),
            agents,
            3,
            SAMPLE_FALLBACK_ADDRESS,
        );
        let mut guard = OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(HashEmbedding::new(16)),
            1,
        );
        for _ in 0..10 {
            run_tick(&mut state, &mut guard).unwrap();
        }
        state
    }

    #[test]
    fn snapshot_survives_json() {
        let state = ran_state();
        let snapshot = SimulationSnapshot::capture(&state, 3);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["meta"]["step"], 10);
        assert_eq!(json["meta"]["world"], "oakhaven");

        let back: SimulationSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn restore_keeps_ids_clock_and_plans() {
        let state = ran_state();
        let snapshot = SimulationSnapshot::capture(&state, 3);
        let restored = snapshot.restore(town(), SAMPLE_FALLBACK_ADDRESS).unwrap();

        assert_eq!(restored.clock, state.clock);
        for (name, before) in &state.agents {
            let after = restored.agents.get(name).unwrap();
            let ids = |a: &Agent| -> Vec<_> { a.memory.nodes().map(|n| n.id).collect() };
            assert_eq!(ids(before), ids(after));
            assert_eq!(after.scratch.schedule, before.scratch.schedule);
            assert_eq!(after.tile(), before.tile());
            assert_eq!(
                after.memory.sequence(MemoryKind::Thought).count(),
                before.memory.sequence(MemoryKind::Thought).count()
            );
        }
    }

    #[test]
    fn restore_rejects_another_world() {
        let snapshot = SimulationSnapshot::capture(&ran_state(), 3);
        let other = Grid::from_definition(&WorldDefinition::open("elsewhere", 4, 4)).unwrap();
        assert!(matches!(
            snapshot.restore(other, SAMPLE_FALLBACK_ADDRESS),
            Err(SnapshotError::WorldMismatch { .. })
        ));
    }

    #[test]
    fn save_and_load_file() {
        let snapshot = SimulationSnapshot::capture(&ran_state(), 3);
        let dir = std::env::temp_dir().join(format!("township-snapshot-{}", std::process::id()));
        let path = dir.join("nested").join("snapshot.json");
        snapshot.save(&path).unwrap();
        let loaded = SimulationSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
