//! The agent aggregate: working state, long-term memory, and spatial
//! knowledge, plus the serializable form used by snapshots.

use serde::{Deserialize, Serialize};
use township_types::TilePos;

use crate::config::CognitiveConfig;
use crate::error::AgentError;
use crate::memory::{AssociativeMemory, MemorySnapshot};
use crate::scratch::{AgentProfile, AgentScratch};
use crate::spatial::SpatialMemory;

/// One simulated agent.
#[derive(Debug, Clone, Default)]
pub struct Agent {
    /// Short-term working state.
    pub scratch: AgentScratch,
    /// Long-term associative memory.
    pub memory: AssociativeMemory,
    /// Known layout of the world.
    pub spatial: SpatialMemory,
}

/// Persisted form of an [`Agent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Short-term working state.
    pub scratch: AgentScratch,
    /// Long-term memory nodes and embedding cache.
    pub memory: MemorySnapshot,
    /// Known layout of the world.
    #[serde(default)]
    pub spatial: SpatialMemory,
}

impl Agent {
    /// A freshly spawned agent standing on `tile` with an empty memory.
    pub fn new(profile: AgentProfile, config: CognitiveConfig, tile: TilePos) -> Self {
        Self {
            scratch: AgentScratch::new(profile, config, tile),
            memory: AssociativeMemory::new(),
            spatial: SpatialMemory::new(),
        }
    }

    /// The agent's name.
    pub fn name(&self) -> &str {
        self.scratch.name()
    }

    /// The tile the agent stands on.
    pub const fn tile(&self) -> TilePos {
        self.scratch.curr_tile
    }

    /// Persistable copy of the agent.
    pub fn to_snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            scratch: self.scratch.clone(),
            memory: self.memory.snapshot(),
            spatial: self.spatial.clone(),
        }
    }

    /// Restore an agent, re-validating its memory and any planned day.
    pub fn from_snapshot(snapshot: AgentSnapshot) -> Result<Self, AgentError> {
        if snapshot.scratch.profile.name.is_empty() {
            return Err(AgentError::CorruptSnapshot {
                reason: String::from("agent has no name"),
            });
        }
        if !snapshot.scratch.schedule.is_empty() {
            snapshot.scratch.schedule.validate()?;
        }
        Ok(Self {
            memory: AssociativeMemory::from_snapshot(snapshot.memory)?,
            scratch: snapshot.scratch,
            spatial: snapshot.spatial,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_types::Triple;

    use super::*;
    use crate::memory::NewMemory;

    fn klaus() -> Agent {
        let profile = AgentProfile {
            name: String::from("Klaus Mueller"),
            age: 20,
            ..AgentProfile::default()
        };
        Agent::new(profile, CognitiveConfig::default(), TilePos::new(2, 3))
    }

    #[test]
    fn snapshot_restores_memory_indexes() {
        let mut agent = klaus();
        let now = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        agent
            .memory
            .add_event(
                NewMemory::new(now, Triple::new("stove", "is", "heating"), "stove is heating")
                    .with_keywords(["stove", "heating"])
                    .with_poignancy(3.0),
            )
            .unwrap();

        let json = serde_json::to_string(&agent.to_snapshot()).unwrap();
        let restored = Agent::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.name(), "Klaus Mueller");
        assert_eq!(restored.tile(), TilePos::new(2, 3));
        assert_eq!(restored.memory.len(), 1);
        assert_eq!(
            restored
                .memory
                .retrieve_relevant(township_types::MemoryKind::Event, &Triple::new("stove", "is", "x"))
                .len(),
            1
        );
    }

    #[test]
    fn nameless_snapshot_is_rejected() {
        let snapshot = AgentSnapshot::default();
        assert!(matches!(
            Agent::from_snapshot(snapshot),
            Err(AgentError::CorruptSnapshot { .. })
        ));
    }
}
