//! Per-tick movement records consumed by the visualization front end.
//!
//! Every tick the orchestrator emits one [`TickMovement`] with an
//! [`AgentMovement`] per agent. A [`MovementLog`] accumulates these into a
//! compressed replay that only keeps a record when it differs from the
//! agent's previously kept record.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::{ChatLine, TilePos};

/// What one agent does during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentMovement {
    /// Tile the agent occupies after this tick.
    pub next_tile: TilePos,
    /// Short emoji rendering of the current action.
    pub pronunciation: String,
    /// `"<action description> @ <action address>"`.
    pub description: String,
    /// Conversation transcript while chatting, absent otherwise.
    pub chat: Option<Vec<ChatLine>>,
}

/// All agent movements for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickMovement {
    /// Step number this record belongs to.
    pub step: u64,
    /// Simulation time at which the tick was computed.
    pub curr_time: NaiveDateTime,
    /// Movement per agent, keyed by agent name.
    pub agents: BTreeMap<String, AgentMovement>,
}

/// A compressed multi-tick replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MovementLog {
    /// Changed movements, keyed by step then agent name.
    pub steps: BTreeMap<u64, BTreeMap<String, AgentMovement>>,
    /// Last kept record per agent, used to detect changes.
    #[serde(skip)]
    #[ts(skip)]
    last_kept: BTreeMap<String, AgentMovement>,
}

impl MovementLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            steps: BTreeMap::new(),
            last_kept: BTreeMap::new(),
        }
    }

    /// Fold one tick into the log. Returns how many agent records changed.
    pub fn record(&mut self, tick: &TickMovement) -> usize {
        let mut changed = BTreeMap::new();
        for (name, movement) in &tick.agents {
            if self.last_kept.get(name) != Some(movement) {
                self.last_kept.insert(name.clone(), movement.clone());
                changed.insert(name.clone(), movement.clone());
            }
        }
        let count = changed.len();
        if count > 0 {
            self.steps.insert(tick.step, changed);
        }
        count
    }

    /// Number of steps that carry at least one change.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
