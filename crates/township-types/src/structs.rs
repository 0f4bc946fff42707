//! Core value structs shared by the world, agents, and orchestrator.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// Integer coordinate of one grid cell. `x` is the column, `y` the row.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct TilePos {
    /// Column index, starting at 0 on the left edge.
    pub x: u32,
    /// Row index, starting at 0 on the top edge.
    pub y: u32,
}

impl TilePos {
    /// Create a coordinate from a column and a row.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Straight-line distance between the centers of two tiles.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

impl core::fmt::Display for TilePos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event occupying a tile: `(subject, predicate, object, description)`.
///
/// A missing predicate, object and description denote the idle form. The
/// subject is a full address for objects (`world:sector:arena:object`) and
/// a bare name for agents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileEvent {
    /// Who or what the event is about.
    pub subject: String,
    /// The verb, e.g. `is`.
    pub predicate: Option<String>,
    /// What the verb applies to, e.g. `brewing coffee`.
    pub object: Option<String>,
    /// Free-text description shown to observers.
    pub description: Option<String>,
}

impl TileEvent {
    /// The idle form of an event for `subject`.
    pub fn idle(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: None,
            object: None,
            description: None,
        }
    }

    /// A fully specified event.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: Some(predicate.into()),
            object: Some(object.into()),
            description: Some(description.into()),
        }
    }

    /// Whether this is the idle form (no predicate, object or description).
    pub const fn is_idle(&self) -> bool {
        self.predicate.is_none() && self.object.is_none() && self.description.is_none()
    }

    /// The idle form of this event, keeping only its subject.
    pub fn to_idle(&self) -> Self {
        Self::idle(self.subject.clone())
    }
}

/// A `(subject, predicate, object)` triple as stored on memory nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Who or what the triple is about.
    pub subject: String,
    /// The verb.
    pub predicate: String,
    /// What the verb applies to.
    pub object: String,
}

impl Triple {
    /// Build a triple from its three parts.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Whether this triple reads `<subject> is idle`.
    pub fn is_idle(&self) -> bool {
        self.predicate == "is" && self.object == "idle"
    }
}

// ---------------------------------------------------------------------------
// Schedules and conversation
// ---------------------------------------------------------------------------

/// One entry of a daily schedule: a task and how many minutes it takes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Natural-language task description.
    pub task: String,
    /// Duration in minutes.
    pub minutes: u32,
}

impl ScheduleEntry {
    /// Create a schedule entry.
    pub fn new(task: impl Into<String>, minutes: u32) -> Self {
        Self {
            task: task.into(),
            minutes,
        }
    }

    /// Whether the entry describes sleep.
    pub fn is_sleep(&self) -> bool {
        let task = self.task.to_lowercase();
        task.contains("sleep") || task.contains("bed")
    }
}

/// One line of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatLine {
    /// Name of the agent speaking.
    pub speaker: String,
    /// What was said.
    pub utterance: String,
}

impl ChatLine {
    /// Create a transcript line.
    pub fn new(speaker: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            utterance: utterance.into(),
        }
    }
}
