//! Enumeration types for the Township simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The category a memory node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MemoryKind {
    /// Something the agent perceived happening in the world.
    Event,
    /// A plan, reflection, or insight the agent produced itself.
    Thought,
    /// A summarized conversation the agent took part in.
    Chat,
}

/// How deep into the `world:sector:arena:object` hierarchy an address goes.
///
/// Variants are ordered from least to most specific, so `level <= other`
/// means `level` is an ancestor (or equal) of `other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AddressLevel {
    /// The whole world, e.g. `the_ville`.
    World,
    /// A building or outdoor zone, e.g. `the_ville:cafe`.
    Sector,
    /// A room inside a sector, e.g. `the_ville:cafe:kitchen`.
    Arena,
    /// An interactable object inside an arena.
    GameObject,
}

impl AddressLevel {
    /// All levels in ascending order of specificity.
    pub const ALL: [Self; 4] = [Self::World, Self::Sector, Self::Arena, Self::GameObject];

    /// Number of colon-separated components an address at this level has.
    pub const fn depth(self) -> usize {
        match self {
            Self::World => 1,
            Self::Sector => 2,
            Self::Arena => 3,
            Self::GameObject => 4,
        }
    }
}

impl core::fmt::Display for AddressLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::World => "world",
            Self::Sector => "sector",
            Self::Arena => "arena",
            Self::GameObject => "game_object",
        };
        f.write_str(label)
    }
}
