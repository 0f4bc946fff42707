//! A single grid cell.

use std::collections::BTreeSet;

use township_types::{AddressLevel, TileEvent};

/// One grid cell with its hierarchical address, collision flag, and the
/// events currently happening on it.
///
/// Address components and the collision flag are fixed when the grid is
/// built. The event set is only reachable mutably through [`Grid`].
///
/// [`Grid`]: crate::grid::Grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// World name. Always present.
    pub world: String,
    /// Sector name, if the tile belongs to one.
    pub sector: Option<String>,
    /// Arena name. Only set when `sector` is set.
    pub arena: Option<String>,
    /// Game object name. Only set when `arena` is set.
    pub game_object: Option<String>,
    /// Spawn location label, independent of the address hierarchy.
    pub spawn_location: Option<String>,
    /// Whether agents may not enter this tile.
    pub blocked: bool,
    pub(crate) events: BTreeSet<TileEvent>,
}

impl Tile {
    /// A bare tile that only belongs to `world`.
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            sector: None,
            arena: None,
            game_object: None,
            spawn_location: None,
            blocked: false,
            events: BTreeSet::new(),
        }
    }

    /// The colon-joined address prefix up to `level`, or `None` when a
    /// component at or above `level` is missing.
    pub fn address(&self, level: AddressLevel) -> Option<String> {
        let mut parts = vec![self.world.as_str()];
        let deeper = [
            (AddressLevel::Sector, &self.sector),
            (AddressLevel::Arena, &self.arena),
            (AddressLevel::GameObject, &self.game_object),
        ];
        for (component_level, component) in deeper {
            if component_level > level {
                break;
            }
            parts.push(component.as_deref()?);
        }
        Some(parts.join(":"))
    }

    /// The deepest address this tile has.
    pub fn full_address(&self) -> String {
        AddressLevel::ALL
            .iter()
            .rev()
            .find_map(|level| self.address(*level))
            .unwrap_or_else(|| self.world.clone())
    }

    /// Whether two tiles share world, sector and arena.
    pub fn same_arena(&self, other: &Self) -> bool {
        self.world == other.world && self.sector == other.sector && self.arena == other.arena
    }

    /// Events currently on the tile, in deterministic order.
    pub const fn events(&self) -> &BTreeSet<TileEvent> {
        &self.events
    }

    /// Whether any event on the tile has `subject`.
    pub fn has_subject(&self, subject: &str) -> bool {
        self.events.iter().any(|e| e.subject == subject)
    }
}
