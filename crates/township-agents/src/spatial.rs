//! What an agent knows about the layout of the world.
//!
//! Agents only learn about sectors, arenas and objects they have seen. The
//! tree grows every tick from the tiles in vision and supplies the option
//! lists when the cognition oracle picks where an action happens.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use township_world::Tile;

type Arenas = BTreeMap<String, BTreeSet<String>>;
type Sectors = BTreeMap<String, Arenas>;

/// Known `world → sector → arena → {objects}` tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialMemory {
    tree: BTreeMap<String, Sectors>,
}

impl SpatialMemory {
    /// An empty tree.
    pub const fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Learn whatever address components `tile` carries.
    pub fn observe(&mut self, tile: &Tile) {
        let sectors = self.tree.entry(tile.world.clone()).or_default();
        let Some(sector) = &tile.sector else {
            return;
        };
        let arenas = sectors.entry(sector.clone()).or_default();
        let Some(arena) = &tile.arena else {
            return;
        };
        let objects = arenas.entry(arena.clone()).or_default();
        if let Some(object) = &tile.game_object {
            objects.insert(object.clone());
        }
    }

    /// Known sectors of `world`.
    pub fn sectors(&self, world: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Known arenas of `world:sector`.
    pub fn arenas(&self, world: &str, sector: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .and_then(|s| s.get(sector))
            .map(|a| a.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Known objects of `world:sector:arena`.
    pub fn objects(&self, world: &str, sector: &str, arena: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .and_then(|s| s.get(sector))
            .and_then(|a| a.get(arena))
            .map(|o| o.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether every component of a colon-joined address is known.
    pub fn knows(&self, address: &str) -> bool {
        let parts: Vec<&str> = address.split(':').collect();
        match parts.as_slice() {
            [world] => self.tree.contains_key(*world),
            [world, sector] => self.arenas_of(world, sector).is_some(),
            [world, sector, arena] => self
                .arenas_of(world, sector)
                .is_some_and(|a| a.contains_key(*arena)),
            [world, sector, arena, object] => self
                .arenas_of(world, sector)
                .and_then(|a| a.get(*arena))
                .is_some_and(|o| o.contains(*object)),
            _ => false,
        }
    }

    fn arenas_of(&self, world: &str, sector: &str) -> Option<&Arenas> {
        self.tree.get(world).and_then(|s| s.get(sector))
    }
}
