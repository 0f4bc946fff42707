//! The world description loaded once at startup.
//!
//! A world definition is a JSON document with the grid size, one name table
//! per address level (block code to name), and one flat row-major layer per
//! level holding block codes. Code `0` means "nothing on this layer"; any
//! non-zero value in the collision layer blocks the tile.
//!
//! ```json
//! {
//!   "world": "oakhaven",
//!   "width": 3, "height": 2, "tile_size": 32,
//!   "sectors": { "1": "town park" },
//!   "arenas": { "1": "park garden" },
//!   "layers": {
//!     "collision": [1, 0, 0, 1, 0, 0],
//!     "sector":    [0, 1, 1, 0, 1, 1],
//!     "arena":     [0, 1, 1, 0, 1, 1]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use township_types::TilePos;

use crate::error::WorldError;
use crate::tile::Tile;

/// Default tile edge length in pixels.
const fn default_tile_size() -> u32 {
    32
}

/// Block-code layers, each row-major with `width * height` entries. An
/// empty layer means the level is absent everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSet {
    /// Non-zero entries block the tile.
    #[serde(default)]
    pub collision: Vec<u32>,
    /// Codes into [`WorldDefinition::sectors`].
    #[serde(default)]
    pub sector: Vec<u32>,
    /// Codes into [`WorldDefinition::arenas`].
    #[serde(default)]
    pub arena: Vec<u32>,
    /// Codes into [`WorldDefinition::game_objects`].
    #[serde(default)]
    pub game_object: Vec<u32>,
    /// Codes into [`WorldDefinition::spawn_locations`].
    #[serde(default)]
    pub spawn_location: Vec<u32>,
}

/// Static description of a tile world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDefinition {
    /// World name, the first component of every address.
    pub world: String,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Tile edge length in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Sector names by block code.
    #[serde(default)]
    pub sectors: BTreeMap<u32, String>,
    /// Arena names by block code.
    #[serde(default)]
    pub arenas: BTreeMap<u32, String>,
    /// Game object names by block code.
    #[serde(default)]
    pub game_objects: BTreeMap<u32, String>,
    /// Spawn location names by block code.
    #[serde(default)]
    pub spawn_locations: BTreeMap<u32, String>,
    /// Per-tile block codes.
    #[serde(default)]
    pub layers: LayerSet,
}

impl WorldDefinition {
    /// An empty, open world of the given size.
    pub fn open(world: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            world: world.into(),
            width,
            height,
            tile_size: default_tile_size(),
            sectors: BTreeMap::new(),
            arenas: BTreeMap::new(),
            game_objects: BTreeMap::new(),
            spawn_locations: BTreeMap::new(),
            layers: LayerSet::default(),
        }
    }

    /// A world whose collision layer is drawn with `#` for walls. All rows
    /// must have the same length.
    pub fn from_collision_rows(world: impl Into<String>, rows: &[&str]) -> Result<Self, WorldError> {
        let height = u32::try_from(rows.len()).map_err(|_| WorldError::ArithmeticOverflow)?;
        let width = rows
            .first()
            .map_or(Ok(0), |row| u32::try_from(row.chars().count()))
            .map_err(|_| WorldError::ArithmeticOverflow)?;

        let mut collision = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            let before = collision.len();
            collision.extend(row.chars().map(|c| u32::from(c == '#')));
            let row_width = collision.len().saturating_sub(before);
            if u32::try_from(row_width).ok() != Some(width) {
                return Err(WorldError::invalid(format!(
                    "row {y} has {row_width} tiles, expected {width}"
                )));
            }
        }

        let mut definition = Self::open(world, width, height);
        definition.layers.collision = collision;
        Ok(definition)
    }

    /// Parse a JSON world definition.
    pub fn from_json_str(json: &str) -> Result<Self, WorldError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Read and parse a JSON world definition from disk.
    pub fn from_file(path: &Path) -> Result<Self, WorldError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of tiles.
    pub fn area(&self) -> Result<usize, WorldError> {
        u64::from(self.width)
            .checked_mul(u64::from(self.height))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(WorldError::ArithmeticOverflow)
    }

    /// Check sizes, layer lengths, and that every code names a block.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.world.is_empty() {
            return Err(WorldError::invalid("world name is empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(WorldError::invalid("grid must be at least 1x1"));
        }
        if self.tile_size == 0 {
            return Err(WorldError::invalid("tile_size must be positive"));
        }
        let area = self.area()?;

        let named_layers = [
            ("sector", &self.layers.sector, &self.sectors),
            ("arena", &self.layers.arena, &self.arenas),
            ("game_object", &self.layers.game_object, &self.game_objects),
            ("spawn_location", &self.layers.spawn_location, &self.spawn_locations),
        ];
        if !self.layers.collision.is_empty() && self.layers.collision.len() != area {
            return Err(WorldError::invalid(format!(
                "collision layer has {} entries, expected {area}",
                self.layers.collision.len()
            )));
        }
        for (label, layer, names) in named_layers {
            if layer.is_empty() {
                continue;
            }
            if layer.len() != area {
                return Err(WorldError::invalid(format!(
                    "{label} layer has {} entries, expected {area}",
                    layer.len()
                )));
            }
            if let Some(code) = layer.iter().find(|c| **c != 0 && !names.contains_key(c)) {
                return Err(WorldError::invalid(format!(
                    "{label} layer uses unknown block code {code}"
                )));
            }
        }
        Ok(())
    }

    /// Build the tile at `pos` from the layers.
    pub(crate) fn tile_at(&self, pos: TilePos) -> Result<Tile, WorldError> {
        let idx = u64::from(pos.y)
            .checked_mul(u64::from(self.width))
            .and_then(|row| row.checked_add(u64::from(pos.x)))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(WorldError::ArithmeticOverflow)?;

        let mut tile = Tile::new(self.world.clone());
        tile.blocked = code_at(&self.layers.collision, idx) != 0;
        tile.sector = name_at(&self.layers.sector, &self.sectors, idx);
        tile.arena = name_at(&self.layers.arena, &self.arenas, idx);
        tile.game_object = name_at(&self.layers.game_object, &self.game_objects, idx);
        tile.spawn_location = name_at(&self.layers.spawn_location, &self.spawn_locations, idx);

        if (tile.arena.is_some() && tile.sector.is_none())
            || (tile.game_object.is_some() && tile.arena.is_none())
        {
            return Err(WorldError::invalid(format!(
                "tile {pos} skips a level of the address hierarchy"
            )));
        }
        Ok(tile)
    }
}

fn code_at(layer: &[u32], idx: usize) -> u32 {
    layer.get(idx).copied().unwrap_or(0)
}

fn name_at(layer: &[u32], names: &BTreeMap<u32, String>, idx: usize) -> Option<String> {
    match code_at(layer, idx) {
        0 => None,
        code => names.get(&code).cloned(),
    }
}
