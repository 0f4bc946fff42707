//! The tile arena and its address index.
//!
//! Tiles are stored row-major in a flat vector indexed by `y * width + x`.
//! The address index maps every `world:sector`, `world:sector:arena`,
//! `world:sector:arena:object` and `<spawn_loc>name` key to the set of
//! tiles carrying it. The index is built once in [`Grid::from_definition`]
//! and is read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use township_types::{AddressLevel, TileEvent, TilePos};
use tracing::{debug, info};

use crate::definition::WorldDefinition;
use crate::error::WorldError;
use crate::tile::Tile;

/// Prefix of address-index keys that name spawn locations.
pub const SPAWN_PREFIX: &str = "<spawn_loc>";

/// The static tile grid with mutable per-tile event sets.
#[derive(Debug, Clone)]
pub struct Grid {
    name: String,
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<Tile>,
    address_index: BTreeMap<String, BTreeSet<TilePos>>,
}

impl Grid {
    /// Build a grid from a validated world definition.
    ///
    /// Every game-object tile starts with the idle event of its object.
    pub fn from_definition(definition: &WorldDefinition) -> Result<Self, WorldError> {
        definition.validate()?;

        let capacity = u64::from(definition.width)
            .checked_mul(u64::from(definition.height))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(WorldError::ArithmeticOverflow)?;
        let mut tiles = Vec::with_capacity(capacity);
        let mut address_index: BTreeMap<String, BTreeSet<TilePos>> = BTreeMap::new();

        for y in 0..definition.height {
            for x in 0..definition.width {
                let pos = TilePos::new(x, y);
                let mut tile = definition.tile_at(pos)?;

                for level in [
                    AddressLevel::Sector,
                    AddressLevel::Arena,
                    AddressLevel::GameObject,
                ] {
                    if let Some(address) = tile.address(level) {
                        address_index.entry(address).or_default().insert(pos);
                    }
                }
                if let Some(spawn) = &tile.spawn_location {
                    address_index
                        .entry(format!("{SPAWN_PREFIX}{spawn}"))
                        .or_default()
                        .insert(pos);
                }
                if let Some(object_address) = tile.address(AddressLevel::GameObject) {
                    tile.events.insert(TileEvent::idle(object_address));
                }

                tiles.push(tile);
            }
        }

        info!(
            world = %definition.world,
            width = definition.width,
            height = definition.height,
            addresses = address_index.len(),
            "World grid loaded"
        );

        Ok(Self {
            name: definition.world.clone(),
            width: definition.width,
            height: definition.height,
            tile_size: definition.tile_size,
            tiles,
            address_index,
        })
    }

    // -------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------

    /// World name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in tiles.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Edge length of a tile in pixels.
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Whether `pos` lies inside the grid.
    pub const fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: TilePos) -> Result<usize, WorldError> {
        if !self.in_bounds(pos) {
            return Err(WorldError::OutOfBounds {
                pos,
                width: self.width,
                height: self.height,
            });
        }
        let flat = u64::from(pos.y)
            .checked_mul(u64::from(self.width))
            .and_then(|row| row.checked_add(u64::from(pos.x)))
            .ok_or(WorldError::ArithmeticOverflow)?;
        usize::try_from(flat).map_err(|_| WorldError::ArithmeticOverflow)
    }

    /// The tile at `pos`.
    pub fn tile_at(&self, pos: TilePos) -> Result<&Tile, WorldError> {
        let idx = self.index(pos)?;
        self.tiles.get(idx).ok_or(WorldError::ArithmeticOverflow)
    }

    fn tile_at_mut(&mut self, pos: TilePos) -> Result<&mut Tile, WorldError> {
        let idx = self.index(pos)?;
        self.tiles.get_mut(idx).ok_or(WorldError::ArithmeticOverflow)
    }

    /// Whether agents may not enter `pos`. Tiles outside the grid count as
    /// blocked.
    pub fn is_blocked(&self, pos: TilePos) -> bool {
        self.tile_at(pos).ok().is_none_or(|tile| tile.blocked)
    }

    /// The square neighborhood of `pos` with the given radius, clipped to
    /// the grid.
    ///
    /// Bounds are `max(0, c - r) .. min(size - 1, c + r + 1)` on each axis,
    /// half-open, so the last row and column of the grid are never returned
    /// and radius 0 yields `pos` itself (when it is not on that edge).
    pub fn nearby_tiles(&self, pos: TilePos, radius: u32) -> Vec<TilePos> {
        let left = pos.x.saturating_sub(radius);
        let right = self
            .width
            .saturating_sub(1)
            .min(pos.x.saturating_add(radius).saturating_add(1));
        let top = pos.y.saturating_sub(radius);
        let bottom = self
            .height
            .saturating_sub(1)
            .min(pos.y.saturating_add(radius).saturating_add(1));

        let mut out = Vec::new();
        for x in left..right {
            for y in top..bottom {
                out.push(TilePos::new(x, y));
            }
        }
        out
    }

    // -------------------------------------------------------------------
    // Addresses
    // -------------------------------------------------------------------

    /// The address of `pos` up to `level`.
    pub fn address_of(&self, pos: TilePos, level: AddressLevel) -> Result<String, WorldError> {
        self.tile_at(pos)?
            .address(level)
            .ok_or(WorldError::LevelNotPresent { pos, level })
    }

    /// Every tile satisfying `address`. Callers that want to sample must
    /// copy the set first.
    pub fn tiles_for_address(&self, address: &str) -> Result<&BTreeSet<TilePos>, WorldError> {
        self.address_index
            .get(address)
            .ok_or_else(|| WorldError::AddressNotFound(address.to_owned()))
    }

    /// Tiles of the named spawn location.
    pub fn spawn_tiles(&self, spawn_location: &str) -> Result<&BTreeSet<TilePos>, WorldError> {
        self.tiles_for_address(&format!("{SPAWN_PREFIX}{spawn_location}"))
    }

    /// Whether `address` is present in the address index.
    pub fn has_address(&self, address: &str) -> bool {
        self.address_index.contains_key(address)
    }

    /// All indexed addresses in sorted order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.address_index.keys().map(String::as_str)
    }

    // -------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------

    /// Events on the tile at `pos`.
    pub fn events_at(&self, pos: TilePos) -> Result<&BTreeSet<TileEvent>, WorldError> {
        Ok(self.tile_at(pos)?.events())
    }

    /// Put `event` on the tile, first removing any event with the same
    /// subject so a tile never holds two events for one subject. Returns
    /// `true` if the tile's event set changed.
    pub fn add_event(&mut self, pos: TilePos, event: TileEvent) -> Result<bool, WorldError> {
        let tile = self.tile_at_mut(pos)?;
        if tile.events.contains(&event) {
            return Ok(false);
        }
        tile.events.retain(|e| e.subject != event.subject);
        debug!(tile = %pos, subject = %event.subject, "Tile event added");
        tile.events.insert(event);
        Ok(true)
    }

    /// Remove exactly `event` from the tile. Returns `true` if it was there.
    pub fn remove_event(&mut self, pos: TilePos, event: &TileEvent) -> Result<bool, WorldError> {
        let tile = self.tile_at_mut(pos)?;
        Ok(tile.events.remove(event))
    }

    /// Replace `event` with its idle form if it is on the tile. Returns
    /// `true` if the tile's event set changed.
    pub fn idle_event(&mut self, pos: TilePos, event: &TileEvent) -> Result<bool, WorldError> {
        let tile = self.tile_at_mut(pos)?;
        if event.is_idle() || !tile.events.remove(event) {
            return Ok(false);
        }
        tile.events.insert(event.to_idle());
        Ok(true)
    }

    /// Remove every event whose subject is `subject`. Returns how many
    /// events were removed.
    pub fn clear_subject_events(&mut self, pos: TilePos, subject: &str) -> Result<usize, WorldError> {
        let tile = self.tile_at_mut(pos)?;
        let before = tile.events.len();
        tile.events.retain(|e| e.subject != subject);
        Ok(before.saturating_sub(tile.events.len()))
    }
}
