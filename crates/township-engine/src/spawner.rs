//! Agent spawner for seeding the simulation with the configured residents.
//!
//! Each [`AgentSeed`] from the config becomes one [`Agent`]. The starting
//! tile is chosen in order of preference: the explicit `tile`, the first
//! tile of the named spawn location, the first tile of the agent's living
//! area, and finally the first tile of the world's fallback address.

use std::collections::BTreeSet;

use township_agents::{Agent, CognitiveConfig};
use township_core::config::AgentSeed;
use township_types::TilePos;
use township_world::Grid;
use tracing::{info, warn};

use crate::error::EngineError;

/// First walkable tile of a tile set.
fn first_open(grid: &Grid, tiles: &BTreeSet<TilePos>) -> Option<TilePos> {
    tiles.iter().copied().find(|tile| !grid.is_blocked(*tile))
}

/// Pick the starting tile for `seed`.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if an explicit tile is off the grid or
/// blocked, or if no candidate resolves to a walkable tile.
pub fn starting_tile(
    seed: &AgentSeed,
    grid: &Grid,
    fallback_address: &str,
) -> Result<TilePos, EngineError> {
    let name = &seed.profile.name;

    if let Some(tile) = seed.tile {
        if !grid.in_bounds(tile) || grid.is_blocked(tile) {
            return Err(EngineError::Spawner {
                message: format!("{name} cannot start at {tile}: off the grid or blocked"),
            });
        }
        return Ok(tile);
    }

    if let Some(location) = seed.spawn_location.as_deref() {
        match grid.spawn_tiles(location) {
            Ok(tiles) => {
                if let Some(tile) = first_open(grid, tiles) {
                    return Ok(tile);
                }
            }
            Err(e) => warn!(agent = %name, spawn_location = location, error = %e, "Unknown spawn location"),
        }
    }

    let living_area = seed.profile.living_area.as_str();
    if !living_area.is_empty()
        && let Ok(tiles) = grid.tiles_for_address(living_area)
        && let Some(tile) = first_open(grid, tiles)
    {
        return Ok(tile);
    }

    grid.tiles_for_address(fallback_address)
        .ok()
        .and_then(|tiles| first_open(grid, tiles))
        .ok_or_else(|| EngineError::Spawner {
            message: format!("no walkable starting tile for {name}"),
        })
}

/// Build every configured agent.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if no agents are configured or any
/// agent has no valid starting tile.
pub fn spawn_agents(
    seeds: &[AgentSeed],
    config: &CognitiveConfig,
    grid: &Grid,
    fallback_address: &str,
) -> Result<Vec<Agent>, EngineError> {
    if seeds.is_empty() {
        return Err(EngineError::Spawner {
            message: String::from("no agents configured"),
        });
    }

    let mut agents = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let tile = starting_tile(seed, grid, fallback_address)?;
        info!(agent = %seed.profile.name, %tile, "Agent spawned");
        agents.push(Agent::new(seed.profile.clone(), config.clone(), tile));
    }
    Ok(agents)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
