//! Tile grid, hierarchical addresses, tile events, and pathfinding for the
//! Township simulation.
//!
//! The world is a static rectangle of tiles. Every tile carries an address
//! prefix (`world:sector:arena:object`), a collision flag, and a mutable set
//! of events describing what is happening on it. Address components never
//! change after load; only event sets mutate, and the orchestrator funnels
//! those mutations through [`StagedWrites`] once per tick.
//!
//! # Modules
//!
//! - [`error`] -- Error types for grid and world-definition operations.
//! - [`tile`] -- [`Tile`]: address components, collision, event set.
//! - [`grid`] -- [`Grid`]: the tile arena, address index, and event ops.
//! - [`commit`] -- [`StagedWrites`]: buffered tile-event writes applied in
//!   one commit phase.
//! - [`definition`] -- [`WorldDefinition`]: the JSON world description
//!   loaded at startup.
//! - [`pathfinding`] -- Breadth-first shortest walks and target selection.
//! - [`sample_world`] -- A small built-in town used by the engine and tests.

pub mod commit;
pub mod definition;
pub mod error;
pub mod grid;
pub mod pathfinding;
pub mod sample_world;
pub mod tile;

// Re-export primary types at crate root.
pub use commit::{CommitReport, StagedWrites, TileWrite};
pub use definition::{LayerSet, WorldDefinition};
pub use error::WorldError;
pub use grid::Grid;
pub use pathfinding::{closest_by_path, meeting_point, shortest_path};
pub use sample_world::{SAMPLE_FALLBACK_ADDRESS, sample_town};
pub use tile::Tile;
