//! Shared type definitions for the Township simulation.
//!
//! This crate is the single source of truth for the value types used across
//! the Township workspace. The movement wire records flow downstream to
//! `TypeScript` via `ts-rs` for the visualization front end.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifiers for memory nodes
//! - [`enums`] -- Enumeration types (memory kinds, address levels)
//! - [`structs`] -- Tiles, events, triples, schedule entries, chat lines
//! - [`movement`] -- Per-tick movement records and the compressed movement log
//! - [`time`] -- Simulation timestamp formatting and minute arithmetic

pub mod enums;
pub mod ids;
pub mod movement;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{AddressLevel, MemoryKind};
pub use ids::NodeId;
pub use movement::{AgentMovement, MovementLog, TickMovement};
pub use structs::{ChatLine, ScheduleEntry, TileEvent, TilePos, Triple};
