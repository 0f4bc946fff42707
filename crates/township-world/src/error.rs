//! Error types for the `township-world` crate.

use township_types::{AddressLevel, TilePos};

/// Errors that can occur during grid and world-definition operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A coordinate lies outside the grid.
    #[error("tile {pos} is outside the {width}x{height} grid")]
    OutOfBounds {
        /// The offending coordinate.
        pos: TilePos,
        /// Grid width in tiles.
        width: u32,
        /// Grid height in tiles.
        height: u32,
    },

    /// A tile lacks an address component needed for the requested level.
    #[error("tile {pos} has no {level} component")]
    LevelNotPresent {
        /// The tile that was queried.
        pos: TilePos,
        /// The level that was requested.
        level: AddressLevel,
    },

    /// No tile satisfies the given address.
    #[error("address not found: {0}")]
    AddressNotFound(String),

    /// The world definition is malformed.
    #[error("invalid world definition: {reason}")]
    InvalidDefinition {
        /// What is wrong with it.
        reason: String,
    },

    /// The world definition file could not be read.
    #[error("failed to read world definition: {0}")]
    Io(#[from] std::io::Error),

    /// The world definition file is not valid JSON for the expected shape.
    #[error("failed to parse world definition: {0}")]
    Json(#[from] serde_json::Error),

    /// Arithmetic overflow while computing a tile index.
    #[error("arithmetic overflow in grid calculation")]
    ArithmeticOverflow,
}

impl WorldError {
    /// Shorthand for [`WorldError::InvalidDefinition`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            reason: reason.into(),
        }
    }
}
