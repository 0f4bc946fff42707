//! Error types for the township-agents crate.

use township_types::NodeId;
use township_world::WorldError;

/// Errors that can occur during agent state operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A day's schedule does not add up to 1440 minutes.
    #[error("daily schedule sums to {total} minutes instead of 1440")]
    ScheduleInvariantViolation {
        /// The actual total.
        total: u32,
    },

    /// A memory node id does not exist in this store.
    #[error("unknown memory node: {0}")]
    UnknownNode(NodeId),

    /// The memory store ran out of node ids.
    #[error("memory node id space exhausted")]
    IdSpaceExhausted,

    /// A restored snapshot is inconsistent.
    #[error("corrupt agent snapshot: {reason}")]
    CorruptSnapshot {
        /// What is inconsistent.
        reason: String,
    },

    /// A world query failed while navigating.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
