//! Integer identifiers for memory nodes.
//!
//! Node ids are handed out by an agent's memory store in strictly increasing
//! order starting at 1. They are plain integers so that back-references
//! (chat evidence, insight evidence) survive a snapshot round trip unchanged.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Identifier of one memory node inside a single agent's memory store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct NodeId(pub u64);

impl NodeId {
    /// The first id a fresh memory store assigns.
    pub const FIRST: Self = Self(1);

    /// Return the inner integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// The id that follows this one, or `None` on overflow.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_monotonic() {
        assert_eq!(NodeId::FIRST.next(), Some(NodeId(2)));
        assert_eq!(NodeId(u64::MAX).next(), None);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&NodeId(7)).unwrap_or_default();
        assert_eq!(json, "7");
    }
}
