//! Staged tile-event writes.
//!
//! During a tick, agent bookkeeping records what it wants to change on the
//! grid in a [`StagedWrites`] buffer instead of touching tiles directly.
//! [`Grid::commit`] then applies the buffer in order, so tile mutation
//! happens in one place with a single writer. A write that fails (for
//! example an out-of-bounds tile) is logged and skipped; it never prevents
//! the remaining writes from landing.

use township_types::{TileEvent, TilePos};
use tracing::warn;

use crate::grid::Grid;

/// One buffered change to a tile's event set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileWrite {
    /// Put an event on a tile (replacing any event with the same subject).
    Add {
        /// Target tile.
        tile: TilePos,
        /// Event to add.
        event: TileEvent,
    },
    /// Remove one exact event.
    Remove {
        /// Target tile.
        tile: TilePos,
        /// Event to remove.
        event: TileEvent,
    },
    /// Turn an event into its idle form.
    Idle {
        /// Target tile.
        tile: TilePos,
        /// Event to idle.
        event: TileEvent,
    },
    /// Remove every event with a subject.
    ClearSubject {
        /// Target tile.
        tile: TilePos,
        /// Subject whose events are removed.
        subject: String,
    },
}

/// Ordered buffer of tile writes for one commit phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedWrites {
    writes: Vec<TileWrite>,
}

impl StagedWrites {
    /// An empty buffer.
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Stage [`TileWrite::Add`].
    pub fn add(&mut self, tile: TilePos, event: TileEvent) {
        self.writes.push(TileWrite::Add { tile, event });
    }

    /// Stage [`TileWrite::Remove`].
    pub fn remove(&mut self, tile: TilePos, event: TileEvent) {
        self.writes.push(TileWrite::Remove { tile, event });
    }

    /// Stage [`TileWrite::Idle`].
    pub fn idle(&mut self, tile: TilePos, event: TileEvent) {
        self.writes.push(TileWrite::Idle { tile, event });
    }

    /// Stage [`TileWrite::ClearSubject`].
    pub fn clear_subject(&mut self, tile: TilePos, subject: impl Into<String>) {
        self.writes.push(TileWrite::ClearSubject {
            tile,
            subject: subject.into(),
        });
    }

    /// Number of staged writes.
    pub const fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is staged.
    pub const fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The staged writes in application order.
    pub fn writes(&self) -> &[TileWrite] {
        &self.writes
    }
}

/// Outcome of a commit phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Writes that changed a tile.
    pub applied: usize,
    /// Writes that were valid but had nothing to do.
    pub unchanged: usize,
    /// Writes that failed and were skipped.
    pub rejected: usize,
}

impl Grid {
    /// Apply every staged write in order.
    pub fn commit(&mut self, staged: StagedWrites) -> CommitReport {
        let mut report = CommitReport::default();
        for write in staged.writes {
            let outcome = match &write {
                TileWrite::Add { tile, event } => self.add_event(*tile, event.clone()),
                TileWrite::Remove { tile, event } => self.remove_event(*tile, event),
                TileWrite::Idle { tile, event } => self.idle_event(*tile, event),
                TileWrite::ClearSubject { tile, subject } => self
                    .clear_subject_events(*tile, subject)
                    .map(|removed| removed > 0),
            };
            match outcome {
                Ok(true) => report.applied = report.applied.saturating_add(1),
                Ok(false) => report.unchanged = report.unchanged.saturating_add(1),
                Err(e) => {
                    warn!(error = %e, write = ?write, "Tile write rejected");
                    report.rejected = report.rejected.saturating_add(1);
                }
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::definition::WorldDefinition;

    #[test]
    fn commit_applies_in_order_and_skips_failures() {
        let definition = WorldDefinition::from_collision_rows("w", &["   ", "   "]).unwrap();
        let mut grid = Grid::from_definition(&definition).unwrap();
        let here = TilePos::new(1, 1);
        let walking = TileEvent::new("Klaus", "is", "walking", "walking to the park");

        let mut staged = StagedWrites::new();
        staged.add(here, walking.clone());
        staged.add(TilePos::new(9, 9), walking.clone());
        staged.idle(here, walking);
        staged.clear_subject(here, "Nobody");
        assert_eq!(staged.len(), 4);

        let report = grid.commit(staged);
        assert_eq!(report.applied, 2);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.rejected, 1);
        assert!(grid.events_at(here).unwrap().contains(&TileEvent::idle("Klaus")));
    }
}
