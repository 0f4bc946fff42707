//! Movement record output for the visualization front end.
//!
//! [`MovementWriter`] is the engine's [`TickCallback`]: after each step it
//! optionally writes `<movement_dir>/<step>.json`, and at the end of the
//! run [`write_movement_log`] writes the compressed replay to
//! `<movement_dir>/master_movement.json`.

use std::path::{Path, PathBuf};

use township_core::runner::TickCallback;
use township_core::tick::{SimulationState, TickSummary};
use township_types::MovementLog;
use tracing::{debug, warn};

use crate::error::EngineError;

/// File name of the compressed replay inside the movement directory.
pub const MASTER_MOVEMENT_FILE: &str = "master_movement.json";

/// Callback that writes one movement file per step.
pub struct MovementWriter {
    dir: PathBuf,
    per_step_files: bool,
    failed_writes: u64,
}

impl MovementWriter {
    /// Create a writer rooted at `dir`, creating the directory when per-step
    /// files are enabled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Output`] if the directory cannot be created.
    pub fn new(dir: &Path, per_step_files: bool) -> Result<Self, EngineError> {
        if per_step_files {
            std::fs::create_dir_all(dir).map_err(|e| EngineError::Output {
                message: format!("failed to create {}: {e}", dir.display()),
            })?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            per_step_files,
            failed_writes: 0,
        })
    }

    /// Steps whose file could not be written.
    pub const fn failed_writes(&self) -> u64 {
        self.failed_writes
    }

    fn write_step(&self, summary: &TickSummary) -> Result<(), EngineError> {
        let path = self.dir.join(format!("{}.json", summary.step));
        let json = serde_json::to_string(&summary.movement).map_err(|e| EngineError::Output {
            message: format!("failed to serialize step {}: {e}", summary.step),
        })?;
        std::fs::write(&path, json).map_err(|e| EngineError::Output {
            message: format!("failed to write {}: {e}", path.display()),
        })
    }
}

impl TickCallback for MovementWriter {
    fn on_tick(&mut self, summary: &TickSummary, _state: &SimulationState) {
        debug!(
            step = summary.step,
            time = %summary.curr_time,
            failed_agents = summary.failed_agents.len(),
            "Step complete"
        );
        if !self.per_step_files {
            return;
        }
        // A lost frame must not stop the run.
        if let Err(e) = self.write_step(summary) {
            self.failed_writes = self.failed_writes.saturating_add(1);
            warn!(step = summary.step, error = %e, "Movement file not written");
        }
    }
}

/// Write the compressed replay into `dir`.
///
/// # Errors
///
/// Returns [`EngineError::Output`] if serialization or the write fails.
pub fn write_movement_log(dir: &Path, log: &MovementLog) -> Result<PathBuf, EngineError> {
    std::fs::create_dir_all(dir).map_err(|e| EngineError::Output {
        message: format!("failed to create {}: {e}", dir.display()),
    })?;
    let path = dir.join(MASTER_MOVEMENT_FILE);
    let json = serde_json::to_string_pretty(log).map_err(|e| EngineError::Output {
        message: format!("failed to serialize movement log: {e}"),
    })?;
    std::fs::write(&path, json).map_err(|e| EngineError::Output {
        message: format!("failed to write {}: {e}", path.display()),
    })?;
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_agents::{Agent, AgentProfile, CognitiveConfig};
    use township_core::clock::SimClock;
    use township_core::oracle::OracleGuard;
    use township_core::stub::{HashEmbedding, StubCognition};
    use township_core::tick::run_tick;
    use township_types::TilePos;
    use township_world::{Grid, SAMPLE_FALLBACK_ADDRESS, sample_town};

    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("township-{label}-{}", std::process::id()))
    }

    #[test]
    fn writes_step_files_and_the_master_log() {
        let start = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let profile = AgentProfile {
            name: String::from("Klaus Mueller"),
            ..AgentProfile::default()
        };
        let mut state = SimulationState::new(
            SimClock::new(start, 10).unwrap(),
            Grid::from_definition(&sample_town()).unwrap(),
            [Agent::new(profile, CognitiveConfig::default(), TilePos::new(2, 3))],
            5,
            SAMPLE_FALLBACK_ADDRESS,
        );
        let mut guard = OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(HashEmbedding::new(8)),
            1,
        );

        let dir = scratch_dir("movement");
        let mut writer = MovementWriter::new(&dir, true).unwrap();
        for _ in 0..2 {
            let summary = run_tick(&mut state, &mut guard).unwrap();
            writer.on_tick(&summary, &state);
        }
        assert_eq!(writer.failed_writes(), 0);

        let first: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("0.json")).unwrap()).unwrap();
        assert_eq!(first["step"], 0);
        assert!(first["agents"]["Klaus Mueller"]["next_tile"].is_object());
        assert!(dir.join("1.json").exists());

        let master = write_movement_log(&dir, &state.movement_log).unwrap();
        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(master).unwrap()).unwrap();
        assert!(log["steps"]["0"]["Klaus Mueller"].is_object());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn disabled_writer_touches_nothing() {
        let dir = scratch_dir("no-movement");
        let writer = MovementWriter::new(&dir, false).unwrap();
        assert!(!dir.exists());
        assert_eq!(writer.failed_writes(), 0);
    }
}
