//! Simulation clock, oracles, tick cycle, and orchestration for the
//! Township simulation.
//!
//! This crate owns the per-step cycle that drives every agent: occupancy
//! bookkeeping, perception, planning, reflection, and one tile of movement.
//!
//! # Modules
//!
//! - [`clock`] -- Step counter and simulation time; day-change detection.
//! - [`config`] -- Configuration loading from `township-config.yaml` into
//!   strongly-typed structs.
//! - [`operator`] -- Pause, resume, pacing, and stop controls.
//! - [`oracle`] -- [`CognitionOracle`] and [`EmbeddingOracle`] traits plus
//!   the validating, retrying [`OracleGuard`].
//! - [`perception`] -- Looking around and storing new events.
//! - [`planning`] -- Day plans, next actions, conversations, and waiting.
//! - [`reflect`] -- Insights and post-conversation notes.
//! - [`runner`] -- The async step loop with operator controls.
//! - [`snapshot`] -- Saving and restoring a run.
//! - [`stub`] -- Deterministic offline oracles.
//! - [`tick`] -- One simulation step.
//!
//! [`CognitionOracle`]: oracle::CognitionOracle
//! [`EmbeddingOracle`]: oracle::EmbeddingOracle
//! [`OracleGuard`]: oracle::OracleGuard

pub mod clock;
pub mod config;
pub mod operator;
pub mod oracle;
pub mod perception;
pub mod planning;
pub mod reflect;
pub mod runner;
pub mod snapshot;
pub mod stub;
pub mod tick;
