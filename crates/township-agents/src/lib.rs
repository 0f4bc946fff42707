//! Agent memory, retrieval, schedules, and navigation for the Township
//! simulation.
//!
//! This crate contains everything that operates on one agent's private
//! state without calling out to the cognition or embedding oracles. Callers
//! (the tick orchestrator in `township-core`) fetch oracle answers first and
//! hand plain values in, which keeps every function here deterministic.
//!
//! # Modules
//!
//! - [`action`] -- The current action and its lifecycle ([`ActionState`]).
//! - [`agent`] -- The agent aggregate and its snapshot form ([`Agent`]).
//! - [`config`] -- Per-agent cognitive parameters ([`CognitiveConfig`]).
//! - [`error`] -- Error types for agent operations ([`AgentError`]).
//! - [`memory`] -- Append-only associative memory ([`AssociativeMemory`]).
//! - [`navigation`] -- Turning an action target into tile steps.
//! - [`retrieval`] -- Recency/importance/relevance scoring.
//! - [`schedule`] -- The daily schedule and reactive splicing
//!   ([`DailySchedule`]).
//! - [`scratch`] -- Short-term working state ([`AgentScratch`]).
//! - [`spatial`] -- The agent's known `world → sector → arena → object` tree.

pub mod action;
pub mod agent;
pub mod config;
pub mod error;
pub mod memory;
pub mod navigation;
pub mod retrieval;
pub mod schedule;
pub mod scratch;
pub mod spatial;

// Re-export primary types at crate root for convenience.
pub use action::{ActionState, ActionTarget, NewAction};
pub use agent::{Agent, AgentSnapshot};
pub use config::{CognitiveConfig, RetrievalWeights};
pub use error::AgentError;
pub use memory::{AssociativeMemory, MemoryNode, MemorySnapshot, NewMemory};
pub use navigation::{NavigationContext, next_step};
pub use retrieval::{
    RetrievalParams, ScoredNode, cosine_similarity, normalize, score_and_select,
    score_candidates,
};
pub use schedule::{DailySchedule, SpliceRequest};
pub use scratch::{AgentProfile, AgentScratch};
pub use spatial::SpatialMemory;
