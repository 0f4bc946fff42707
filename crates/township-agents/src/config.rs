//! Per-agent cognitive parameters.
//!
//! These are loaded from the `agent` section of the simulation config and
//! copied into every agent's scratch at spawn, so individual agents can be
//! tuned without touching the others.

use serde::{Deserialize, Serialize};

/// Weights (or gains) for the three retrieval components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Multiplier on the recency component.
    pub recency: f64,
    /// Multiplier on the relevance component.
    pub relevance: f64,
    /// Multiplier on the importance component.
    pub importance: f64,
}

impl RetrievalWeights {
    /// Fixed gains that favor relevance over importance over recency.
    pub const GAINS: Self = Self {
        recency: 0.5,
        relevance: 3.0,
        importance: 2.0,
    };
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            recency: 1.0,
            relevance: 1.0,
            importance: 1.0,
        }
    }
}

/// Tunable cognitive parameters for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveConfig {
    /// How many tiles away the agent can see (default: 4).
    #[serde(default = "default_vision_radius")]
    pub vision_radius: u32,

    /// How many perceived events the agent attends to per tick (default: 3).
    #[serde(default = "default_attention_bandwidth")]
    pub attention_bandwidth: usize,

    /// How many recent events count as "already known" (default: 5).
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Per-step recency decay in `(0, 1)` (default: 0.99).
    #[serde(default = "default_recency_decay")]
    pub recency_decay: f64,

    /// Per-agent retrieval weights (default: 1, 1, 1).
    #[serde(default)]
    pub weights: RetrievalWeights,

    /// Retrieval gains (default: 0.5, 3, 2).
    #[serde(default = "default_gains")]
    pub gains: RetrievalWeights,

    /// How many nodes a focal-point retrieval returns (default: 30).
    #[serde(default = "default_retrieval_count")]
    pub retrieval_count: usize,

    /// Accumulated poignancy that triggers a reflection (default: 150).
    #[serde(default = "default_importance_trigger_max")]
    pub importance_trigger_max: f64,

    /// Ticks before the agent may chat with the same partner again
    /// (default: 800).
    #[serde(default = "default_chat_cooldown_ticks")]
    pub chat_cooldown_ticks: u32,

    /// Focal points and insights generated per reflection (default: 5).
    #[serde(default = "default_thought_count")]
    pub thought_count: usize,
}

impl Default for CognitiveConfig {
    fn default() -> Self {
        Self {
            vision_radius: default_vision_radius(),
            attention_bandwidth: default_attention_bandwidth(),
            retention: default_retention(),
            recency_decay: default_recency_decay(),
            weights: RetrievalWeights::default(),
            gains: default_gains(),
            retrieval_count: default_retrieval_count(),
            importance_trigger_max: default_importance_trigger_max(),
            chat_cooldown_ticks: default_chat_cooldown_ticks(),
            thought_count: default_thought_count(),
        }
    }
}

const fn default_vision_radius() -> u32 {
    4
}

const fn default_attention_bandwidth() -> usize {
    3
}

const fn default_retention() -> usize {
    5
}

const fn default_recency_decay() -> f64 {
    0.99
}

const fn default_gains() -> RetrievalWeights {
    RetrievalWeights::GAINS
}

const fn default_retrieval_count() -> usize {
    30
}

const fn default_importance_trigger_max() -> f64 {
    150.0
}

const fn default_chat_cooldown_ticks() -> u32 {
    800
}

const fn default_thought_count() -> usize {
    5
}
