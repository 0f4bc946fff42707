//! Scored retrieval over an agent's memory.
//!
//! Candidates are all non-idle event and thought nodes, ordered by
//! `last_accessed` (oldest first, ties by creation). Each candidate gets
//! three components, each min-max normalized to `[0, 1]` across the set:
//!
//! - recency: `decay^rank` where the most recently accessed node has rank 1
//! - importance: the node's poignancy
//! - relevance: cosine similarity between the node's cached embedding and
//!   the focal embedding
//!
//! The composite is `Σ weight · gain · component`. The top `limit` nodes by
//! composite score are returned (stable, so ties keep candidate order) and
//! their `last_accessed` is set to the current time.

use chrono::NaiveDateTime;
use township_types::{MemoryKind, NodeId};

use crate::config::{CognitiveConfig, RetrievalWeights};
use crate::error::AgentError;
use crate::memory::{AssociativeMemory, MemoryNode};

/// Parameters of one retrieval pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Recency decay in `(0, 1)`.
    pub decay: f64,
    /// Per-agent component weights.
    pub weights: RetrievalWeights,
    /// Fixed component gains.
    pub gains: RetrievalWeights,
    /// Maximum number of nodes returned.
    pub limit: usize,
}

impl From<&CognitiveConfig> for RetrievalParams {
    fn from(config: &CognitiveConfig) -> Self {
        Self {
            decay: config.recency_decay,
            weights: config.weights,
            gains: config.gains,
            limit: config.retrieval_count,
        }
    }
}

/// A candidate with its normalized components and composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNode {
    /// The scored node.
    pub id: NodeId,
    /// Normalized recency.
    pub recency: f64,
    /// Normalized relevance.
    pub relevance: f64,
    /// Normalized importance.
    pub importance: f64,
    /// Weighted composite.
    pub score: f64,
}

/// Min-max normalize `values` in place onto `[target_min, target_max]`.
/// When every value is equal, each becomes the midpoint
/// `(target_max - target_min) / 2`.
pub fn normalize(values: &mut [f64], target_min: f64, target_max: f64) {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return;
    };
    let max = values.iter().copied().fold(min, f64::max);
    let range = max - min;
    let target_range = target_max - target_min;

    if range.abs() < f64::EPSILON {
        let midpoint = target_range / 2.0;
        values.iter_mut().for_each(|v| *v = midpoint);
        return;
    }
    for v in values.iter_mut() {
        *v = (*v - min) * target_range / range + target_min;
    }
}

/// Cosine similarity of two vectors. Mismatched lengths, empty input, or a
/// zero-length vector give `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        },
    );
    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator < f64::EPSILON {
        return 0.0;
    }
    dot / denominator
}

fn candidates(memory: &AssociativeMemory) -> Vec<&MemoryNode> {
    let mut nodes: Vec<&MemoryNode> = memory
        .sequence(MemoryKind::Event)
        .chain(memory.sequence(MemoryKind::Thought))
        .filter(|node| !node.is_idle())
        .collect();
    nodes.sort_by_key(|node| (node.last_accessed, node.created, node.id));
    nodes
}

/// Score every candidate against `focal_embedding`, in candidate order.
pub fn score_candidates(
    memory: &AssociativeMemory,
    focal_embedding: &[f32],
    params: &RetrievalParams,
) -> Vec<ScoredNode> {
    let nodes = candidates(memory);
    let count = nodes.len();

    let mut recency: Vec<f64> = (0..count)
        .map(|i| {
            let rank = i32::try_from(count.saturating_sub(i)).unwrap_or(i32::MAX);
            params.decay.powi(rank)
        })
        .collect();
    let mut importance: Vec<f64> = nodes.iter().map(|n| n.poignancy).collect();
    let mut relevance: Vec<f64> = nodes
        .iter()
        .map(|n| {
            memory
                .embedding(&n.description)
                .map_or(0.0, |e| cosine_similarity(e, focal_embedding))
        })
        .collect();

    normalize(&mut recency, 0.0, 1.0);
    normalize(&mut importance, 0.0, 1.0);
    normalize(&mut relevance, 0.0, 1.0);

    let w = params.weights;
    let g = params.gains;
    nodes
        .iter()
        .zip(recency)
        .zip(relevance)
        .zip(importance)
        .map(|(((node, rec), rel), imp)| ScoredNode {
            id: node.id,
            recency: rec,
            relevance: rel,
            importance: imp,
            score: w.recency * rec * g.recency
                + w.relevance * rel * g.relevance
                + w.importance * imp * g.importance,
        })
        .collect()
}

/// The `params.limit` best nodes for one focal embedding, best first. The
/// selected nodes' `last_accessed` becomes `now`.
pub fn score_and_select(
    memory: &mut AssociativeMemory,
    focal_embedding: &[f32],
    params: &RetrievalParams,
    now: NaiveDateTime,
) -> Result<Vec<MemoryNode>, AgentError> {
    let mut scored = score_candidates(memory, focal_embedding, params);
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(params.limit);

    let mut selected = Vec::with_capacity(scored.len());
    for hit in scored {
        memory.touch(hit.id, now)?;
        let node = memory.node(hit.id).ok_or(AgentError::UnknownNode(hit.id))?;
        selected.push(node.clone());
    }
    Ok(selected)
}

/// Run [`score_and_select`] once per focal point. The result keeps the
/// caller's order, one entry per focal point, duplicates included.
pub fn retrieve_focal_points(
    memory: &mut AssociativeMemory,
    focal_points: &[(String, Vec<f32>)],
    params: &RetrievalParams,
    now: NaiveDateTime,
) -> Result<Vec<(String, Vec<NodeId>)>, AgentError> {
    let mut out = Vec::with_capacity(focal_points.len());
    for (focal, embedding) in focal_points {
        let nodes = score_and_select(memory, embedding, params, now)?;
        out.push((focal.clone(), nodes.into_iter().map(|n| n.id).collect()));
    }
    Ok(out)
}
