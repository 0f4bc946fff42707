//! Perception and association.
//!
//! Each tick an agent looks at the tiles within its vision radius. Every
//! visible tile feeds the agent's spatial knowledge tree. Events on tiles in
//! the agent's own arena are ranked by distance, deduplicated, and cut to
//! the attention bandwidth. Anything not among the agent's most recent
//! memories is stored as a new event node with an oracle-scored poignancy.
//!
//! [`associate`] then pulls the related events and thoughts for each newly
//! stored node; planning uses those when deciding whether to react.

use chrono::NaiveDateTime;
use township_agents::{Agent, AgentError, MemoryNode, NewMemory};
use township_types::{MemoryKind, TileEvent, TilePos, Triple};
use township_world::Grid;
use tracing::debug;

use crate::oracle::{CognitionRequest, OracleGuard};

/// Predicate of a conversation event.
pub const CHAT_PREDICATE: &str = "chat with";

/// One perceived event with the memories it calls up.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    /// The newly stored event node.
    pub event: MemoryNode,
    /// Earlier events sharing its subject or object.
    pub events: Vec<MemoryNode>,
    /// Thoughts sharing its subject or object.
    pub thoughts: Vec<MemoryNode>,
}

/// Last colon-separated component of an address or name.
fn last_component(text: &str) -> &str {
    text.rsplit(':').next().unwrap_or(text)
}

/// The part of a description used as its embedding key: the text inside
/// the first parentheses when there are any.
pub fn embedding_key(description: &str) -> &str {
    description
        .split_once('(')
        .map(|(_, rest)| rest.split_once(')').map_or(rest, |(inner, _)| inner).trim())
        .filter(|inner| !inner.is_empty())
        .unwrap_or(description)
}

/// Cached embedding for `key`, embedding it through the guard if needed.
pub fn embed_cached(agent: &mut Agent, key: &str, guard: &mut OracleGuard) -> Vec<f32> {
    if let Some(cached) = agent.memory.embedding(key) {
        return cached.to_vec();
    }
    let embedding = guard.embed(key);
    if !embedding.is_empty() {
        agent.memory.cache_embedding(key, embedding.clone());
    }
    embedding
}

/// Oracle-scored importance of a new memory.
pub fn score_poignancy(
    agent: &Agent,
    memory: MemoryKind,
    description: &str,
    guard: &mut OracleGuard,
) -> f64 {
    let request = CognitionRequest::Poignancy {
        agent: agent.name().to_owned(),
        memory,
        description: description.to_owned(),
    };
    let score = guard
        .ask(&request)
        .into_score()
        .unwrap_or(crate::oracle::FALLBACK_POIGNANCY);
    f64::from(score)
}

/// Events in the agent's arena within vision, nearest first, without
/// duplicates, cut to the attention bandwidth.
fn visible_events(agent: &mut Agent, grid: &Grid) -> Result<Vec<TileEvent>, AgentError> {
    let here = agent.tile();
    let here_tile = grid.tile_at(here)?;
    let radius = agent.scratch.config.vision_radius;

    let mut seen: Vec<(f64, TilePos, &TileEvent)> = Vec::new();
    for pos in grid.nearby_tiles(here, radius) {
        let Ok(tile) = grid.tile_at(pos) else {
            continue;
        };
        agent.spatial.observe(tile);
        if !tile.same_arena(here_tile) {
            continue;
        }
        for event in tile.events() {
            if !seen.iter().any(|(_, _, e)| *e == event) {
                seen.push((here.distance(pos), pos, event));
            }
        }
    }
    seen.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    Ok(seen
        .into_iter()
        .take(agent.scratch.config.attention_bandwidth)
        .map(|(_, _, event)| event.clone())
        .collect())
}

/// Look around, store what is new, and return the stored event nodes.
///
/// # Errors
///
/// Returns [`AgentError`] if the agent's tile is off the grid or the memory
/// store rejects a node.
pub fn perceive(
    agent: &mut Agent,
    grid: &Grid,
    guard: &mut OracleGuard,
    now: NaiveDateTime,
) -> Result<Vec<MemoryNode>, AgentError> {
    let events = visible_events(agent, grid)?;
    let known = agent
        .memory
        .latest_event_triples(agent.scratch.config.retention);

    let mut stored = Vec::new();
    for event in events {
        let (predicate, object, description) = match (&event.predicate, &event.object) {
            (Some(p), Some(o)) => (
                p.clone(),
                o.clone(),
                event.description.clone().unwrap_or_else(|| o.clone()),
            ),
            _ => ("is".to_owned(), "idle".to_owned(), "idle".to_owned()),
        };
        let triple = Triple::new(event.subject.clone(), predicate, object);
        if known.contains(&triple) {
            continue;
        }

        let description = format!("{} is {description}", last_component(&triple.subject));
        let keywords = [
            last_component(&triple.subject).to_owned(),
            last_component(&triple.object).to_owned(),
        ];
        let embedding = embed_cached(agent, embedding_key(&description), guard);
        let poignancy = if description.contains("is idle") {
            1.0
        } else {
            score_poignancy(agent, MemoryKind::Event, &description, guard)
        };

        let mut evidence = Vec::new();
        if triple.predicate == CHAT_PREDICATE && triple.subject == agent.name() {
            let chat_description = agent.scratch.action.description.clone();
            let chat_embedding = embed_cached(agent, &chat_description, guard);
            let chat_poignancy = score_poignancy(agent, MemoryKind::Chat, &chat_description, guard);
            let transcript = agent.scratch.action.chat.clone().unwrap_or_default();
            let chat = agent.memory.add_chat(
                NewMemory::new(now, triple.clone(), chat_description)
                    .with_keywords(keywords.clone())
                    .with_poignancy(chat_poignancy)
                    .with_embedding(chat_embedding)
                    .with_transcript(transcript),
            )?;
            evidence.push(chat.id);
        }

        let node = agent.memory.add_event(
            NewMemory::new(now, triple, description)
                .with_keywords(keywords)
                .with_poignancy(poignancy)
                .with_embedding(embedding)
                .with_evidence(evidence),
        )?;
        let node = node.clone();
        agent.scratch.record_importance(poignancy);
        stored.push(node);
    }

    if !stored.is_empty() {
        debug!(
            agent = %agent.name(),
            stored = stored.len(),
            trigger = agent.scratch.importance_trigger,
            "Perceived new events"
        );
    }
    Ok(stored)
}

/// Related events and thoughts for each perceived node.
pub fn associate(agent: &Agent, perceived: &[MemoryNode]) -> Vec<Association> {
    perceived
        .iter()
        .map(|node| Association {
            event: node.clone(),
            events: agent
                .memory
                .retrieve_relevant(MemoryKind::Event, &node.triple)
                .into_iter()
                .filter(|n| n.id != node.id)
                .cloned()
                .collect(),
            thoughts: agent
                .memory
                .retrieve_relevant(MemoryKind::Thought, &node.triple)
                .into_iter()
                .cloned()
                .collect(),
        })
        .collect()
}
