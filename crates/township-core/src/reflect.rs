//! Reflection.
//!
//! Every stored event lowers an agent's importance trigger by its
//! poignancy. Once the trigger reaches zero the agent reflects: it asks for
//! focal questions over its most recently accessed memories, retrieves the
//! best-scoring nodes for each question, and stores the resulting insights
//! as thoughts whose evidence points back at those nodes.
//!
//! Separately, on the last step of a conversation each participant writes a
//! planning note and a memo about it.

use chrono::NaiveDateTime;
use township_agents::retrieval::retrieve_focal_points;
use township_agents::{Agent, AgentError, MemoryNode, NewMemory, RetrievalParams};
use township_types::time::{add_minutes, add_seconds};
use township_types::{MemoryKind, NodeId, Triple};
use tracing::{debug, info};

use crate::oracle::{CognitionRequest, OracleGuard};
use crate::perception::{embed_cached, score_poignancy};

/// Focal questions asked per reflection.
pub const FOCAL_POINT_COUNT: usize = 3;
/// How long a reflected thought stays relevant: 30 days.
const THOUGHT_LIFETIME_MINUTES: u32 = 43_200;

/// Store `text` as a thought backed by `evidence`.
pub(crate) fn store_thought(
    agent: &mut Agent,
    text: &str,
    evidence: Vec<NodeId>,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<NodeId, AgentError> {
    let name = agent.name().to_owned();
    let triple = guard
        .ask(&CognitionRequest::EventTriple {
            agent: name.clone(),
            description: text.to_owned(),
        })
        .into_triple()
        .unwrap_or_else(|| Triple::new(name, "is", text));
    let keywords = [
        triple.subject.clone(),
        triple.predicate.clone(),
        triple.object.clone(),
    ];
    let poignancy = score_poignancy(agent, MemoryKind::Thought, text, guard);
    let embedding = embed_cached(agent, text, guard);
    let node = agent.memory.add_thought(
        NewMemory::new(now, triple, text)
            .with_keywords(keywords)
            .with_poignancy(poignancy)
            .with_embedding(embedding)
            .with_expiration(add_minutes(now, THOUGHT_LIFETIME_MINUTES))
            .with_evidence(evidence),
    )?;
    Ok(node.id)
}

/// Descriptions of the latest non-idle events and thoughts, ordered by last
/// access, limited to the number of events since the last reflection.
fn recent_statements(agent: &Agent) -> Vec<String> {
    let mut nodes: Vec<&MemoryNode> = agent
        .memory
        .sequence(MemoryKind::Event)
        .chain(agent.memory.sequence(MemoryKind::Thought))
        .filter(|n| !n.description.contains("idle"))
        .collect();
    nodes.sort_by_key(|n| n.last_accessed);
    let keep = usize::try_from(agent.scratch.importance_elements).unwrap_or(usize::MAX);
    let skip = nodes.len().saturating_sub(keep);
    nodes
        .into_iter()
        .skip(skip)
        .map(|n| n.description.clone())
        .collect()
}

/// Reflect once: focal points, retrieval, insights. Returns the ids of the
/// stored thoughts.
///
/// # Errors
///
/// Returns [`AgentError`] if retrieval or storing a thought fails.
pub fn run_reflection(
    agent: &mut Agent,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<Vec<NodeId>, AgentError> {
    let name = agent.name().to_owned();
    let statements = recent_statements(agent);
    let focal_points = guard
        .ask(&CognitionRequest::FocalPoints {
            agent: name.clone(),
            statements,
            count: FOCAL_POINT_COUNT,
        })
        .into_lines()
        .unwrap_or_default();

    let focal: Vec<(String, Vec<f32>)> = focal_points
        .into_iter()
        .map(|point| {
            let embedding = embed_cached(agent, &point, guard);
            (point, embedding)
        })
        .collect();
    let params = RetrievalParams::from(&agent.scratch.config);
    let retrieved = retrieve_focal_points(&mut agent.memory, &focal, &params, now)?;

    let mut stored = Vec::new();
    for (focal_point, ids) in retrieved {
        if ids.is_empty() {
            continue;
        }
        let statements: Vec<String> = ids
            .iter()
            .filter_map(|id| agent.memory.node(*id))
            .map(|n| n.description.clone())
            .collect();
        let insights = guard
            .ask(&CognitionRequest::Insights {
                agent: name.clone(),
                statements,
                count: agent.scratch.config.thought_count,
            })
            .into_insights()
            .unwrap_or_default();
        debug!(agent = %name, focal_point = %focal_point, insights = insights.len(), "Focal point");

        for insight in insights {
            let evidence: Vec<NodeId> = insight
                .evidence
                .iter()
                .filter_map(|i| ids.get(*i).copied())
                .collect();
            stored.push(store_thought(agent, &insight.thought, evidence, now, guard)?);
        }
    }
    Ok(stored)
}

/// Record what the agent takes away from a conversation ending this step.
fn conversation_notes(
    agent: &mut Agent,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<usize, AgentError> {
    let Some(partner) = agent.scratch.action.chatting_with.clone() else {
        return Ok(0);
    };
    let name = agent.name().to_owned();
    let transcript = agent.scratch.action.chat.clone().unwrap_or_default();
    let evidence: Vec<NodeId> = agent
        .memory
        .last_chat(&partner)
        .map(|n| vec![n.id])
        .unwrap_or_default();

    let Some((planning, memo)) = guard
        .ask(&CognitionRequest::ConversationNotes {
            agent: name.clone(),
            partner: partner.clone(),
            transcript,
        })
        .into_notes()
    else {
        return Ok(0);
    };

    let mut stored = 0_usize;
    if !planning.is_empty() {
        let text = format!("For {name}'s planning: {planning}");
        store_thought(agent, &text, evidence.clone(), now, guard)?;
        stored = stored.saturating_add(1);
    }
    if !memo.is_empty() {
        let text = format!("{name} {memo}");
        store_thought(agent, &text, evidence, now, guard)?;
        stored = stored.saturating_add(1);
    }
    debug!(agent = %name, partner = %partner, stored, "Conversation notes");
    Ok(stored)
}

/// Reflect if the trigger has run out, and take conversation notes if the
/// current chat ends before the next step.
///
/// # Errors
///
/// Returns [`AgentError`] if storing a thought fails.
pub fn reflect(
    agent: &mut Agent,
    now: NaiveDateTime,
    sec_per_step: u32,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    let has_memories = agent
        .memory
        .sequence(MemoryKind::Event)
        .chain(agent.memory.sequence(MemoryKind::Thought))
        .next()
        .is_some();
    if agent.scratch.should_reflect() && has_memories {
        let stored = run_reflection(agent, now, guard)?;
        info!(agent = %agent.name(), thoughts = stored.len(), "Reflected");
        agent.scratch.reset_reflection();
    }

    if let Some(end) = agent.scratch.action.chat_end_time
        && now < end
        && add_seconds(now, sec_per_step) >= end
    {
        conversation_notes(agent, now, guard)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_agents::{ActionTarget, AgentProfile, CognitiveConfig, NewAction};
    use township_types::{ChatLine, TilePos};

    use super::*;
    use crate::stub::{HashEmbedding, StubCognition};

    fn at(minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(9, minute, second)
            .unwrap()
    }

    fn guard() -> OracleGuard {
        OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(HashEmbedding::new(16)),
            1,
        )
    }

    fn agent(trigger: f64) -> Agent {
        let profile = AgentProfile {
            name: "Klaus Mueller".to_owned(),
            ..AgentProfile::default()
        };
        let config = CognitiveConfig {
            importance_trigger_max: trigger,
            ..CognitiveConfig::default()
        };
        Agent::new(profile, config, TilePos::new(2, 3))
    }

    fn remember(agent: &mut Agent, description: &str, guard: &mut OracleGuard) {
        let embedding = embed_cached(agent, description, guard);
        agent
            .memory
            .add_event(
                NewMemory::new(at(0, 0), Triple::new("Klaus Mueller", "is", description), description)
                    .with_poignancy(3.0)
                    .with_embedding(embedding),
            )
            .unwrap();
        agent.scratch.record_importance(3.0);
    }

    #[test]
    fn reflection_waits_for_the_trigger() {
        let mut klaus = agent(10.0);
        let mut oracles = guard();
        remember(&mut klaus, "Klaus Mueller is writing a paper", &mut oracles);
        reflect(&mut klaus, at(1, 0), 10, &mut oracles).unwrap();
        assert_eq!(klaus.memory.sequence(MemoryKind::Thought).count(), 0);
        assert!(!klaus.scratch.should_reflect());
    }

    #[test]
    fn reflection_stores_insights_with_evidence() {
        let mut klaus = agent(5.0);
        let mut oracles = guard();
        remember(&mut klaus, "Klaus Mueller is writing a paper", &mut oracles);
        remember(&mut klaus, "Klaus Mueller is reading about gentrification", &mut oracles);
        assert!(klaus.scratch.should_reflect());

        reflect(&mut klaus, at(1, 0), 10, &mut oracles).unwrap();

        let thoughts: Vec<&MemoryNode> = klaus.memory.sequence(MemoryKind::Thought).collect();
        assert!(!thoughts.is_empty());
        for thought in &thoughts {
            assert!(thought.description.starts_with("Klaus noticed that "));
            assert_eq!(thought.depth, 1);
            assert_eq!(thought.evidence.len(), 1);
            assert!(thought.expiration.is_some());
        }
        assert!(!klaus.scratch.should_reflect());
        assert_eq!(klaus.scratch.importance_elements, 0);
    }

    #[test]
    fn conversation_notes_on_the_last_step() {
        let mut klaus = agent(1000.0);
        let mut oracles = guard();
        let transcript = vec![
            ChatLine::new("Klaus Mueller", "Hi Maria!"),
            ChatLine::new("Maria Lopez", "Hi Klaus!"),
        ];
        let action = NewAction::new(
            "Klaus Mueller",
            ActionTarget::Agent("Maria Lopez".to_owned()),
            1,
            "greeting Maria",
        )
        .with_chat("Maria Lopez", transcript.clone(), at(1, 0));
        klaus.scratch.begin_action(action, at(0, 0));
        klaus
            .memory
            .add_chat(
                NewMemory::new(
                    at(0, 0),
                    Triple::new("Klaus Mueller", "chat with", "Maria Lopez"),
                    "greeting Maria",
                )
                .with_keywords(["klaus mueller", "maria lopez"])
                .with_transcript(transcript),
            )
            .unwrap();

        reflect(&mut klaus, at(0, 40), 10, &mut oracles).unwrap();
        assert_eq!(klaus.memory.sequence(MemoryKind::Thought).count(), 0);

        reflect(&mut klaus, at(0, 50), 10, &mut oracles).unwrap();
        let thoughts: Vec<&MemoryNode> = klaus.memory.sequence(MemoryKind::Thought).collect();
        assert_eq!(thoughts.len(), 2);
        assert!(thoughts[0].description.starts_with("For Klaus Mueller's planning: "));
        assert_eq!(thoughts[1].description, "Klaus Mueller enjoyed talking with Maria");
        let chat = klaus.memory.last_chat("Maria Lopez").unwrap().id;
        assert!(thoughts.iter().all(|t| t.evidence == vec![chat]));
    }
}
