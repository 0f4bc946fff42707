//! Append-only associative memory.
//!
//! Every agent owns one [`AssociativeMemory`]. Nodes live in a vector arena
//! and are identified by [`NodeId`]s that start at 1 and increase by one per
//! node, so `id - 1` is the node's arena index. Nothing is ever deleted;
//! the only field that changes after creation is `last_accessed`, which the
//! retrieval engine bumps when it selects a node.
//!
//! Three chronological sequences (events, thoughts, chats) and three keyword
//! indexes sit on top of the arena. The indexes are derived data: a
//! [`MemorySnapshot`] only carries the nodes and the embedding cache, and
//! [`AssociativeMemory::from_snapshot`] rebuilds the rest.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use township_types::{ChatLine, MemoryKind, NodeId, Triple};
use tracing::debug;

use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// One remembered event, thought, or conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Stable identifier, unique within the owning store.
    pub id: NodeId,
    /// Which sequence the node belongs to.
    pub kind: MemoryKind,
    /// 0 for events and chats; for thoughts, one more than the deepest
    /// evidence node.
    pub depth: u32,
    /// Simulation time of creation.
    pub created: NaiveDateTime,
    /// When the memory stops being relevant, if ever.
    pub expiration: Option<NaiveDateTime>,
    /// Last time retrieval selected this node.
    pub last_accessed: NaiveDateTime,
    /// Subject, predicate, object.
    pub triple: Triple,
    /// Free text; also the key of the node's cached embedding.
    pub description: String,
    /// Lowercased index keywords.
    pub keywords: BTreeSet<String>,
    /// Importance assigned at creation.
    pub poignancy: f64,
    /// Nodes this one was derived from.
    pub evidence: Vec<NodeId>,
    /// Conversation transcript, for chat nodes.
    pub transcript: Option<Vec<ChatLine>>,
}

impl MemoryNode {
    /// Whether the node records `<subject> is idle`.
    pub fn is_idle(&self) -> bool {
        self.triple.is_idle()
    }
}

/// Everything needed to append a node; the store assigns id, depth and
/// access time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    /// Simulation time of creation.
    pub created: NaiveDateTime,
    /// Optional expiry.
    pub expiration: Option<NaiveDateTime>,
    /// Subject, predicate, object.
    pub triple: Triple,
    /// Free text and embedding key.
    pub description: String,
    /// Index keywords (any case).
    pub keywords: BTreeSet<String>,
    /// Importance.
    pub poignancy: f64,
    /// Embedding of `description`, cached if not already known.
    pub embedding: Option<Vec<f32>>,
    /// Back-references to supporting nodes.
    pub evidence: Vec<NodeId>,
    /// Transcript for chat nodes.
    pub transcript: Option<Vec<ChatLine>>,
}

impl NewMemory {
    /// A memory with no keywords, poignancy 1 and no embedding.
    pub fn new(created: NaiveDateTime, triple: Triple, description: impl Into<String>) -> Self {
        Self {
            created,
            expiration: None,
            triple,
            description: description.into(),
            keywords: BTreeSet::new(),
            poignancy: 1.0,
            embedding: None,
            evidence: Vec::new(),
            transcript: None,
        }
    }

    /// Set the index keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the importance.
    #[must_use]
    pub const fn with_poignancy(mut self, poignancy: f64) -> Self {
        self.poignancy = poignancy;
        self
    }

    /// Attach the description's embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the expiry.
    #[must_use]
    pub const fn with_expiration(mut self, expiration: NaiveDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set the evidence back-references.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Vec<NodeId>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Attach a conversation transcript.
    #[must_use]
    pub fn with_transcript(mut self, transcript: Vec<ChatLine>) -> Self {
        self.transcript = Some(transcript);
        self
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persisted form of an [`AssociativeMemory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// All nodes in id order.
    pub nodes: Vec<MemoryNode>,
    /// Embedding cache keyed by description.
    pub embeddings: BTreeMap<String, Vec<f32>>,
}

/// One agent's long-term memory.
#[derive(Debug, Clone, Default)]
pub struct AssociativeMemory {
    nodes: Vec<MemoryNode>,
    events: Vec<NodeId>,
    thoughts: Vec<NodeId>,
    chats: Vec<NodeId>,
    keyword_to_event: BTreeMap<String, Vec<NodeId>>,
    keyword_to_thought: BTreeMap<String, Vec<NodeId>>,
    keyword_to_chat: BTreeMap<String, Vec<NodeId>>,
    keyword_strength_event: BTreeMap<String, u32>,
    keyword_strength_thought: BTreeMap<String, u32>,
    embeddings: BTreeMap<String, Vec<f32>>,
}

impl AssociativeMemory {
    /// An empty store.
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            events: Vec::new(),
            thoughts: Vec::new(),
            chats: Vec::new(),
            keyword_to_event: BTreeMap::new(),
            keyword_to_thought: BTreeMap::new(),
            keyword_to_chat: BTreeMap::new(),
            keyword_strength_event: BTreeMap::new(),
            keyword_strength_thought: BTreeMap::new(),
            embeddings: BTreeMap::new(),
        }
    }

    /// Rebuild a store from its snapshot, checking that ids run 1, 2, 3...
    pub fn from_snapshot(snapshot: MemorySnapshot) -> Result<Self, AgentError> {
        let mut memory = Self::new();
        memory.embeddings = snapshot.embeddings;
        for node in snapshot.nodes {
            let expected = memory.next_id()?;
            if node.id != expected {
                return Err(AgentError::CorruptSnapshot {
                    reason: format!("expected {expected}, found {}", node.id),
                });
            }
            if let Some(missing) = node.evidence.iter().find(|e| **e >= node.id) {
                return Err(AgentError::CorruptSnapshot {
                    reason: format!("{} cites later node {missing}", node.id),
                });
            }
            memory.index(&node);
            memory.nodes.push(node);
        }
        Ok(memory)
    }

    /// Persistable copy of the store.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            nodes: self.nodes.clone(),
            embeddings: self.embeddings.clone(),
        }
    }

    // -------------------------------------------------------------------
    // Appending
    // -------------------------------------------------------------------

    /// Append an event node.
    pub fn add_event(&mut self, memory: NewMemory) -> Result<&MemoryNode, AgentError> {
        self.append(MemoryKind::Event, memory)
    }

    /// Append a thought node. Its depth is one more than the deepest
    /// evidence node.
    pub fn add_thought(&mut self, memory: NewMemory) -> Result<&MemoryNode, AgentError> {
        self.append(MemoryKind::Thought, memory)
    }

    /// Append a chat node.
    pub fn add_chat(&mut self, memory: NewMemory) -> Result<&MemoryNode, AgentError> {
        self.append(MemoryKind::Chat, memory)
    }

    fn next_id(&self) -> Result<NodeId, AgentError> {
        u64::try_from(self.nodes.len())
            .ok()
            .and_then(|n| NodeId(n).next())
            .ok_or(AgentError::IdSpaceExhausted)
    }

    fn append(&mut self, kind: MemoryKind, memory: NewMemory) -> Result<&MemoryNode, AgentError> {
        let id = self.next_id()?;
        for cited in &memory.evidence {
            if self.node(*cited).is_none() {
                return Err(AgentError::UnknownNode(*cited));
            }
        }

        let depth = match kind {
            MemoryKind::Thought => memory
                .evidence
                .iter()
                .filter_map(|e| self.node(*e))
                .map(|n| n.depth)
                .max()
                .map_or(1, |d| d.saturating_add(1)),
            MemoryKind::Event | MemoryKind::Chat => 0,
        };

        if let Some(embedding) = memory.embedding {
            self.embeddings
                .entry(memory.description.clone())
                .or_insert(embedding);
        }

        let node = MemoryNode {
            id,
            kind,
            depth,
            created: memory.created,
            expiration: memory.expiration,
            last_accessed: memory.created,
            triple: memory.triple,
            description: memory.description,
            keywords: memory.keywords.iter().map(|k| k.to_lowercase()).collect(),
            poignancy: memory.poignancy,
            evidence: memory.evidence,
            transcript: memory.transcript,
        };

        debug!(
            node = %id,
            kind = ?kind,
            poignancy = node.poignancy,
            description = %node.description,
            "Memory node added"
        );

        self.index(&node);
        self.nodes.push(node);
        self.nodes.last().ok_or(AgentError::UnknownNode(id))
    }

    fn index(&mut self, node: &MemoryNode) {
        let (sequence, keyword_index, strength) = match node.kind {
            MemoryKind::Event => (
                &mut self.events,
                &mut self.keyword_to_event,
                Some(&mut self.keyword_strength_event),
            ),
            MemoryKind::Thought => (
                &mut self.thoughts,
                &mut self.keyword_to_thought,
                Some(&mut self.keyword_strength_thought),
            ),
            MemoryKind::Chat => (&mut self.chats, &mut self.keyword_to_chat, None),
        };
        sequence.push(node.id);
        for keyword in &node.keywords {
            keyword_index.entry(keyword.clone()).or_default().push(node.id);
        }
        if let Some(strength) = strength
            && !node.is_idle()
        {
            for keyword in &node.keywords {
                let count = strength.entry(keyword.clone()).or_default();
                *count = count.saturating_add(1);
            }
        }
    }

    // -------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------

    /// The node with `id`.
    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        let idx = id.into_inner().checked_sub(1)?;
        self.nodes.get(usize::try_from(idx).ok()?)
    }

    /// Number of nodes of every kind.
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.iter()
    }

    /// Nodes of one kind in creation order.
    pub fn sequence(&self, kind: MemoryKind) -> impl DoubleEndedIterator<Item = &MemoryNode> {
        let ids = match kind {
            MemoryKind::Event => &self.events,
            MemoryKind::Thought => &self.thoughts,
            MemoryKind::Chat => &self.chats,
        };
        ids.iter().filter_map(|id| self.node(*id))
    }

    /// Cached embedding for a description.
    pub fn embedding(&self, key: &str) -> Option<&[f32]> {
        self.embeddings.get(key).map(Vec::as_slice)
    }

    /// Cache an embedding unless one is already known for `key`.
    pub fn cache_embedding(&mut self, key: impl Into<String>, embedding: Vec<f32>) {
        self.embeddings.entry(key.into()).or_insert(embedding);
    }

    /// How often a keyword appeared on non-idle nodes of `kind`.
    pub fn keyword_strength(&self, kind: MemoryKind, keyword: &str) -> u32 {
        let table = match kind {
            MemoryKind::Event => &self.keyword_strength_event,
            MemoryKind::Thought => &self.keyword_strength_thought,
            MemoryKind::Chat => return 0,
        };
        table.get(&keyword.to_lowercase()).copied().unwrap_or(0)
    }

    /// Non-idle nodes of `kind` indexed under the triple's subject or
    /// object, oldest first.
    pub fn retrieve_relevant(&self, kind: MemoryKind, query: &Triple) -> Vec<&MemoryNode> {
        let index = match kind {
            MemoryKind::Event => &self.keyword_to_event,
            MemoryKind::Thought => &self.keyword_to_thought,
            MemoryKind::Chat => &self.keyword_to_chat,
        };
        let ids: BTreeSet<NodeId> = [&query.subject, &query.object]
            .into_iter()
            .filter_map(|token| index.get(&token.to_lowercase()))
            .flatten()
            .copied()
            .collect();
        ids.into_iter()
            .filter_map(|id| self.node(id))
            .filter(|node| !node.is_idle())
            .collect()
    }

    /// Triples of the `n` most recent events, for novelty checks.
    pub fn latest_event_triples(&self, n: usize) -> BTreeSet<Triple> {
        self.sequence(MemoryKind::Event)
            .rev()
            .take(n)
            .map(|node| node.triple.clone())
            .collect()
    }

    /// The most recent chat node indexed under `partner`.
    pub fn last_chat(&self, partner: &str) -> Option<&MemoryNode> {
        self.keyword_to_chat
            .get(&partner.to_lowercase())
            .and_then(|ids| ids.last())
            .and_then(|id| self.node(*id))
    }

    /// Record that retrieval selected `id` at `time`.
    pub fn touch(&mut self, id: NodeId, time: NaiveDateTime) -> Result<(), AgentError> {
        let idx = id
            .into_inner()
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(AgentError::UnknownNode(id))?;
        let node = self.nodes.get_mut(idx).ok_or(AgentError::UnknownNode(id))?;
        node.last_accessed = time;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn event(memory: &mut AssociativeMemory, minute: u32, s: &str, p: &str, o: &str) -> NodeId {
        let triple = Triple::new(s, p, o);
        let description = format!("{s} is {o}");
        memory
            .add_event(NewMemory::new(at(minute), triple, description).with_keywords([s, o]))
            .unwrap()
            .id
    }

    #[test]
    fn ids_are_monotonic_across_kinds() {
        let mut memory = AssociativeMemory::new();
        let a = event(&mut memory, 0, "Isabella", "is", "brewing coffee");
        let b = memory
            .add_thought(NewMemory::new(at(1), Triple::new("Isabella", "plans", "party"), "plan"))
            .unwrap()
            .id;
        let c = event(&mut memory, 2, "Klaus", "is", "reading");
        assert_eq!((a, b, c), (NodeId(1), NodeId(2), NodeId(3)));
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn keyword_index_is_case_insensitive() {
        let mut memory = AssociativeMemory::new();
        event(&mut memory, 0, "Isabella", "is", "brewing coffee");
        let hits = memory.retrieve_relevant(MemoryKind::Event, &Triple::new("isabella", "is", "x"));
        assert_eq!(hits.len(), 1);
        let none = memory.retrieve_relevant(MemoryKind::Thought, &Triple::new("Isabella", "is", "x"));
        assert!(none.is_empty());
    }

    #[test]
    fn idle_nodes_never_retrieved() {
        let mut memory = AssociativeMemory::new();
        event(&mut memory, 0, "bed", "is", "idle");
        event(&mut memory, 1, "bed", "is", "being slept in");
        let hits = memory.retrieve_relevant(MemoryKind::Event, &Triple::new("bed", "is", "idle"));
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|n| !n.is_idle()));
        assert_eq!(memory.keyword_strength(MemoryKind::Event, "bed"), 1);
    }

    #[test]
    fn latest_window_and_last_chat() {
        let mut memory = AssociativeMemory::new();
        for minute in 0..6 {
            event(&mut memory, minute, "Klaus", "is", &format!("step {minute}"));
        }
        let latest = memory.latest_event_triples(5);
        assert_eq!(latest.len(), 5);
        assert!(!latest.contains(&Triple::new("Klaus", "is", "step 0")));

        assert!(memory.last_chat("Maria").is_none());
        let chat = memory
            .add_chat(
                NewMemory::new(at(10), Triple::new("Klaus", "chat with", "Maria"), "talked")
                    .with_keywords(["Maria"])
                    .with_transcript(vec![ChatLine::new("Klaus", "Hi")]),
            )
            .unwrap()
            .id;
        assert_eq!(memory.last_chat("maria").map(|n| n.id), Some(chat));
    }

    #[test]
    fn thought_depth_follows_evidence() {
        let mut memory = AssociativeMemory::new();
        let e = event(&mut memory, 0, "Klaus", "is", "reading");
        let t1 = memory
            .add_thought(
                NewMemory::new(at(1), Triple::new("Klaus", "likes", "books"), "likes books")
                    .with_evidence(vec![e]),
            )
            .unwrap()
            .id;
        let t2 = memory
            .add_thought(
                NewMemory::new(at(2), Triple::new("Klaus", "is", "studious"), "studious")
                    .with_evidence(vec![t1]),
            )
            .unwrap();
        assert_eq!(t2.depth, 2);
        assert!(matches!(
            memory.add_thought(
                NewMemory::new(at(3), Triple::new("a", "b", "c"), "d").with_evidence(vec![NodeId(99)])
            ),
            Err(AgentError::UnknownNode(_))
        ));
    }

    #[test]
    fn embeddings_cached_once_per_description() {
        let mut memory = AssociativeMemory::new();
        let triple = Triple::new("Klaus", "is", "reading");
        memory
            .add_event(NewMemory::new(at(0), triple.clone(), "reading").with_embedding(vec![1.0]))
            .unwrap();
        memory
            .add_event(NewMemory::new(at(1), triple, "reading").with_embedding(vec![2.0]))
            .unwrap();
        assert_eq!(memory.embedding("reading"), Some(&[1.0_f32][..]));
    }

    #[test]
    fn snapshot_preserves_ids_and_indexes() {
        let mut memory = AssociativeMemory::new();
        event(&mut memory, 0, "Isabella", "is", "brewing coffee");
        event(&mut memory, 1, "Klaus", "is", "reading");
        memory.touch(NodeId(1), at(30)).unwrap();

        let json = serde_json::to_string(&memory.snapshot()).unwrap();
        let restored =
            AssociativeMemory::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.node(NodeId(1)).unwrap().last_accessed, at(30));
        assert_eq!(
            restored
                .retrieve_relevant(MemoryKind::Event, &Triple::new("Klaus", "", ""))
                .len(),
            1
        );
    }

    #[test]
    fn snapshot_with_gap_is_rejected() {
        let mut memory = AssociativeMemory::new();
        event(&mut memory, 0, "Isabella", "is", "brewing coffee");
        let mut snapshot = memory.snapshot();
        if let Some(node) = snapshot.nodes.first_mut() {
            node.id = NodeId(5);
        }
        assert!(matches!(
            AssociativeMemory::from_snapshot(snapshot),
            Err(AgentError::CorruptSnapshot { .. })
        ));
    }
}
