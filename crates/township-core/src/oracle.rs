//! Cognition and embedding oracles.
//!
//! Everything an agent decides in natural language (what to do next, where,
//! whether to talk, what was said) comes from a [`CognitionOracle`]; every
//! vector used for relevance scoring comes from an [`EmbeddingOracle`]. Both
//! are opaque, may fail, and may return garbage. The rest of the simulation
//! never calls them directly: it goes through an [`OracleGuard`], which
//!
//! 1. checks each answer against the request it was given,
//! 2. retries up to a fixed number of attempts,
//! 3. then substitutes the request's fixed fallback answer and logs it.
//!
//! A tick therefore never stalls or aborts on an oracle fault.

use serde::{Deserialize, Serialize};
use township_types::{ChatLine, MemoryKind, ScheduleEntry, Triple};
use tracing::{debug, warn};

/// Text embedded in place of an empty string.
pub const EMPTY_TEXT_SENTINEL: &str = "blank";

/// Errors an oracle may report for a single call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The backend could not be reached or timed out.
    #[error("oracle unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The backend answered with something unusable.
    #[error("malformed oracle answer to {request}: {reason}")]
    Malformed {
        /// Kind of request that was answered.
        request: &'static str,
        /// What was wrong with the answer.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// One question put to the cognition oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CognitionRequest {
    /// Hour (0-23) at which the agent gets up today.
    WakeUpHour {
        /// Agent name.
        agent: String,
        /// Identity paragraph.
        identity: String,
        /// Daily habits.
        lifestyle: String,
    },
    /// Broad goals for today.
    DailyGoals {
        /// Agent name.
        agent: String,
        /// Identity paragraph.
        identity: String,
        /// Today's date, e.g. "Monday February 13".
        date: String,
        /// Hour the agent woke up.
        wake_up_hour: u32,
    },
    /// Today's plan in roughly hour-sized blocks.
    HourlySchedule {
        /// Agent name.
        agent: String,
        /// Identity paragraph.
        identity: String,
        /// Today's date.
        date: String,
        /// Hour the agent woke up.
        wake_up_hour: u32,
        /// Today's goals.
        goals: Vec<String>,
    },
    /// Break a task into minute-level subtasks.
    TaskDecomposition {
        /// Agent name.
        agent: String,
        /// Identity paragraph.
        identity: String,
        /// Task to break down.
        task: String,
        /// Minutes the subtasks must fill.
        minutes: u32,
    },
    /// Sector in which a task happens.
    ActionSector {
        /// Agent name.
        agent: String,
        /// Task being placed.
        task: String,
        /// Sector the agent stands in.
        current_sector: Option<String>,
        /// Address of the agent's home arena.
        living_area: String,
        /// Known sectors.
        options: Vec<String>,
    },
    /// Arena within the chosen sector.
    ActionArena {
        /// Agent name.
        agent: String,
        /// Task being placed.
        task: String,
        /// Chosen sector.
        sector: String,
        /// Known arenas of the sector.
        options: Vec<String>,
    },
    /// Game object within the chosen arena.
    ActionObject {
        /// Agent name.
        agent: String,
        /// Task being placed.
        task: String,
        /// Chosen arena.
        arena: String,
        /// Known objects of the arena.
        options: Vec<String>,
    },
    /// Emoji rendering of an action.
    Pronunciation {
        /// Action description.
        description: String,
    },
    /// Subject-predicate-object form of an action.
    EventTriple {
        /// Agent name; must be the subject.
        agent: String,
        /// Action description.
        description: String,
    },
    /// What happens to an object while an agent uses it.
    ObjectState {
        /// Object name.
        object: String,
        /// Agent name.
        agent: String,
        /// Task being performed.
        task: String,
    },
    /// Importance of a new memory, 1 (mundane) to 10 (poignant).
    Poignancy {
        /// Agent name.
        agent: String,
        /// Kind of memory being scored.
        memory: MemoryKind,
        /// Memory description.
        description: String,
    },
    /// Whether the agent starts a conversation.
    DecideToTalk {
        /// Agent name.
        agent: String,
        /// Potential partner.
        partner: String,
        /// What the agent is doing.
        agent_action: String,
        /// What the partner is doing.
        partner_action: String,
        /// Related memories.
        context: Vec<String>,
    },
    /// Whether the agent waits for the partner to finish.
    DecideToReact {
        /// Agent name.
        agent: String,
        /// Agent being reacted to.
        partner: String,
        /// What the agent is doing.
        agent_action: String,
        /// What the partner is doing.
        partner_action: String,
        /// Related memories.
        context: Vec<String>,
    },
    /// A whole conversation between two agents.
    Conversation {
        /// Initiating agent.
        agent: String,
        /// Other participant.
        partner: String,
        /// Initiator's identity paragraph.
        agent_identity: String,
        /// Partner's identity paragraph.
        partner_identity: String,
        /// Where the conversation happens.
        location: String,
        /// Related memories of the initiator.
        context: Vec<String>,
        /// Related memories of the partner.
        partner_context: Vec<String>,
    },
    /// How the agent sees its relationship with another agent.
    RelationshipSummary {
        /// Agent name.
        agent: String,
        /// The other agent.
        partner: String,
        /// Memories about the other agent, best first.
        statements: Vec<String>,
    },
    /// One-line summary of a conversation.
    ConversationSummary {
        /// Agent name.
        agent: String,
        /// Other participant.
        partner: String,
        /// What was said.
        transcript: Vec<ChatLine>,
    },
    /// Re-plan the rest of a schedule window after a reaction.
    ReviseWindow {
        /// Agent name.
        agent: String,
        /// Entries being replaced.
        original: Vec<ScheduleEntry>,
        /// Completed part of the window.
        prefix: Vec<ScheduleEntry>,
        /// The reaction inserted after the prefix.
        inserted: ScheduleEntry,
        /// Minutes the revision must fill.
        remaining_minutes: u32,
    },
    /// High-level questions to reflect on.
    FocalPoints {
        /// Agent name.
        agent: String,
        /// Recent memory descriptions.
        statements: Vec<String>,
        /// How many questions to ask.
        count: usize,
    },
    /// Insights drawn from numbered statements.
    Insights {
        /// Agent name.
        agent: String,
        /// Numbered memory descriptions.
        statements: Vec<String>,
        /// How many insights to produce.
        count: usize,
    },
    /// Planning note and memo after a conversation ends.
    ConversationNotes {
        /// Agent name.
        agent: String,
        /// Other participant.
        partner: String,
        /// What was said.
        transcript: Vec<ChatLine>,
    },
    /// What to remember while planning a new day, and how recent days felt.
    /// Answered with [`CognitionResponse::Notes`].
    IdentityNotes {
        /// Agent name.
        agent: String,
        /// The day being planned.
        date: String,
        /// Dated memory descriptions about plans and recent events.
        statements: Vec<String>,
    },
    /// The agent's status line for a new day.
    CurrentStatus {
        /// Agent name.
        agent: String,
        /// The day starting.
        date: String,
        /// Yesterday's status line.
        previous: String,
        /// Notes taken while revising the day.
        notes: Vec<String>,
    },
}

/// One insight with the statement indices supporting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    /// The insight itself.
    pub thought: String,
    /// Indices into the request's statements.
    pub evidence: Vec<usize>,
}

/// An answer from the cognition oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CognitionResponse {
    /// An hour of the day.
    Hour(u32),
    /// Free-form lines.
    Lines(Vec<String>),
    /// Tasks with durations in minutes.
    Schedule(Vec<ScheduleEntry>),
    /// One of the offered options.
    Choice(String),
    /// A short text.
    Text(String),
    /// An event triple.
    Triple(Triple),
    /// An importance score.
    Score(u8),
    /// Yes or no.
    Decision(bool),
    /// A conversation.
    Transcript(Vec<ChatLine>),
    /// Insights with evidence.
    Insights(Vec<Insight>),
    /// Post-conversation notes.
    Notes {
        /// What to keep in mind when planning.
        planning: String,
        /// What was interesting about the conversation.
        memo: String,
    },
}

impl CognitionResponse {
    /// The hour, if this is an [`Hour`](Self::Hour).
    pub fn into_hour(self) -> Option<u32> {
        match self {
            Self::Hour(h) => Some(h),
            _ => None,
        }
    }

    /// The lines, if this is [`Lines`](Self::Lines).
    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            Self::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    /// The entries, if this is a [`Schedule`](Self::Schedule).
    pub fn into_schedule(self) -> Option<Vec<ScheduleEntry>> {
        match self {
            Self::Schedule(entries) => Some(entries),
            _ => None,
        }
    }

    /// The text of a [`Choice`](Self::Choice) or [`Text`](Self::Text).
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Choice(text) | Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The triple, if this is a [`Triple`](Self::Triple).
    pub fn into_triple(self) -> Option<Triple> {
        match self {
            Self::Triple(triple) => Some(triple),
            _ => None,
        }
    }

    /// The score, if this is a [`Score`](Self::Score).
    pub fn into_score(self) -> Option<u8> {
        match self {
            Self::Score(score) => Some(score),
            _ => None,
        }
    }

    /// The decision, if this is a [`Decision`](Self::Decision).
    pub fn into_decision(self) -> Option<bool> {
        match self {
            Self::Decision(yes) => Some(yes),
            _ => None,
        }
    }

    /// The lines said, if this is a [`Transcript`](Self::Transcript).
    pub fn into_transcript(self) -> Option<Vec<ChatLine>> {
        match self {
            Self::Transcript(lines) => Some(lines),
            _ => None,
        }
    }

    /// The insights, if this is [`Insights`](Self::Insights).
    pub fn into_insights(self) -> Option<Vec<Insight>> {
        match self {
            Self::Insights(insights) => Some(insights),
            _ => None,
        }
    }

    /// The planning note and memo, if this is [`Notes`](Self::Notes).
    pub fn into_notes(self) -> Option<(String, String)> {
        match self {
            Self::Notes { planning, memo } => Some((planning, memo)),
            _ => None,
        }
    }

    const fn variant(&self) -> &'static str {
        match self {
            Self::Hour(_) => "hour",
            Self::Lines(_) => "lines",
            Self::Schedule(_) => "schedule",
            Self::Choice(_) => "choice",
            Self::Text(_) => "text",
            Self::Triple(_) => "triple",
            Self::Score(_) => "score",
            Self::Decision(_) => "decision",
            Self::Transcript(_) => "transcript",
            Self::Insights(_) => "insights",
            Self::Notes { .. } => "notes",
        }
    }
}

/// Wake-up hour used when the oracle gives none.
pub const FALLBACK_WAKE_UP_HOUR: u32 = 8;
/// Poignancy used when the oracle gives none.
pub const FALLBACK_POIGNANCY: u8 = 4;
/// Pronunciation used when the oracle gives none.
pub const FALLBACK_PRONUNCIATION: &str = "🙂";

fn non_empty(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        Err("empty text".to_owned())
    } else {
        Ok(())
    }
}

fn positive_entries(entries: &[ScheduleEntry]) -> Result<(), String> {
    if entries.is_empty() {
        return Err("no entries".to_owned());
    }
    if let Some(bad) = entries.iter().find(|e| e.minutes == 0 || e.task.trim().is_empty()) {
        return Err(format!("bad entry {bad:?}"));
    }
    Ok(())
}

impl CognitionRequest {
    /// Short name of the request kind, for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WakeUpHour { .. } => "wake_up_hour",
            Self::DailyGoals { .. } => "daily_goals",
            Self::HourlySchedule { .. } => "hourly_schedule",
            Self::TaskDecomposition { .. } => "task_decomposition",
            Self::ActionSector { .. } => "action_sector",
            Self::ActionArena { .. } => "action_arena",
            Self::ActionObject { .. } => "action_object",
            Self::Pronunciation { .. } => "pronunciation",
            Self::EventTriple { .. } => "event_triple",
            Self::ObjectState { .. } => "object_state",
            Self::Poignancy { .. } => "poignancy",
            Self::DecideToTalk { .. } => "decide_to_talk",
            Self::DecideToReact { .. } => "decide_to_react",
            Self::Conversation { .. } => "conversation",
            Self::ConversationSummary { .. } => "conversation_summary",
            Self::ReviseWindow { .. } => "revise_window",
            Self::FocalPoints { .. } => "focal_points",
            Self::Insights { .. } => "insights",
            Self::ConversationNotes { .. } => "conversation_notes",
            Self::RelationshipSummary { .. } => "relationship_summary",
            Self::IdentityNotes { .. } => "identity_notes",
            Self::CurrentStatus { .. } => "current_status",
        }
    }

    /// Check that `response` is a usable answer to this request.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self, response: &CognitionResponse) -> Result<(), String> {
        use CognitionResponse as R;

        match (self, response) {
            (Self::WakeUpHour { .. }, R::Hour(hour)) => {
                if *hour < 24 {
                    Ok(())
                } else {
                    Err(format!("hour {hour} out of range"))
                }
            }
            (Self::DailyGoals { .. } | Self::FocalPoints { .. }, R::Lines(lines)) => {
                if lines.is_empty() {
                    return Err("no lines".to_owned());
                }
                lines.iter().try_for_each(|line| non_empty(line))
            }
            (
                Self::HourlySchedule { .. } | Self::TaskDecomposition { .. },
                R::Schedule(entries),
            ) => positive_entries(entries),
            (
                Self::ReviseWindow {
                    remaining_minutes, ..
                },
                R::Schedule(entries),
            ) => {
                positive_entries(entries)?;
                let total = township_agents::schedule::total_minutes(entries);
                if total == *remaining_minutes {
                    Ok(())
                } else {
                    Err(format!("revision fills {total} of {remaining_minutes} minutes"))
                }
            }
            (
                Self::ActionSector { options, .. }
                | Self::ActionArena { options, .. }
                | Self::ActionObject { options, .. },
                R::Choice(choice),
            ) => {
                if options.iter().any(|o| o == choice) {
                    Ok(())
                } else {
                    Err(format!("{choice:?} is not one of {options:?}"))
                }
            }
            (
                Self::Pronunciation { .. }
                | Self::ObjectState { .. }
                | Self::ConversationSummary { .. }
                | Self::RelationshipSummary { .. }
                | Self::CurrentStatus { .. },
                R::Text(text),
            ) => non_empty(text),
            (Self::EventTriple { agent, .. }, R::Triple(triple)) => {
                if triple.subject != *agent {
                    return Err(format!("subject {} is not {agent}", triple.subject));
                }
                non_empty(&triple.predicate)?;
                non_empty(&triple.object)
            }
            (Self::Poignancy { .. }, R::Score(score)) => {
                if (1..=10).contains(score) {
                    Ok(())
                } else {
                    Err(format!("score {score} outside 1..=10"))
                }
            }
            (Self::DecideToTalk { .. } | Self::DecideToReact { .. }, R::Decision(_)) => Ok(()),
            (Self::Conversation { agent, partner, .. }, R::Transcript(lines)) => {
                if lines.is_empty() {
                    return Err("empty conversation".to_owned());
                }
                if let Some(line) = lines
                    .iter()
                    .find(|l| l.speaker != *agent && l.speaker != *partner)
                {
                    return Err(format!("unknown speaker {}", line.speaker));
                }
                lines.iter().try_for_each(|l| non_empty(&l.utterance))
            }
            (Self::Insights { statements, .. }, R::Insights(insights)) => {
                for insight in insights {
                    non_empty(&insight.thought)?;
                    if let Some(bad) = insight.evidence.iter().find(|i| **i >= statements.len()) {
                        return Err(format!("evidence index {bad} out of range"));
                    }
                }
                Ok(())
            }
            (
                Self::ConversationNotes { .. } | Self::IdentityNotes { .. },
                R::Notes { planning, memo },
            ) => {
                non_empty(planning)?;
                non_empty(memo)
            }
            (request, response) => Err(format!(
                "{} cannot answer {}",
                response.variant(),
                request.kind()
            )),
        }
    }

    /// The fixed answer used once retries are exhausted.
    pub fn fallback(&self) -> CognitionResponse {
        use CognitionResponse as R;

        match self {
            Self::WakeUpHour { .. } => R::Hour(FALLBACK_WAKE_UP_HOUR),
            Self::DailyGoals { wake_up_hour, .. } => R::Lines(vec![format!(
                "wake up and complete the morning routine at {wake_up_hour}:00"
            )]),
            Self::HourlySchedule { wake_up_hour, .. } => {
                let asleep = wake_up_hour.saturating_mul(60);
                let mut entries = Vec::with_capacity(2);
                if asleep > 0 {
                    entries.push(ScheduleEntry::new("sleeping", asleep));
                }
                entries.push(ScheduleEntry::new(
                    "going about the day",
                    township_types::time::MINUTES_PER_DAY.saturating_sub(asleep),
                ));
                R::Schedule(entries)
            }
            Self::TaskDecomposition { task, minutes, .. } => {
                R::Schedule(vec![ScheduleEntry::new(task.clone(), *minutes)])
            }
            Self::ActionSector {
                current_sector,
                options,
                ..
            } => R::Choice(
                current_sector
                    .as_ref()
                    .filter(|s| options.contains(s))
                    .or_else(|| options.first())
                    .cloned()
                    .unwrap_or_default(),
            ),
            Self::ActionArena { options, .. } | Self::ActionObject { options, .. } => {
                R::Choice(options.first().cloned().unwrap_or_default())
            }
            Self::Pronunciation { .. } => R::Text(FALLBACK_PRONUNCIATION.to_owned()),
            Self::EventTriple { agent, description } => {
                R::Triple(Triple::new(agent.clone(), "is", description.clone()))
            }
            Self::ObjectState { .. } => R::Text("in use".to_owned()),
            Self::Poignancy { .. } => R::Score(FALLBACK_POIGNANCY),
            Self::DecideToTalk { .. } | Self::DecideToReact { .. } => R::Decision(false),
            Self::Conversation { .. } => R::Transcript(Vec::new()),
            Self::ConversationSummary { partner, .. } => {
                R::Text(format!("conversing with {partner}"))
            }
            Self::ReviseWindow { .. } => R::Schedule(Vec::new()),
            Self::FocalPoints {
                statements, count, ..
            } => R::Lines(
                statements
                    .iter()
                    .rev()
                    .take(*count)
                    .rev()
                    .cloned()
                    .collect(),
            ),
            Self::Insights { .. } => R::Insights(Vec::new()),
            Self::ConversationNotes { .. } | Self::IdentityNotes { .. } => R::Notes {
                planning: String::new(),
                memo: String::new(),
            },
            Self::RelationshipSummary { agent, partner, .. } => {
                R::Text(format!("{agent} is acquainted with {partner}"))
            }
            Self::CurrentStatus { previous, .. } => R::Text(previous.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle traits
// ---------------------------------------------------------------------------

/// A source of natural-language decisions.
///
/// Implementations may be a language-model client, a scripted bot, or a
/// test stub. Answers are checked by [`OracleGuard`], so implementations
/// need not validate their own output.
pub trait CognitionOracle: Send {
    /// Answer one request.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if no answer could be produced.
    fn generate(&mut self, request: &CognitionRequest) -> Result<CognitionResponse, OracleError>;
}

/// A source of text embeddings.
pub trait EmbeddingOracle: Send {
    /// Embed `text` as a fixed-length vector.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if no vector could be produced.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, OracleError>;
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Call counters kept by an [`OracleGuard`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    /// Attempts made, including retries.
    pub attempts: u64,
    /// Attempts that errored or were rejected.
    pub failures: u64,
    /// Requests answered with the fallback.
    pub fallbacks: u64,
}

/// Validating, retrying front for both oracles.
pub struct OracleGuard {
    cognition: Box<dyn CognitionOracle>,
    embedding: Box<dyn EmbeddingOracle>,
    max_attempts: u32,
    stats: OracleStats,
}

impl std::fmt::Debug for OracleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleGuard")
            .field("max_attempts", &self.max_attempts)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl OracleGuard {
    /// Wrap two oracles. `max_attempts` below 1 is treated as 1.
    pub fn new(
        cognition: Box<dyn CognitionOracle>,
        embedding: Box<dyn EmbeddingOracle>,
        max_attempts: u32,
    ) -> Self {
        Self {
            cognition,
            embedding,
            max_attempts: max_attempts.max(1),
            stats: OracleStats::default(),
        }
    }

    /// Counters since creation.
    pub const fn stats(&self) -> OracleStats {
        self.stats
    }

    fn record_attempt(&mut self) {
        self.stats.attempts = self.stats.attempts.saturating_add(1);
    }

    fn record_failure(&mut self) {
        self.stats.failures = self.stats.failures.saturating_add(1);
    }

    fn record_fallback(&mut self) {
        self.stats.fallbacks = self.stats.fallbacks.saturating_add(1);
    }

    /// A valid answer to `request`: the oracle's, or the fallback.
    pub fn ask(&mut self, request: &CognitionRequest) -> CognitionResponse {
        for attempt in 1..=self.max_attempts {
            self.record_attempt();
            match self.cognition.generate(request) {
                Ok(response) => match request.validate(&response) {
                    Ok(()) => return response,
                    Err(reason) => {
                        self.record_failure();
                        debug!(
                            request = request.kind(),
                            attempt,
                            reason = %reason,
                            "Rejected oracle answer"
                        );
                    }
                },
                Err(e) => {
                    self.record_failure();
                    debug!(request = request.kind(), attempt, error = %e, "Oracle call failed");
                }
            }
        }
        self.record_fallback();
        warn!(
            request = request.kind(),
            attempts = self.max_attempts,
            "Oracle retries exhausted, using fallback"
        );
        request.fallback()
    }

    /// Embedding of `text`. Empty text is embedded as the sentinel; when
    /// every attempt fails the result is empty, which scores zero relevance.
    pub fn embed(&mut self, text: &str) -> Vec<f32> {
        let input = if text.trim().is_empty() {
            EMPTY_TEXT_SENTINEL
        } else {
            text
        };
        for attempt in 1..=self.max_attempts {
            self.record_attempt();
            match self.embedding.embed(input) {
                Ok(vector) if !vector.is_empty() => return vector,
                Ok(_) => {
                    self.record_failure();
                    debug!(attempt, "Empty embedding rejected");
                }
                Err(e) => {
                    self.record_failure();
                    debug!(attempt, error = %e, "Embedding call failed");
                }
            }
        }
        self.record_fallback();
        warn!(text = %input, "Embedding retries exhausted, relevance will score zero");
        Vec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stub::{HashEmbedding, StubCognition};

    /// Fails a fixed number of times, then answers with `answer`.
    struct Flaky {
        failures_left: u32,
        answer: CognitionResponse,
    }

    impl CognitionOracle for Flaky {
        fn generate(&mut self, _: &CognitionRequest) -> Result<CognitionResponse, OracleError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(OracleError::Unavailable {
                    reason: "timeout".to_owned(),
                });
            }
            Ok(self.answer.clone())
        }
    }

    struct Broken;

    impl EmbeddingOracle for Broken {
        fn embed(&mut self, _: &str) -> Result<Vec<f32>, OracleError> {
            Err(OracleError::Unavailable {
                reason: "down".to_owned(),
            })
        }
    }

    /// Records what it was asked to embed.
    struct Echo(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl EmbeddingOracle for Echo {
        fn embed(&mut self, text: &str) -> Result<Vec<f32>, OracleError> {
            self.0.lock().unwrap().push(text.to_owned());
            Ok(vec![1.0])
        }
    }

    fn poignancy() -> CognitionRequest {
        CognitionRequest::Poignancy {
            agent: "Klaus".to_owned(),
            memory: MemoryKind::Event,
            description: "the stove is on fire".to_owned(),
        }
    }

    #[test]
    fn retries_then_succeeds() {
        let mut guard = OracleGuard::new(
            Box::new(Flaky {
                failures_left: 2,
                answer: CognitionResponse::Score(9),
            }),
            Box::new(HashEmbedding::new(8)),
            3,
        );
        assert_eq!(guard.ask(&poignancy()), CognitionResponse::Score(9));
        assert_eq!(guard.stats().attempts, 3);
        assert_eq!(guard.stats().fallbacks, 0);
    }

    #[test]
    fn exhausted_retries_use_fallback() {
        let mut guard = OracleGuard::new(
            Box::new(Flaky {
                failures_left: 5,
                answer: CognitionResponse::Score(9),
            }),
            Box::new(HashEmbedding::new(8)),
            3,
        );
        assert_eq!(
            guard.ask(&poignancy()).into_score(),
            Some(FALLBACK_POIGNANCY)
        );
        assert_eq!(guard.stats().fallbacks, 1);
    }

    #[test]
    fn invalid_answers_are_rejected() {
        let mut guard = OracleGuard::new(
            Box::new(Flaky {
                failures_left: 0,
                answer: CognitionResponse::Score(11),
            }),
            Box::new(HashEmbedding::new(8)),
            2,
        );
        assert_eq!(guard.ask(&poignancy()), CognitionResponse::Score(FALLBACK_POIGNANCY));
        assert_eq!(guard.stats().failures, 2);

        let wrong_kind = CognitionRequest::WakeUpHour {
            agent: "Klaus".to_owned(),
            identity: String::new(),
            lifestyle: String::new(),
        };
        assert!(wrong_kind.validate(&CognitionResponse::Score(3)).is_err());
    }

    #[test]
    fn choice_must_be_an_offered_option() {
        let request = CognitionRequest::ActionArena {
            agent: "Klaus".to_owned(),
            task: "brewing coffee".to_owned(),
            sector: "hobbs cafe".to_owned(),
            options: vec!["cafe".to_owned()],
        };
        assert!(request.validate(&CognitionResponse::Choice("kitchen".to_owned())).is_err());
        assert!(request.validate(&CognitionResponse::Choice("cafe".to_owned())).is_ok());
        assert_eq!(request.fallback(), CognitionResponse::Choice("cafe".to_owned()));
    }

    #[test]
    fn revision_must_fill_the_window() {
        let request = CognitionRequest::ReviseWindow {
            agent: "Klaus".to_owned(),
            original: Vec::new(),
            prefix: Vec::new(),
            inserted: ScheduleEntry::new("chat", 10),
            remaining_minutes: 50,
        };
        let short = CognitionResponse::Schedule(vec![ScheduleEntry::new("work", 40)]);
        let exact = CognitionResponse::Schedule(vec![
            ScheduleEntry::new("work", 40),
            ScheduleEntry::new("tidy up", 10),
        ]);
        assert!(request.validate(&short).is_err());
        assert!(request.validate(&exact).is_ok());
    }

    #[test]
    fn fallback_schedule_fills_a_day() {
        let request = CognitionRequest::HourlySchedule {
            agent: "Klaus".to_owned(),
            identity: String::new(),
            date: "Monday February 13".to_owned(),
            wake_up_hour: 7,
            goals: Vec::new(),
        };
        let entries = request.fallback().into_schedule().unwrap();
        assert_eq!(
            township_agents::schedule::total_minutes(&entries),
            township_types::time::MINUTES_PER_DAY
        );
        assert!(request.validate(&request.fallback()).is_ok());
    }

    #[test]
    fn empty_text_embeds_sentinel() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut guard = OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(Echo(std::sync::Arc::clone(&seen))),
            1,
        );
        let _ = guard.embed("  ");
        assert_eq!(seen.lock().unwrap().as_slice(), [EMPTY_TEXT_SENTINEL]);
    }

    #[test]
    fn failed_embedding_is_empty() {
        let mut guard = OracleGuard::new(Box::new(StubCognition::new()), Box::new(Broken), 2);
        assert!(guard.embed("coffee").is_empty());
        assert_eq!(guard.stats().fallbacks, 1);
    }

    #[test]
    fn status_fallback_keeps_yesterday() {
        let request = CognitionRequest::CurrentStatus {
            agent: "Klaus".to_owned(),
            date: "Tuesday February 14".to_owned(),
            previous: "Klaus is writing a paper".to_owned(),
            notes: Vec::new(),
        };
        assert_eq!(request.fallback().into_text().as_deref(), Some("Klaus is writing a paper"));
        assert!(request.validate(&CognitionResponse::Text("  ".to_owned())).is_err());

        let notes = CognitionRequest::IdentityNotes {
            agent: "Klaus".to_owned(),
            date: "Tuesday February 14".to_owned(),
            statements: Vec::new(),
        };
        assert!(notes.validate(&CognitionResponse::Text("plan".to_owned())).is_err());
        assert_eq!(notes.fallback().into_notes(), Some((String::new(), String::new())));
    }

    #[test]
    fn requests_serialize_with_kind_tag() {
        let json = serde_json::to_value(poignancy()).unwrap();
        assert_eq!(json["kind"], "poignancy");
        assert_eq!(json["memory"], "event");
    }
}
