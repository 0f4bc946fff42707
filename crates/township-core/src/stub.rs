//! Deterministic offline oracles.
//!
//! [`StubCognition`] answers every request with simple keyword rules so the
//! whole tick cycle can run end-to-end without a language model, and
//! [`HashEmbedding`] turns text into a bag-of-words vector by hashing
//! tokens. Both are reproducible: the same inputs always give the same
//! answers.

use township_types::time::MINUTES_PER_DAY;
use township_types::{ChatLine, ScheduleEntry, Triple};

use crate::oracle::{
    CognitionOracle, CognitionRequest, CognitionResponse, EmbeddingOracle, Insight, OracleError,
};

/// Task hints mapped to words that should appear in a chosen location.
const LOCATION_HINTS: &[(&str, &[&str])] = &[
    ("sleep", &["house", "bedroom", "bed"]),
    ("bed", &["house", "bedroom", "bed"]),
    ("wak", &["house", "bedroom", "bed"]),
    ("getting ready", &["house", "bedroom", "desk"]),
    ("breakfast", &["house", "kitchen", "stove", "refrigerator"]),
    ("dinner", &["house", "kitchen", "stove", "refrigerator"]),
    ("cook", &["house", "kitchen", "stove"]),
    ("coffee", &["cafe", "coffee machine", "counter"]),
    ("lunch", &["cafe", "cafe table", "counter"]),
    ("read", &["library", "reading room", "bookshelf", "reading desk"]),
    ("stud", &["library", "reading room", "reading desk"]),
    ("book", &["library", "reading room", "bookshelf"]),
    ("walk", &["park", "garden", "fountain", "bench"]),
    ("relax", &["park", "garden", "bench"]),
    ("work", &["desk", "counter", "reading desk"]),
];

/// Task keywords mapped to an emoji.
const EMOJI_HINTS: &[(&str, &str)] = &[
    ("sleep", "😴"),
    ("coffee", "☕"),
    ("breakfast", "🍳"),
    ("lunch", "🍽️"),
    ("dinner", "🍽️"),
    ("read", "📖"),
    ("book", "📖"),
    ("walk", "🚶"),
    ("work", "💼"),
    ("conversing", "💬"),
    ("chat", "💬"),
    ("waiting", "⌛"),
];

/// The fixed day the stub plans after waking up.
const DAY_PLAN: &[(&str, u32)] = &[
    ("waking up and getting ready", 60),
    ("having breakfast", 60),
    ("working", 180),
    ("having lunch", 60),
    ("working", 180),
    ("taking a walk in the park", 60),
    ("reading a book", 120),
    ("having dinner", 60),
];

/// Rule-based cognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubCognition {
    /// Hour every agent wakes up.
    pub wake_up_hour: u32,
    /// Whether agents agree to start conversations.
    pub sociable: bool,
    /// Whether agents agree to wait for each other.
    pub patient: bool,
}

impl Default for StubCognition {
    fn default() -> Self {
        Self::new()
    }
}

impl StubCognition {
    /// Sociable, patient agents that wake at 7.
    pub const fn new() -> Self {
        Self {
            wake_up_hour: 7,
            sociable: true,
            patient: true,
        }
    }

    /// Agents that never chat or wait.
    pub const fn reserved() -> Self {
        Self {
            wake_up_hour: 7,
            sociable: false,
            patient: false,
        }
    }

    fn hourly_schedule(wake_up_hour: u32) -> Vec<ScheduleEntry> {
        let asleep = wake_up_hour.min(23).saturating_mul(60);
        let mut entries = Vec::with_capacity(DAY_PLAN.len().saturating_add(2));
        if asleep > 0 {
            entries.push(ScheduleEntry::new("sleeping", asleep));
        }
        let mut used = asleep;
        for (task, minutes) in DAY_PLAN {
            let left = MINUTES_PER_DAY.saturating_sub(used);
            if left == 0 {
                break;
            }
            let minutes = (*minutes).min(left);
            entries.push(ScheduleEntry::new(*task, minutes));
            used = used.saturating_add(minutes);
        }
        let left = MINUTES_PER_DAY.saturating_sub(used);
        if left > 0 {
            entries.push(ScheduleEntry::new("sleeping", left));
        }
        entries
    }

    fn decompose(task: &str, minutes: u32) -> Vec<ScheduleEntry> {
        if minutes < 3 {
            return vec![ScheduleEntry::new(task, minutes.max(1))];
        }
        let third = minutes / 3;
        let last = minutes.saturating_sub(third.saturating_mul(2));
        vec![
            ScheduleEntry::new("getting started", third),
            ScheduleEntry::new(task, third),
            ScheduleEntry::new("wrapping up", last),
        ]
    }

    /// The option whose name best matches the task's location hints.
    fn pick(task: &str, options: &[String], preferred: Option<&str>) -> String {
        let task = task.to_lowercase();
        let hinted = LOCATION_HINTS
            .iter()
            .filter(|(keyword, _)| task.contains(*keyword))
            .flat_map(|(_, hints)| hints.iter())
            .find_map(|hint| options.iter().find(|o| o.contains(*hint)));
        hinted
            .or_else(|| preferred.and_then(|p| options.iter().find(|o| o.as_str() == p)))
            .or_else(|| options.first())
            .cloned()
            .unwrap_or_default()
    }

    fn emoji(description: &str) -> String {
        let description = description.to_lowercase();
        EMOJI_HINTS
            .iter()
            .find(|(keyword, _)| description.contains(*keyword))
            .map_or("🙂", |(_, emoji)| *emoji)
            .to_owned()
    }

    fn first_name(name: &str) -> &str {
        name.split_whitespace().next().unwrap_or(name)
    }
}

impl CognitionOracle for StubCognition {
    fn generate(&mut self, request: &CognitionRequest) -> Result<CognitionResponse, OracleError> {
        use CognitionResponse as R;

        let response = match request {
            CognitionRequest::WakeUpHour { .. } => R::Hour(self.wake_up_hour),
            CognitionRequest::DailyGoals { wake_up_hour, .. } => R::Lines(vec![
                format!("wake up at {wake_up_hour}:00 and get ready"),
                "get some work done".to_owned(),
                "take a walk in the park".to_owned(),
            ]),
            CognitionRequest::HourlySchedule { wake_up_hour, .. } => {
                R::Schedule(Self::hourly_schedule(*wake_up_hour))
            }
            CognitionRequest::TaskDecomposition { task, minutes, .. } => {
                R::Schedule(Self::decompose(task, *minutes))
            }
            CognitionRequest::ActionSector {
                task,
                current_sector,
                living_area,
                options,
                ..
            } => {
                let home = living_area.split(':').nth(1);
                let home_task = ["sleep", "bed", "wak"]
                    .iter()
                    .any(|k| task.to_lowercase().contains(k));
                let preferred = if home_task { home } else { current_sector.as_deref() };
                R::Choice(Self::pick(task, options, preferred))
            }
            CognitionRequest::ActionArena { task, options, .. }
            | CognitionRequest::ActionObject { task, options, .. } => {
                R::Choice(Self::pick(task, options, None))
            }
            CognitionRequest::Pronunciation { description } => R::Text(Self::emoji(description)),
            CognitionRequest::EventTriple { agent, description } => {
                R::Triple(Triple::new(agent.clone(), "is", description.clone()))
            }
            CognitionRequest::ObjectState { task, .. } => R::Text(format!("being used for {task}")),
            CognitionRequest::Poignancy { description, .. } => {
                let description = description.to_lowercase();
                let score = if description.contains("sleep") || description.contains("idle") {
                    1
                } else if description.contains("convers") || description.contains("chat") {
                    5
                } else {
                    3
                };
                R::Score(score)
            }
            CognitionRequest::DecideToTalk { .. } => R::Decision(self.sociable),
            CognitionRequest::DecideToReact { .. } => R::Decision(self.patient),
            CognitionRequest::Conversation {
                agent, partner, location, ..
            } => R::Transcript(vec![
                ChatLine::new(
                    agent.clone(),
                    format!("Hi {}, nice to run into you at {location}.", Self::first_name(partner)),
                ),
                ChatLine::new(
                    partner.clone(),
                    format!("Good to see you too, {}!", Self::first_name(agent)),
                ),
            ]),
            CognitionRequest::ConversationSummary { agent, partner, .. } => R::Text(format!(
                "{} and {} exchanged greetings",
                Self::first_name(agent),
                Self::first_name(partner)
            )),
            CognitionRequest::ReviseWindow {
                original,
                inserted,
                remaining_minutes,
                ..
            } => {
                let resume = original
                    .last()
                    .map_or_else(|| inserted.task.clone(), |e| e.task.clone());
                R::Schedule(vec![ScheduleEntry::new(resume, *remaining_minutes)])
            }
            CognitionRequest::FocalPoints {
                statements, count, ..
            } => R::Lines(
                statements
                    .iter()
                    .rev()
                    .take(*count)
                    .map(|s| format!("why {s}"))
                    .collect(),
            ),
            CognitionRequest::Insights {
                agent,
                statements,
                count,
            } => R::Insights(
                statements
                    .iter()
                    .take(*count)
                    .enumerate()
                    .map(|(i, s)| Insight {
                        thought: format!("{} noticed that {s}", Self::first_name(agent)),
                        evidence: vec![i],
                    })
                    .collect(),
            ),
            CognitionRequest::ConversationNotes { agent, partner, .. } => R::Notes {
                planning: format!(
                    "{} wants to catch up with {} again",
                    Self::first_name(agent),
                    Self::first_name(partner)
                ),
                memo: format!("enjoyed talking with {}", Self::first_name(partner)),
            },
            CognitionRequest::RelationshipSummary {
                agent,
                partner,
                statements,
            } => {
                let (me, other) = (Self::first_name(agent), Self::first_name(partner));
                R::Text(if statements.is_empty() {
                    format!("{me} does not know {other} well yet")
                } else {
                    format!("{me} has {} memories of {other}", statements.len())
                })
            }
            CognitionRequest::IdentityNotes {
                agent, statements, ..
            } => {
                let me = Self::first_name(agent);
                R::Notes {
                    planning: statements.first().map_or_else(
                        || format!("{me} has nothing special lined up"),
                        |s| format!("{me} remembers {s}"),
                    ),
                    memo: format!("{me} has been feeling settled lately"),
                }
            }
            CognitionRequest::CurrentStatus { agent, date, .. } => R::Text(format!(
                "{} is starting {date} with yesterday in mind",
                Self::first_name(agent)
            )),
        };
        Ok(response)
    }
}

/// Bag-of-words embedding by FNV-1a token hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEmbedding {
    dimensions: usize,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

impl HashEmbedding {
    /// Vectors of `dimensions` components.
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl EmbeddingOracle for HashEmbedding {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, OracleError> {
        let dims = u64::try_from(self.dimensions)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| OracleError::Malformed {
                request: "embedding",
                reason: "zero dimensions".to_owned(),
            })?;
        let mut vector = vec![0.0_f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            let sign = if hash.leading_zeros() == 0 { -1.0 } else { 1.0 };
            if let Some(slot) = hash
                .checked_rem(dims)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| vector.get_mut(i))
            {
                *slot += sign;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use township_agents::retrieval::cosine_similarity;
    use township_types::MemoryKind;

    use super::*;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn stub_day_fills_every_minute() {
        for wake in [0, 6, 7, 12, 23] {
            let entries = StubCognition::hourly_schedule(wake);
            assert_eq!(
                township_agents::schedule::total_minutes(&entries),
                MINUTES_PER_DAY,
                "wake at {wake}"
            );
        }
    }

    #[test]
    fn every_stub_answer_is_valid() {
        let mut stub = StubCognition::new();
        let requests = [
            CognitionRequest::WakeUpHour {
                agent: "Isabella Rodriguez".to_owned(),
                identity: String::new(),
                lifestyle: String::new(),
            },
            CognitionRequest::TaskDecomposition {
                agent: "Isabella Rodriguez".to_owned(),
                identity: String::new(),
                task: "working".to_owned(),
                minutes: 180,
            },
            CognitionRequest::ActionSector {
                agent: "Isabella Rodriguez".to_owned(),
                task: "having lunch".to_owned(),
                current_sector: Some("maple house".to_owned()),
                living_area: "oakhaven:maple house:bedroom".to_owned(),
                options: options(&["hobbs cafe", "maple house", "town park"]),
            },
            CognitionRequest::Poignancy {
                agent: "Isabella Rodriguez".to_owned(),
                memory: MemoryKind::Event,
                description: "bed is idle".to_owned(),
            },
            CognitionRequest::Conversation {
                agent: "Isabella Rodriguez".to_owned(),
                partner: "Klaus Mueller".to_owned(),
                agent_identity: String::new(),
                partner_identity: String::new(),
                location: "hobbs cafe".to_owned(),
                context: Vec::new(),
                partner_context: Vec::new(),
            },
            CognitionRequest::RelationshipSummary {
                agent: "Isabella Rodriguez".to_owned(),
                partner: "Klaus Mueller".to_owned(),
                statements: Vec::new(),
            },
            CognitionRequest::IdentityNotes {
                agent: "Isabella Rodriguez".to_owned(),
                date: "Tuesday February 14".to_owned(),
                statements: options(&["Monday February 13 -- 09:00 AM: opened the cafe"]),
            },
            CognitionRequest::CurrentStatus {
                agent: "Isabella Rodriguez".to_owned(),
                date: "Tuesday February 14".to_owned(),
                previous: String::new(),
                notes: Vec::new(),
            },
            CognitionRequest::Insights {
                agent: "Isabella Rodriguez".to_owned(),
                statements: options(&["a", "b"]),
                count: 5,
            },
        ];
        for request in requests {
            let answer = stub.generate(&request).unwrap();
            assert!(request.validate(&answer).is_ok(), "{}", request.kind());
        }
    }

    #[test]
    fn location_hints_pick_matching_options() {
        let sectors = options(&["hobbs cafe", "maple house", "oak library", "town park"]);
        assert_eq!(StubCognition::pick("having lunch", &sectors, None), "hobbs cafe");
        assert_eq!(StubCognition::pick("reading a book", &sectors, None), "oak library");
        assert_eq!(
            StubCognition::pick("daydreaming", &sectors, Some("town park")),
            "town park"
        );
        assert_eq!(StubCognition::pick("daydreaming", &sectors, None), "hobbs cafe");
    }

    #[test]
    fn decomposition_keeps_the_duration() {
        let parts = StubCognition::decompose("working", 100);
        assert_eq!(parts.len(), 3);
        assert_eq!(township_agents::schedule::total_minutes(&parts), 100);
    }

    #[test]
    fn hash_embedding_is_normalized_and_stable() {
        let mut embedding = HashEmbedding::new(32);
        let a = embedding.embed("brewing coffee at the cafe").unwrap();
        let b = embedding.embed("brewing coffee at the cafe").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let related = embedding.embed("coffee at the cafe").unwrap();
        let unrelated = embedding.embed("sleeping").unwrap();
        assert!(cosine_similarity(&a, &related) > cosine_similarity(&a, &unrelated));
    }

    #[test]
    fn zero_dimensions_is_an_error() {
        assert!(HashEmbedding::new(0).embed("x").is_err());
    }
}
