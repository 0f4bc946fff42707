//! The agent's current action.
//!
//! An action moves through four phases:
//!
//! ```text
//! Idle ──begin──▶ Planning ──walk planned──▶ Walking ──path exhausted──▶ Holding
//!   ▲                                                                      │
//!   └──────────────────────── duration elapsed ◀───────────────────────────┘
//! ```
//!
//! Completion is measured from the start time rounded up to the next whole
//! minute. While chatting, the chat end time replaces that calculation.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use township_types::time::{add_minutes, ceil_to_minute};
use township_types::{ChatLine, TileEvent, TilePos};

/// Where an action takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActionTarget {
    /// A concrete `world:sector:arena[:object]` address.
    Address(String),
    /// Any tile of an address, re-drawn each time the walk ends.
    RandomIn(String),
    /// Wherever the named agent is; walk to the midpoint between the two.
    Agent(String),
    /// Stay on a specific tile.
    Wait(TilePos),
}

impl core::fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::RandomIn(address) => write!(f, "{address}:<random>"),
            Self::Agent(name) => write!(f, "<persona> {name}"),
            Self::Wait(tile) => write!(f, "<waiting> {} {}", tile.x, tile.y),
        }
    }
}

/// Parameters for [`ActionState::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
    /// Where the action happens.
    pub target: ActionTarget,
    /// Planned length in minutes.
    pub duration_minutes: u32,
    /// What the agent is doing.
    pub description: String,
    /// Emoji rendering.
    pub pronunciation: String,
    /// Event the agent broadcasts on its tile.
    pub event: TileEvent,
    /// New state of the object being used, if any.
    pub object_description: Option<String>,
    /// Emoji rendering of the object state.
    pub object_pronunciation: Option<String>,
    /// Event broadcast on the object's tiles.
    pub object_event: Option<TileEvent>,
    /// Conversation partner, if chatting.
    pub chatting_with: Option<String>,
    /// Conversation transcript, if chatting.
    pub chat: Option<Vec<ChatLine>>,
    /// When the conversation ends, if chatting.
    pub chat_end_time: Option<NaiveDateTime>,
}

impl NewAction {
    /// A plain action; the broadcast event is `<agent> is <description>`.
    pub fn new(
        agent: &str,
        target: ActionTarget,
        duration_minutes: u32,
        description: impl Into<String>,
    ) -> Self {
        let description = description.into();
        Self {
            event: TileEvent::new(agent, "is", description.clone(), description.clone()),
            target,
            duration_minutes,
            description,
            pronunciation: String::from("🙂"),
            object_description: None,
            object_pronunciation: None,
            object_event: None,
            chatting_with: None,
            chat: None,
            chat_end_time: None,
        }
    }

    /// Set the emoji rendering.
    #[must_use]
    pub fn with_pronunciation(mut self, pronunciation: impl Into<String>) -> Self {
        self.pronunciation = pronunciation.into();
        self
    }

    /// Replace the broadcast event.
    #[must_use]
    pub fn with_event(mut self, event: TileEvent) -> Self {
        self.event = event;
        self
    }

    /// Describe the state of the object being used.
    #[must_use]
    pub fn with_object(
        mut self,
        description: impl Into<String>,
        pronunciation: impl Into<String>,
        event: TileEvent,
    ) -> Self {
        self.object_description = Some(description.into());
        self.object_pronunciation = Some(pronunciation.into());
        self.object_event = Some(event);
        self
    }

    /// Mark the action as a conversation.
    #[must_use]
    pub fn with_chat(
        mut self,
        partner: impl Into<String>,
        transcript: Vec<ChatLine>,
        end_time: NaiveDateTime,
    ) -> Self {
        self.chatting_with = Some(partner.into());
        self.chat = Some(transcript);
        self.chat_end_time = Some(end_time);
        self
    }
}

/// The one action an agent is performing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    /// Where the action happens; `None` before the first action.
    pub target: Option<ActionTarget>,
    /// When the action began.
    pub start_time: Option<NaiveDateTime>,
    /// Planned length in minutes.
    pub duration_minutes: u32,
    /// What the agent is doing.
    pub description: String,
    /// Emoji rendering.
    pub pronunciation: String,
    /// Event the agent broadcasts.
    pub event: Option<TileEvent>,
    /// State of the object being used.
    pub object_description: Option<String>,
    /// Emoji rendering of the object state.
    pub object_pronunciation: Option<String>,
    /// Event broadcast on the object's tiles.
    pub object_event: Option<TileEvent>,
    /// Conversation partner.
    pub chatting_with: Option<String>,
    /// Conversation transcript.
    pub chat: Option<Vec<ChatLine>>,
    /// When the conversation ends.
    pub chat_end_time: Option<NaiveDateTime>,
    /// Remaining steps, destination inclusive, current tile excluded.
    pub planned_path: VecDeque<TilePos>,
    /// Whether `planned_path` has been computed for this action.
    pub path_committed: bool,
}

impl ActionState {
    /// Start a new action at `now`. The walk must be re-planned.
    pub fn begin(&mut self, action: NewAction, now: NaiveDateTime) {
        self.target = Some(action.target);
        self.start_time = Some(now);
        self.duration_minutes = action.duration_minutes;
        self.description = action.description;
        self.pronunciation = action.pronunciation;
        self.event = Some(action.event);
        self.object_description = action.object_description;
        self.object_pronunciation = action.object_pronunciation;
        self.object_event = action.object_event;
        self.chatting_with = action.chatting_with;
        self.chat = action.chat;
        self.chat_end_time = action.chat_end_time;
        self.planned_path.clear();
        self.path_committed = false;
    }

    /// When the action is due to end.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        if self.chatting_with.is_some()
            && let Some(end) = self.chat_end_time
        {
            return Some(end);
        }
        self.start_time
            .map(|start| add_minutes(ceil_to_minute(start), self.duration_minutes))
    }

    /// Whether the action is over at `now`. With no action set this is
    /// always `true`.
    pub fn is_finished(&self, now: NaiveDateTime) -> bool {
        if self.target.is_none() {
            return true;
        }
        self.end_time().is_none_or(|end| now >= end)
    }

    /// Drop conversation state.
    pub fn clear_chat(&mut self) {
        self.chatting_with = None;
        self.chat = None;
        self.chat_end_time = None;
    }

    /// The event to broadcast for `agent`: the action's event, or idle.
    pub fn current_event(&self, agent: &str) -> TileEvent {
        match (&self.target, &self.event) {
            (Some(_), Some(event)) => event.clone(),
            _ => TileEvent::idle(agent),
        }
    }

    /// The object event to broadcast, if the action uses an object.
    pub fn current_object_event(&self) -> Option<TileEvent> {
        self.target.as_ref()?;
        self.object_event.clone()
    }

    /// `"<description> @ <target>"` for the movement record.
    pub fn movement_description(&self) -> String {
        match &self.target {
            Some(target) => format!("{} @ {target}", self.description),
            None => self.description.clone(),
        }
    }
}
