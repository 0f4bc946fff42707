//! Short-term working state of one agent.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use township_types::TilePos;

use crate::action::{ActionState, NewAction};
use crate::config::CognitiveConfig;
use crate::schedule::DailySchedule;

/// Who an agent is. Passed to the cognition oracle as context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Full name; also the agent's key everywhere.
    pub name: String,
    /// Age in years.
    #[serde(default)]
    pub age: u32,
    /// Stable temperament, e.g. "friendly, outgoing".
    #[serde(default)]
    pub innate: String,
    /// Background and occupation.
    #[serde(default)]
    pub learned: String,
    /// What the agent is focused on these days.
    #[serde(default)]
    pub currently: String,
    /// Daily habits, e.g. "goes to bed around 11pm".
    #[serde(default)]
    pub lifestyle: String,
    /// Address of the agent's home arena.
    #[serde(default)]
    pub living_area: String,
}

impl AgentProfile {
    /// First word of the name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// One paragraph describing the agent.
    pub fn identity_summary(&self) -> String {
        format!(
            "Name: {}\nAge: {}\nInnate traits: {}\nLearned traits: {}\nCurrently: {}\nLifestyle: {}",
            self.name, self.age, self.innate, self.learned, self.currently, self.lifestyle
        )
    }
}

/// Working state that changes tick to tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentScratch {
    /// Identity sheet.
    pub profile: AgentProfile,
    /// Cognitive parameters.
    pub config: CognitiveConfig,
    /// Simulation time of the agent's last tick.
    pub curr_time: Option<NaiveDateTime>,
    /// Tile the agent is standing on.
    pub curr_tile: TilePos,
    /// Hour the agent woke up today.
    pub wake_up_hour: u32,
    /// High-level goals for today.
    pub daily_goals: Vec<String>,
    /// Today's schedule.
    pub schedule: DailySchedule,
    /// The action in progress.
    pub action: ActionState,
    /// Ticks remaining before the agent may chat with each partner again.
    pub chat_cooldown: BTreeMap<String, u32>,
    /// Counts down by each stored event's poignancy; reflection fires at 0.
    pub importance_trigger: f64,
    /// Events stored since the last reflection.
    pub importance_elements: u32,
}

impl AgentScratch {
    /// Fresh working state for a newly spawned agent.
    pub fn new(profile: AgentProfile, config: CognitiveConfig, tile: TilePos) -> Self {
        Self {
            importance_trigger: config.importance_trigger_max,
            profile,
            config,
            curr_tile: tile,
            ..Self::default()
        }
    }

    /// The agent's name.
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Begin `action` at `now`. Starting a conversation puts its partner on
    /// cooldown.
    pub fn begin_action(&mut self, action: NewAction, now: NaiveDateTime) {
        if let Some(partner) = &action.chatting_with {
            self.chat_cooldown
                .insert(partner.clone(), self.config.chat_cooldown_ticks);
        }
        self.action.begin(action, now);
    }

    /// Whether the cooldown for `partner` has run out.
    pub fn may_chat_with(&self, partner: &str) -> bool {
        self.chat_cooldown.get(partner).is_none_or(|ticks| *ticks == 0)
    }

    /// Tick down every cooldown except the current partner's. Chat state is
    /// dropped once the action is no longer a conversation.
    pub fn tick_chat_cooldown(&mut self) {
        if !self.action.event.as_ref().is_some_and(|e| {
            e.predicate.as_deref() == Some("chat with")
        }) {
            self.action.clear_chat();
        }
        let partner = self.action.chatting_with.clone();
        for (name, ticks) in &mut self.chat_cooldown {
            if partner.as_deref() != Some(name.as_str()) {
                *ticks = ticks.saturating_sub(1);
            }
        }
    }

    /// Lower the reflection trigger after storing an event.
    pub fn record_importance(&mut self, poignancy: f64) {
        self.importance_trigger -= poignancy;
        self.importance_elements = self.importance_elements.saturating_add(1);
    }

    /// Whether enough has happened to reflect on.
    pub fn should_reflect(&self) -> bool {
        self.importance_trigger <= 0.0
    }

    /// Reset the reflection trigger after reflecting.
    pub fn reset_reflection(&mut self) {
        self.importance_trigger = self.config.importance_trigger_max;
        self.importance_elements = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_types::{ChatLine, TileEvent};

    use super::*;
    use crate::action::ActionTarget;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn scratch() -> AgentScratch {
        let profile = AgentProfile {
            name: String::from("Isabella Rodriguez"),
            ..AgentProfile::default()
        };
        AgentScratch::new(profile, CognitiveConfig::default(), TilePos::new(2, 3))
    }

    #[test]
    fn new_scratch_arms_reflection_trigger() {
        let s = scratch();
        assert!((s.importance_trigger - 150.0).abs() < f64::EPSILON);
        assert_eq!(s.profile.first_name(), "Isabella");
        assert!(!s.should_reflect());
    }

    #[test]
    fn reflection_trigger_counts_down() {
        let mut s = scratch();
        for _ in 0..15 {
            s.record_importance(10.0);
        }
        assert!(s.should_reflect());
        assert_eq!(s.importance_elements, 15);
        s.reset_reflection();
        assert!(!s.should_reflect());
    }

    #[test]
    fn chat_sets_and_drains_cooldown() {
        let mut s = scratch();
        let chat = NewAction::new(
            "Isabella Rodriguez",
            ActionTarget::Agent(String::from("Klaus Mueller")),
            10,
            "chatting with Klaus",
        )
        .with_event(TileEvent::new(
            "Isabella Rodriguez",
            "chat with",
            "Klaus Mueller",
            "chatting with Klaus",
        ))
        .with_chat("Klaus Mueller", vec![ChatLine::new("Isabella Rodriguez", "Hi")], now());
        s.begin_action(chat, now());
        assert!(!s.may_chat_with("Klaus Mueller"));

        s.tick_chat_cooldown();
        assert_eq!(s.chat_cooldown.get("Klaus Mueller"), Some(&800));

        let walk = NewAction::new(
            "Isabella Rodriguez",
            ActionTarget::Address(String::from("oakhaven:town park:park garden")),
            30,
            "taking a walk",
        );
        s.begin_action(walk, now());
        s.tick_chat_cooldown();
        assert!(s.action.chatting_with.is_none());
        assert_eq!(s.chat_cooldown.get("Klaus Mueller"), Some(&799));
    }
}
