//! Planning: the day plan, the next action, and reactions.
//!
//! Per tick, after perception:
//!
//! 1. On the first tick of a day, ask for a wake-up hour, goals, and an
//!    hourly schedule; store the plan as a thought. From the second day on,
//!    the agent first revisits recent memories and rewrites its status line.
//! 2. When the current action is finished, decompose the upcoming
//!    hour-long entries into subtasks and begin the entry in progress,
//!    resolving where it happens from the agent's spatial knowledge.
//! 3. Pick one perceived event to focus on and decide whether to react:
//!    start a conversation with the agent involved, or wait for them to
//!    finish. Reactions splice the schedule so the day still sums to 1440
//!    minutes.
//! 4. Tick down chat cool-downs.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use rand::Rng;
use rand::seq::IndexedRandom;
use township_agents::retrieval::{RetrievalParams, retrieve_focal_points, score_and_select};
use township_agents::{ActionTarget, Agent, AgentError, DailySchedule, NewAction, NewMemory};
use township_types::time::{add_minutes, ceil_to_minute, minute_of_day};
use township_types::{AddressLevel, ChatLine, NodeId, ScheduleEntry, TileEvent, Triple};
use township_world::Grid;
use tracing::{debug, info};

use crate::clock::DayChange;
use crate::oracle::{
    CognitionRequest, FALLBACK_PRONUNCIATION, FALLBACK_WAKE_UP_HOUR, OracleGuard,
};
use crate::perception::{Association, CHAT_PREDICATE, embed_cached};
use crate::reflect::store_thought;

/// How long a day-plan thought stays relevant: 30 days.
const PLAN_LIFETIME_MINUTES: u32 = 43_200;
/// Poignancy of a day-plan thought.
const PLAN_POIGNANCY: f64 = 5.0;
/// Memories about a partner condensed into a relationship summary.
const RELATIONSHIP_RETRIEVAL_LIMIT: usize = 50;
/// Memories per focal point passed to the oracle as conversation context.
const CONVERSATION_RETRIEVAL_LIMIT: usize = 15;
/// Conversations never start in the last hour of the day.
const LAST_HOUR: u32 = 23;

/// Read-only context for one agent's planning step.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    /// The world.
    pub grid: &'a Grid,
    /// Current simulation time.
    pub now: NaiveDateTime,
    /// Whether a new day started for this agent.
    pub day_change: Option<DayChange>,
    /// Address used when nothing better is known.
    pub fallback_address: &'a str,
}

/// How an agent reacts to the event it focused on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Start a conversation with the named agent.
    Chat(String),
    /// Wait in place until the named agent is done.
    Wait {
        /// Agent being waited for.
        partner: String,
        /// When the partner's action ends.
        until: NaiveDateTime,
    },
}

// ---------------------------------------------------------------------------
// Day plan
// ---------------------------------------------------------------------------

/// Revisit the plans and events that matter for the new day. Stores a
/// planning note and a thought note, both backed by the retrieved
/// memories, then rewrites the agent's status line from them.
///
/// # Errors
///
/// Returns [`AgentError`] if retrieval or storing a note fails.
pub fn revise_identity(
    agent: &mut Agent,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    let name = agent.name().to_owned();
    let date = now.format("%A %B %d").to_string();
    let focal: Vec<(String, Vec<f32>)> = [
        format!("{name}'s plan for {date}."),
        format!("Important recent events for {name}'s life."),
    ]
    .into_iter()
    .map(|point| {
        let embedding = embed_cached(agent, &point, guard);
        (point, embedding)
    })
    .collect();
    let params = RetrievalParams::from(&agent.scratch.config);
    let retrieved = retrieve_focal_points(&mut agent.memory, &focal, &params, now)?;

    let mut evidence: Vec<NodeId> = Vec::new();
    let mut statements = Vec::new();
    for id in retrieved.iter().flat_map(|(_, ids)| ids) {
        if evidence.contains(id) {
            continue;
        }
        if let Some(node) = agent.memory.node(*id) {
            statements.push(format!(
                "{}: {}",
                node.created.format("%A %B %d -- %H:%M %p"),
                node.description
            ));
            evidence.push(*id);
        }
    }

    let (planning, thought) = guard
        .ask(&CognitionRequest::IdentityNotes {
            agent: name.clone(),
            date: date.clone(),
            statements,
        })
        .into_notes()
        .unwrap_or_default();
    let mut notes = Vec::with_capacity(2);
    if !planning.is_empty() {
        let text = format!("For {name}'s planning on {date}: {planning}");
        store_thought(agent, &text, evidence.clone(), now, guard)?;
        notes.push(planning);
    }
    if !thought.is_empty() {
        store_thought(agent, &thought, evidence, now, guard)?;
        notes.push(thought);
    }

    let previous = agent.scratch.profile.currently.clone();
    let currently = guard
        .ask(&CognitionRequest::CurrentStatus {
            agent: name.clone(),
            date,
            previous: previous.clone(),
            notes,
        })
        .into_text()
        .unwrap_or(previous);
    debug!(agent = %name, currently = %currently, "Status revised");
    agent.scratch.profile.currently = currently;
    Ok(())
}

/// Plan a new day: wake-up hour, goals, hourly schedule, and a plan
/// thought. On a [`DayChange::NewDay`] the identity is revised first.
///
/// # Errors
///
/// Returns [`AgentError`] if revising the identity or storing the plan
/// thought fails.
pub fn long_term_plan(
    agent: &mut Agent,
    change: DayChange,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    if change == DayChange::NewDay {
        revise_identity(agent, now, guard)?;
    }
    let name = agent.name().to_owned();
    let identity = agent.scratch.profile.identity_summary();
    let date = now.format("%A %B %d").to_string();

    let wake_up_hour = guard
        .ask(&CognitionRequest::WakeUpHour {
            agent: name.clone(),
            identity: identity.clone(),
            lifestyle: agent.scratch.profile.lifestyle.clone(),
        })
        .into_hour()
        .unwrap_or(FALLBACK_WAKE_UP_HOUR);

    let goals = guard
        .ask(&CognitionRequest::DailyGoals {
            agent: name.clone(),
            identity: identity.clone(),
            date: date.clone(),
            wake_up_hour,
        })
        .into_lines()
        .unwrap_or_default();

    let request = CognitionRequest::HourlySchedule {
        agent: name.clone(),
        identity,
        date: date.clone(),
        wake_up_hour,
        goals: goals.clone(),
    };
    let hourly = guard
        .ask(&request)
        .into_schedule()
        .or_else(|| request.fallback().into_schedule())
        .unwrap_or_default();

    agent.scratch.wake_up_hour = wake_up_hour;
    agent.scratch.daily_goals.clone_from(&goals);
    agent.scratch.schedule = DailySchedule::from_hourly(hourly);

    let description = format!("This is {name}'s plan for {date}: {}.", goals.join(", "));
    let embedding = embed_cached(agent, &description, guard);
    agent.memory.add_thought(
        NewMemory::new(now, Triple::new(name.clone(), "plan", date), description)
            .with_keywords(["plan"])
            .with_poignancy(PLAN_POIGNANCY)
            .with_embedding(embedding)
            .with_expiration(add_minutes(now, PLAN_LIFETIME_MINUTES)),
    )?;

    info!(
        agent = %name,
        change = ?change,
        wake_up_hour,
        entries = agent.scratch.schedule.entries().len(),
        "Day planned"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Next action
// ---------------------------------------------------------------------------

/// Whether a schedule entry should be broken into subtasks.
fn should_decompose(entry: &ScheduleEntry) -> bool {
    if entry.minutes < 60 || entry.task.contains('(') {
        return false;
    }
    let task = entry.task.to_lowercase();
    if !task.contains("sleep") && !task.contains("bed") {
        return true;
    }
    if task.contains("sleeping") || task.contains("asleep") || task.contains("in bed") {
        return false;
    }
    entry.minutes <= 60
}

fn decompose_upcoming(agent: &mut Agent, now: NaiveDateTime, guard: &mut OracleGuard) {
    let minute = minute_of_day(now);
    let schedule = &agent.scratch.schedule;
    let Some(current) = schedule.index_at(minute) else {
        return;
    };
    let ahead = schedule.index_at(minute.saturating_add(60));

    let mut targets = Vec::with_capacity(3);
    if current == 0 {
        targets.push(current);
        if let Some(next) = ahead.and_then(|i| i.checked_add(1)) {
            targets.push(next);
        }
    }
    if now.hour() < LAST_HOUR
        && let Some(ahead) = ahead
    {
        targets.push(ahead);
    }
    // Highest first so earlier indices stay valid.
    targets.sort_unstable_by(|a, b| b.cmp(a));
    targets.dedup();

    let name = agent.name().to_owned();
    let identity = agent.scratch.profile.identity_summary();
    for index in targets {
        let Some(entry) = agent.scratch.schedule.entry(index).cloned() else {
            continue;
        };
        if !should_decompose(&entry) {
            continue;
        }
        let subtasks = guard
            .ask(&CognitionRequest::TaskDecomposition {
                agent: name.clone(),
                identity: identity.clone(),
                task: entry.task.clone(),
                minutes: entry.minutes,
            })
            .into_schedule()
            .unwrap_or_default();
        if subtasks.len() <= 1 {
            continue;
        }
        debug!(agent = %name, task = %entry.task, parts = subtasks.len(), "Task decomposed");
        agent.scratch.schedule.decompose(index, subtasks);
    }
}

/// Where an action happens, plus the object address if one is used.
fn resolve_location(
    agent: &Agent,
    task: &str,
    ctx: &PlanContext<'_>,
    guard: &mut OracleGuard,
) -> Result<(ActionTarget, Option<(String, String)>), AgentError> {
    let here = ctx.grid.tile_at(agent.tile())?;
    let world = here.world.clone();
    let name = agent.name().to_owned();

    let sectors: Vec<String> = agent
        .spatial
        .sectors(&world)
        .into_iter()
        .map(str::to_owned)
        .collect();
    let sector = guard
        .ask(&CognitionRequest::ActionSector {
            agent: name.clone(),
            task: task.to_owned(),
            current_sector: here.sector.clone(),
            living_area: agent.scratch.profile.living_area.clone(),
            options: sectors,
        })
        .into_text()
        .unwrap_or_default();
    if sector.is_empty() {
        let fallback = here
            .address(AddressLevel::Arena)
            .unwrap_or_else(|| ctx.fallback_address.to_owned());
        return Ok((ActionTarget::RandomIn(fallback), None));
    }

    let arenas: Vec<String> = agent
        .spatial
        .arenas(&world, &sector)
        .into_iter()
        .map(str::to_owned)
        .collect();
    if arenas.is_empty() {
        return Ok((ActionTarget::RandomIn(format!("{world}:{sector}")), None));
    }
    let arena = guard
        .ask(&CognitionRequest::ActionArena {
            agent: name.clone(),
            task: task.to_owned(),
            sector: sector.clone(),
            options: arenas,
        })
        .into_text()
        .unwrap_or_default();
    let arena_address = format!("{world}:{sector}:{arena}");

    let objects: Vec<String> = agent
        .spatial
        .objects(&world, &sector, &arena)
        .into_iter()
        .map(str::to_owned)
        .collect();
    if objects.is_empty() {
        return Ok((ActionTarget::RandomIn(arena_address), None));
    }
    let object = guard
        .ask(&CognitionRequest::ActionObject {
            agent: name,
            task: task.to_owned(),
            arena,
            options: objects,
        })
        .into_text()
        .unwrap_or_default();
    let object_address = format!("{arena_address}:{object}");
    Ok((
        ActionTarget::Address(object_address.clone()),
        Some((object, object_address)),
    ))
}

fn pronounce(description: &str, guard: &mut OracleGuard) -> String {
    guard
        .ask(&CognitionRequest::Pronunciation {
            description: description.to_owned(),
        })
        .into_text()
        .unwrap_or_else(|| FALLBACK_PRONUNCIATION.to_owned())
}

/// Begin the schedule entry in progress at `ctx.now`.
///
/// # Errors
///
/// Returns [`AgentError`] if the agent's tile is off the grid.
pub fn determine_action(
    agent: &mut Agent,
    ctx: &PlanContext<'_>,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    decompose_upcoming(agent, ctx.now, guard);

    let minute = minute_of_day(ctx.now);
    let schedule = &agent.scratch.schedule;
    let Some(index) = schedule.index_at(minute) else {
        debug!(agent = %agent.name(), "No schedule entry in progress");
        return Ok(());
    };
    let Some(entry) = schedule.entry(index).cloned() else {
        return Ok(());
    };
    let remaining = schedule
        .start_minute(index)
        .saturating_add(entry.minutes)
        .saturating_sub(minute)
        .max(1);

    let name = agent.name().to_owned();
    let description = entry.task;
    let (target, object) = resolve_location(agent, &description, ctx, guard)?;
    let pronunciation = pronounce(&description, guard);
    let triple = guard
        .ask(&CognitionRequest::EventTriple {
            agent: name.clone(),
            description: description.clone(),
        })
        .into_triple()
        .unwrap_or_else(|| Triple::new(name.clone(), "is", description.clone()));

    let mut action = NewAction::new(&name, target, remaining, description.clone())
        .with_pronunciation(pronunciation)
        .with_event(TileEvent::new(
            triple.subject,
            triple.predicate,
            triple.object,
            description.clone(),
        ));
    if let Some((object, object_address)) = object {
        let state = guard
            .ask(&CognitionRequest::ObjectState {
                object,
                agent: name.clone(),
                task: description.clone(),
            })
            .into_text()
            .unwrap_or_else(|| "in use".to_owned());
        let object_pronunciation = pronounce(&state, guard);
        action = action.with_object(
            state.clone(),
            object_pronunciation,
            TileEvent::new(object_address, "is", state.clone(), state),
        );
    }

    debug!(
        agent = %name,
        task = %description,
        target = %action.target,
        minutes = remaining,
        "Action begun"
    );
    agent.scratch.begin_action(action, ctx.now);
    Ok(())
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// Pick the perceived event to react to: never the agent itself, other
/// agents first, then anything that is not idle.
pub fn choose_focus<'a, R: Rng + ?Sized>(
    agent: &Agent,
    associations: &'a [Association],
    rng: &mut R,
) -> Option<&'a Association> {
    let candidates: Vec<&Association> = associations
        .iter()
        .filter(|a| a.event.triple.subject != agent.name())
        .collect();
    let agents: Vec<&Association> = candidates
        .iter()
        .copied()
        .filter(|a| !a.event.triple.subject.contains(':'))
        .collect();
    if let Some(choice) = agents.choose(rng).copied() {
        return Some(choice);
    }
    let active: Vec<&Association> = candidates
        .into_iter()
        .filter(|a| !a.event.description.contains("is idle"))
        .collect();
    active.choose(rng).copied()
}

fn has_action(agent: &Agent) -> bool {
    agent.scratch.action.target.is_some() && !agent.scratch.action.description.is_empty()
}

fn is_sleeping(agent: &Agent) -> bool {
    agent.scratch.action.description.contains("sleeping")
}

fn is_waiting(agent: &Agent) -> bool {
    matches!(agent.scratch.action.target, Some(ActionTarget::Wait(_)))
}

fn focus_context(agent: &Agent, partner: &str, focus: &Association) -> Vec<String> {
    let mut context: Vec<String> = focus
        .events
        .iter()
        .chain(&focus.thoughts)
        .map(|n| n.description.clone())
        .collect();
    if let Some(chat) = agent.memory.last_chat(partner) {
        context.push(format!("last chat with {partner}: {}", chat.description));
    }
    context
}

fn lets_talk(
    agent: &Agent,
    partner: &Agent,
    focus: &Association,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> bool {
    if !has_action(agent) || !has_action(partner) {
        return false;
    }
    if is_sleeping(agent) || is_sleeping(partner) || now.hour() == LAST_HOUR {
        return false;
    }
    if is_waiting(partner)
        || agent.scratch.action.chatting_with.is_some()
        || partner.scratch.action.chatting_with.is_some()
    {
        return false;
    }
    if !agent.scratch.may_chat_with(partner.name()) {
        return false;
    }
    guard
        .ask(&CognitionRequest::DecideToTalk {
            agent: agent.name().to_owned(),
            partner: partner.name().to_owned(),
            agent_action: agent.scratch.action.description.clone(),
            partner_action: partner.scratch.action.description.clone(),
            context: focus_context(agent, partner.name(), focus),
        })
        .into_decision()
        .unwrap_or(false)
}

fn lets_wait(
    agent: &Agent,
    partner: &Agent,
    focus: &Association,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Option<NaiveDateTime> {
    if !has_action(agent) || !has_action(partner) {
        return None;
    }
    if is_sleeping(agent) || is_sleeping(partner) || now.hour() == LAST_HOUR {
        return None;
    }
    if partner.scratch.action.description.contains("waiting")
        || agent.scratch.action.planned_path.is_empty()
        || agent.scratch.action.target != partner.scratch.action.target
    {
        return None;
    }
    let wait = guard
        .ask(&CognitionRequest::DecideToReact {
            agent: agent.name().to_owned(),
            partner: partner.name().to_owned(),
            agent_action: agent.scratch.action.description.clone(),
            partner_action: partner.scratch.action.description.clone(),
            context: focus_context(agent, partner.name(), focus),
        })
        .into_decision()
        .unwrap_or(false);
    if !wait {
        return None;
    }
    let start = partner.scratch.action.start_time?;
    Some(add_minutes(
        start,
        partner.scratch.action.duration_minutes.saturating_sub(1),
    ))
}

/// Decide how to react to `focus`. Only events of other agents can
/// trigger a reaction, and never while the agent is chatting or waiting.
pub fn should_react(
    agent: &Agent,
    others: &BTreeMap<String, Agent>,
    focus: &Association,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Option<Reaction> {
    if agent.scratch.action.chatting_with.is_some() || is_waiting(agent) {
        return None;
    }
    let subject = &focus.event.triple.subject;
    if subject.contains(':') {
        return None;
    }
    let partner = others.get(subject)?;
    if lets_talk(agent, partner, focus, now, guard) {
        return Some(Reaction::Chat(subject.clone()));
    }
    lets_wait(agent, partner, focus, now, guard).map(|until| Reaction::Wait {
        partner: subject.clone(),
        until,
    })
}

/// Minutes a conversation takes: one minute per 30 words, at eight
/// characters per word, at least one.
pub fn conversation_minutes(transcript: &[ChatLine]) -> u32 {
    let chars: usize = transcript
        .iter()
        .map(|line| line.utterance.chars().count())
        .sum();
    let words = chars / 8;
    u32::try_from(words.div_ceil(30)).unwrap_or(u32::MAX).max(1)
}

/// Replace the reaction window of the agent's schedule with `task`.
fn splice(
    agent: &mut Agent,
    task: &str,
    minutes: u32,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    if agent.scratch.schedule.is_empty() {
        return Ok(());
    }
    let minute = minute_of_day(now);
    let window = agent.scratch.schedule.reaction_window(minute);
    let name = agent.name().to_owned();
    agent
        .scratch
        .schedule
        .splice_reaction(minute, task, minutes, window, |request| {
            guard
                .ask(&CognitionRequest::ReviseWindow {
                    agent: name,
                    original: request.original.clone(),
                    prefix: request.prefix.clone(),
                    inserted: request.inserted.clone(),
                    remaining_minutes: request.remaining_minutes,
                })
                .into_schedule()
        })
}

/// What `agent` brings into a conversation with `partner`: a summary of
/// the relationship first, then the memories that best match it and the
/// partner's current action, then the last chat between them.
fn conversation_context(
    agent: &mut Agent,
    partner: &Agent,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<Vec<String>, AgentError> {
    let other = partner.name().to_owned();
    let params = RetrievalParams::from(&agent.scratch.config);

    let name_embedding = embed_cached(agent, &other, guard);
    let about = score_and_select(
        &mut agent.memory,
        &name_embedding,
        &RetrievalParams {
            limit: RELATIONSHIP_RETRIEVAL_LIMIT,
            ..params
        },
        now,
    )?;
    let request = CognitionRequest::RelationshipSummary {
        agent: agent.name().to_owned(),
        partner: other.clone(),
        statements: about.into_iter().map(|n| n.description).collect(),
    };
    let relationship = guard
        .ask(&request)
        .into_text()
        .or_else(|| request.fallback().into_text())
        .unwrap_or_default();

    let focal: Vec<(String, Vec<f32>)> = [
        relationship.clone(),
        format!("{other} is {}", partner.scratch.action.description),
    ]
    .into_iter()
    .map(|point| {
        let embedding = embed_cached(agent, &point, guard);
        (point, embedding)
    })
    .collect();
    let retrieved = retrieve_focal_points(
        &mut agent.memory,
        &focal,
        &RetrievalParams {
            limit: CONVERSATION_RETRIEVAL_LIMIT,
            ..params
        },
        now,
    )?;

    let mut lines = vec![relationship];
    for id in retrieved.iter().flat_map(|(_, ids)| ids) {
        if let Some(node) = agent.memory.node(*id)
            && !lines.contains(&node.description)
        {
            lines.push(node.description.clone());
        }
    }
    if let Some(chat) = agent.memory.last_chat(&other) {
        lines.push(format!("last chat with {other}: {}", chat.description));
    }
    Ok(lines)
}

/// Start a conversation between `agent` and `partner`. Both schedules are
/// spliced and both agents begin the chat. Returns `false` when the oracle
/// produced no conversation.
///
/// # Errors
///
/// Returns [`AgentError`] if retrieval fails or a spliced schedule no
/// longer sums to a day.
pub fn chat_react(
    agent: &mut Agent,
    partner: &mut Agent,
    ctx: &PlanContext<'_>,
    guard: &mut OracleGuard,
) -> Result<bool, AgentError> {
    let location = ctx
        .grid
        .address_of(agent.tile(), AddressLevel::Arena)
        .or_else(|_| ctx.grid.address_of(agent.tile(), AddressLevel::Sector))
        .unwrap_or_else(|_| ctx.grid.name().to_owned());
    let context = conversation_context(agent, partner, ctx.now, guard)?;
    let partner_context = conversation_context(partner, agent, ctx.now, guard)?;
    let transcript = guard
        .ask(&CognitionRequest::Conversation {
            agent: agent.name().to_owned(),
            partner: partner.name().to_owned(),
            agent_identity: agent.scratch.profile.identity_summary(),
            partner_identity: partner.scratch.profile.identity_summary(),
            location,
            context,
            partner_context,
        })
        .into_transcript()
        .unwrap_or_default();
    if transcript.is_empty() {
        debug!(agent = %agent.name(), partner = %partner.name(), "No conversation produced");
        return Ok(false);
    }

    let summary = guard
        .ask(&CognitionRequest::ConversationSummary {
            agent: agent.name().to_owned(),
            partner: partner.name().to_owned(),
            transcript: transcript.clone(),
        })
        .into_text()
        .unwrap_or_else(|| format!("conversing with {}", partner.name()));
    let minutes = conversation_minutes(&transcript);
    let end = add_minutes(ceil_to_minute(ctx.now), minutes);

    let agent_name = agent.name().to_owned();
    let partner_name = partner.name().to_owned();
    let pairs = [(&mut *agent, partner_name), (&mut *partner, agent_name)];
    for (me, other) in pairs {
        splice(me, &summary, minutes, ctx.now, guard)?;
        let name = me.name().to_owned();
        let target = ActionTarget::Agent(other.clone());
        let action = NewAction::new(&name, target, minutes, summary.clone())
            .with_pronunciation("💬")
            .with_event(TileEvent::new(&name, CHAT_PREDICATE, &other, summary.clone()))
            .with_chat(other, transcript.clone(), end);
        me.scratch.begin_action(action, ctx.now);
    }

    info!(
        agent = %agent.name(),
        partner = %partner.name(),
        minutes,
        summary = %summary,
        "Conversation started"
    );
    Ok(true)
}

/// Wait on the current tile until `until`.
///
/// # Errors
///
/// Returns [`AgentError`] if the spliced schedule no longer sums to a day.
pub fn wait_react(
    agent: &mut Agent,
    until: NaiveDateTime,
    now: NaiveDateTime,
    guard: &mut OracleGuard,
) -> Result<(), AgentError> {
    let current = agent.scratch.action.description.clone();
    let detail = current
        .rsplit('(')
        .next()
        .unwrap_or(&current)
        .trim_end_matches(')')
        .trim()
        .to_owned();
    let task = format!("waiting to start {detail}");
    let minutes = minute_of_day(until)
        .saturating_sub(minute_of_day(now))
        .saturating_add(1);

    splice(agent, &task, minutes, now, guard)?;
    let name = agent.name().to_owned();
    let action = NewAction::new(&name, ActionTarget::Wait(agent.tile()), minutes, task.clone())
        .with_pronunciation("⌛")
        .with_event(TileEvent::new(&name, "waiting to start", detail, task));
    agent.scratch.begin_action(action, now);
    debug!(agent = %name, minutes, "Waiting");
    Ok(())
}

/// One full planning step for `agent`. `others` holds every other agent
/// and may be changed when a conversation starts.
///
/// # Errors
///
/// Returns [`AgentError`] if planning fails for this agent.
pub fn plan<R: Rng + ?Sized>(
    agent: &mut Agent,
    others: &mut BTreeMap<String, Agent>,
    associations: &[Association],
    ctx: &PlanContext<'_>,
    guard: &mut OracleGuard,
    rng: &mut R,
) -> Result<(), AgentError> {
    if let Some(change) = ctx.day_change {
        long_term_plan(agent, change, ctx.now, guard)?;
    }
    if agent.scratch.action.is_finished(ctx.now) {
        determine_action(agent, ctx, guard)?;
    }

    if let Some(focus) = choose_focus(agent, associations, rng) {
        match should_react(agent, others, focus, ctx.now, guard) {
            Some(Reaction::Chat(partner_name)) => {
                if let Some(partner) = others.get_mut(&partner_name) {
                    chat_react(agent, partner, ctx, guard)?;
                }
            }
            Some(Reaction::Wait { partner, until }) => {
                debug!(agent = %agent.name(), partner = %partner, "Waiting for partner");
                wait_react(agent, until, ctx.now, guard)?;
            }
            None => {}
        }
    }

    agent.scratch.tick_chat_cooldown();
    Ok(())
}
