//! Simulation loop runner with operator controls.
//!
//! [`run_simulation`] drives [`run_tick`] until the step limit is reached
//! or an operator asks to stop, honoring pause/resume and the real-time
//! pacing between steps. A [`TickCallback`] sees every completed step; the
//! binary uses it to write movement files.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;

use tracing::info;

use crate::operator::{OperatorState, SimulationEndReason};
use crate::oracle::OracleGuard;
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// Why the loop ended.
    pub end_reason: SimulationEndReason,
    /// The last step summary, if any step completed.
    pub final_summary: Option<TickSummary>,
    /// Steps executed by this run.
    pub total_steps: u64,
}

/// Callback invoked after each step completes.
pub trait TickCallback: Send {
    /// Called after a step completes.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

async fn finish(
    operator: &OperatorState,
    end_reason: SimulationEndReason,
    final_summary: Option<TickSummary>,
    total_steps: u64,
) -> SimulationResult {
    operator.set_end_reason(end_reason).await;
    SimulationResult {
        end_reason,
        final_summary,
        total_steps,
    }
}

/// Run steps until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a step fails unrecoverably.
pub async fn run_simulation(
    state: &mut SimulationState,
    guard: &mut OracleGuard,
    operator: &Arc<OperatorState>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_steps: u64 = 0;

    info!(
        max_steps = operator.max_steps(),
        tick_interval_ms = operator.tick_interval_ms(),
        agents = state.agents.len(),
        start = %state.clock.curr_time(),
        "Simulation starting"
    );

    loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!("Simulation paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!("Simulation resumed");
        }

        // --- Check stop request (before step) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            return Ok(finish(
                operator,
                SimulationEndReason::OperatorStop,
                last_summary,
                total_steps,
            )
            .await);
        }

        // --- Execute step ---
        let summary = tick::run_tick(state, guard)?;
        total_steps = total_steps.saturating_add(1);
        callback.on_tick(&summary, state);

        // --- Check step limit (after step) ---
        if operator.step_limit_reached(total_steps) {
            info!(
                step = summary.step,
                max_steps = operator.max_steps(),
                "Step limit reached"
            );
            return Ok(finish(
                operator,
                SimulationEndReason::MaxStepsReached,
                Some(summary),
                total_steps,
            )
            .await);
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

/// Log the simulation end.
pub fn log_simulation_end(result: &SimulationResult, state: &SimulationState, guard: &OracleGuard) {
    let stats = guard.stats();
    info!(
        reason = ?result.end_reason,
        total_steps = result.total_steps,
        final_step = result.final_summary.as_ref().map(|s| s.step),
        sim_time = %state.clock.curr_time(),
        oracle_attempts = stats.attempts,
        oracle_failures = stats.failures,
        oracle_fallbacks = stats.fallbacks,
        "Simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use township_agents::{Agent, AgentProfile, CognitiveConfig};
    use township_types::TilePos;
    use township_world::{Grid, SAMPLE_FALLBACK_ADDRESS, sample_town};

    use super::*;
    use crate::clock::SimClock;
    use crate::stub::{HashEmbedding, StubCognition};

    fn setup() -> (SimulationState, OracleGuard) {
        let start = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let profile = AgentProfile {
            name: "Klaus Mueller".to_owned(),
            ..AgentProfile::default()
        };
        let klaus = Agent::new(profile, CognitiveConfig::default(), TilePos::new(2, 3));
        let state = SimulationState::new(
            SimClock::new(start, 10).unwrap(),
            Grid::from_definition(&sample_town()).unwrap(),
            [klaus],
            1,
            SAMPLE_FALLBACK_ADDRESS,
        );
        let guard = OracleGuard::new(
            Box::new(StubCognition::new()),
            Box::new(HashEmbedding::new(16)),
            3,
        );
        (state, guard)
    }

    struct Counter(u64);

    impl TickCallback for Counter {
        fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
            self.0 = self.0.saturating_add(1);
        }
    }

    #[tokio::test]
    async fn stops_at_the_step_limit() {
        let (mut state, mut guard) = setup();
        let operator = Arc::new(OperatorState::new(0, 5));
        let mut counter = Counter(0);

        let result = run_simulation(&mut state, &mut guard, &operator, &mut counter)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxStepsReached);
        assert_eq!(result.total_steps, 5);
        assert_eq!(result.final_summary.as_ref().unwrap().step, 4);
        assert_eq!(counter.0, 5);
        assert_eq!(state.clock.step(), 5);
        assert_eq!(
            operator.end_reason().await,
            Some(SimulationEndReason::MaxStepsReached)
        );
        log_simulation_end(&result, &state, &guard);
    }

    #[tokio::test]
    async fn stop_before_the_first_step() {
        let (mut state, mut guard) = setup();
        let operator = Arc::new(OperatorState::new(0, 0));
        operator.request_stop();

        let result = run_simulation(&mut state, &mut guard, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_steps, 0);
        assert!(result.final_summary.is_none());
        assert_eq!(state.clock.step(), 0);
    }

    #[tokio::test]
    async fn paused_loop_resumes() {
        let (mut state, mut guard) = setup();
        let operator = Arc::new(OperatorState::new(0, 3));
        operator.pause();
        {
            let operator = Arc::clone(&operator);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                operator.resume();
            });
        }

        let result = run_simulation(&mut state, &mut guard, &operator, &mut NoOpCallback)
            .await
            .unwrap();
        assert_eq!(result.total_steps, 3);
        assert!(!operator.is_paused());
    }
}
