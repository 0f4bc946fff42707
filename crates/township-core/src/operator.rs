//! Operator control state for a running simulation.
//!
//! Shared between the step loop and whoever drives it (the binary's
//! ctrl-c handler, a test). The operator can pause and resume, or request
//! a clean stop.
//!
//! The control flags are atomics so the loop reads them without locks.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

/// Why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// The configured step limit was reached.
    MaxStepsReached,
    /// An operator asked to stop.
    OperatorStop,
}

/// Shared operator control state.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether the loop is paused.
    paused: AtomicBool,
    /// Wakes the loop on resume.
    resume_notify: Notify,
    /// Whether a stop was requested.
    stop_requested: AtomicBool,
    /// Real-time pause between steps.
    tick_interval_ms: u64,
    /// Steps to run (0 = unbounded).
    max_steps: u64,
    /// Set once the loop returns.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl OperatorState {
    /// Fresh control state: running, no stop requested.
    pub fn new(tick_interval_ms: u64, max_steps: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms,
            max_steps,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause before the next step.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Block until not paused. A stop request also releases the wait.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop after the current step.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record why the loop ended.
    pub async fn set_end_reason(&self, reason: SimulationEndReason) {
        *self.end_reason.lock().await = Some(reason);
    }

    /// Why the loop ended, if it has.
    pub async fn end_reason(&self) -> Option<SimulationEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Pacing and bounds
    // -----------------------------------------------------------------------

    /// Pause between steps in milliseconds.
    pub const fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Whether `steps_run` reaches the step limit.
    pub const fn step_limit_reached(&self, steps_run: u64) -> bool {
        self.max_steps > 0 && steps_run >= self.max_steps
    }

    /// Configured step limit (0 = unbounded).
    pub const fn max_steps(&self) -> u64 {
        self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn starts_running() {
        let state = OperatorState::new(250, 10);
        assert!(!state.is_paused());
        assert!(!state.is_stop_requested());
        assert_eq!(state.tick_interval_ms(), 250);
    }

    #[test]
    fn pause_and_resume() {
        let state = OperatorState::new(0, 10);
        state.pause();
        assert!(state.is_paused());
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn step_limit() {
        let bounded = OperatorState::new(0, 5);
        assert!(!bounded.step_limit_reached(4));
        assert!(bounded.step_limit_reached(5));
        let unbounded = OperatorState::new(0, 0);
        assert!(!unbounded.step_limit_reached(u64::MAX));
    }

    #[tokio::test]
    async fn stop_releases_a_paused_loop() {
        let state = Arc::new(OperatorState::new(0, 0));
        state.pause();
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait_if_paused().await })
        };
        state.request_stop();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn end_reason_is_recorded() {
        let state = OperatorState::new(0, 0);
        assert_eq!(state.end_reason().await, None);
        state.set_end_reason(SimulationEndReason::OperatorStop).await;
        assert_eq!(state.end_reason().await, Some(SimulationEndReason::OperatorStop));
    }
}
