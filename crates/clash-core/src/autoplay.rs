//! Cooperative autoplay.
//!
//! While the autoplay flag is set, [`run_autoplay`] calls
//! [`DebateSession::advance`] in a loop and waits for each turn to finish
//! before issuing the next. The flag is only checked between turns: pausing
//! never interrupts a generation already in flight.
//!
//! While autoplay runs the simulation is polled on an interval instead of
//! once per turn. When a human-controlled team holds the turn the loop
//! parks until input arrives or autoplay is paused.
//!
//! # Generations
//!
//! Every [`AutoPlayControl::play`] starts a new generation. A loop only
//! keeps running while its own generation is current, so a quick
//! pause-then-play cannot leave two loops driving the same session. The
//! flag, the generation and the last failure live under one lock so a
//! stale loop can never clear a newer loop's flag.
//!
//! # Failures
//!
//! A loop that stops on an error records it on the control. The message
//! stays visible until the next successful control action clears it.

use std::sync::{Arc, MutexGuard, PoisonError};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use clash_types::SimulationStatus;

use crate::controller::TurnOutcome;
use crate::error::DebateError;
use crate::services::Backend;
use crate::session::DebateSession;

/// Why an autoplay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPlayEnd {
    /// The flag was cleared, or a newer loop took over.
    Paused,
    /// The simulation finished.
    Finished,
    /// The simulation reported an error; manual control takes over.
    SimulationError,
}

#[derive(Debug, Default)]
struct Flags {
    active: bool,
    generation: u64,
    last_error: Option<String>,
}

/// Shared autoplay flag.
#[derive(Debug, Default)]
pub struct AutoPlayControl {
    flags: std::sync::Mutex<Flags>,
    wake: Notify,
}

impl AutoPlayControl {
    /// A control with autoplay off.
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether autoplay is on.
    pub fn is_active(&self) -> bool {
        self.flags().active
    }

    /// Switch autoplay on and clear any recorded failure.
    ///
    /// Returns the new generation, or `None` if autoplay was already on.
    pub fn play(&self) -> Option<u64> {
        let mut flags = self.flags();
        if flags.active {
            return None;
        }
        flags.active = true;
        flags.generation = flags.generation.wrapping_add(1);
        flags.last_error = None;
        Some(flags.generation)
    }

    /// Switch autoplay off at the next turn boundary.
    ///
    /// Returns whether it was on.
    pub fn pause(&self) -> bool {
        let was_active = std::mem::take(&mut self.flags().active);
        self.wake.notify_one();
        was_active
    }

    /// Wake a loop parked on human input.
    pub fn human_input_arrived(&self) {
        self.wake.notify_one();
    }

    /// The error that stopped the last loop, if any.
    pub fn last_error(&self) -> Option<String> {
        self.flags().last_error.clone()
    }

    /// Forget the recorded failure.
    pub fn clear_error(&self) {
        self.flags().last_error = None;
    }

    fn is_current(&self, generation: u64) -> bool {
        let flags = self.flags();
        flags.active && flags.generation == generation
    }

    /// Clear the flag if `generation` still owns it, recording `error`.
    fn release(&self, generation: u64, error: Option<&DebateError>) -> bool {
        let mut flags = self.flags();
        if flags.generation != generation {
            return false;
        }
        flags.active = false;
        if let Some(error) = error {
            flags.last_error = Some(error.to_string());
        }
        true
    }

    async fn park(&self, generation: u64) {
        let wake = self.wake.notified();
        if self.is_current(generation) {
            wake.await;
        }
    }
}

/// Drive `session` until paused, finished or failed.
///
/// `generation` is the value returned by [`AutoPlayControl::play`]. An
/// error that stops the loop is also recorded on `control`.
pub async fn run_autoplay<B: Backend>(
    session: Arc<Mutex<DebateSession<B>>>,
    control: Arc<AutoPlayControl>,
    generation: u64,
) -> Result<AutoPlayEnd, DebateError> {
    let sync = Arc::clone(session.lock().await.sync());
    sync.start_interval().await;
    info!(generation, "autoplay started");

    let result = drive(&session, &control, generation).await;

    if control.release(generation, result.as_ref().err()) {
        sync.stop_interval().await;
    }
    match &result {
        Ok(end) => info!(generation, end = ?end, "autoplay stopped"),
        Err(e) => warn!(generation, error = %e, "autoplay aborted"),
    }
    result
}

async fn drive<B: Backend>(
    session: &Mutex<DebateSession<B>>,
    control: &AutoPlayControl,
    generation: u64,
) -> Result<AutoPlayEnd, DebateError> {
    loop {
        if !control.is_current(generation) {
            return Ok(AutoPlayEnd::Paused);
        }

        let (outcome, status) = {
            let mut guard = session.lock().await;
            if !control.is_current(generation) {
                return Ok(AutoPlayEnd::Paused);
            }
            let outcome = guard.advance().await;
            (outcome, guard.sync().status())
        };

        match outcome {
            Ok(TurnOutcome::Accepted(message)) => {
                debug!(team = %message.team, "autoplay turn accepted");
            }
            Ok(TurnOutcome::AwaitingHuman(team)) => {
                info!(team = %team, "autoplay waiting for human input");
                control.park(generation).await;
            }
            Err(DebateError::RunFinished) => return Ok(AutoPlayEnd::Finished),
            Err(e) => return Err(e),
        }

        match status {
            SimulationStatus::Finished => return Ok(AutoPlayEnd::Finished),
            SimulationStatus::Error => return Ok(AutoPlayEnd::SimulationError),
            SimulationStatus::Idle | SimulationStatus::Running => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::config::DebateConfig;
    use crate::prompt::PromptEngine;
    use crate::services::ServiceError;
    use crate::testing::{FakeBackend, FakeServices};
    use clash_types::{ControllerKind, GraphRequest, Team, TurnState};

    async fn started_session(
        fakes: &FakeServices,
        configure: impl FnOnce(&mut DebateConfig),
    ) -> Arc<Mutex<DebateSession<FakeBackend>>> {
        let mut config = DebateConfig::default();
        configure(&mut config);
        let mut session = DebateSession::generate(
            &config,
            &fakes.services(),
            Arc::new(PromptEngine::builtin().unwrap()),
            GraphRequest::default(),
        )
        .await
        .unwrap();
        session.start().await.unwrap();
        Arc::new(Mutex::new(session))
    }

    #[test]
    fn play_is_idempotent_while_active() {
        let control = AutoPlayControl::new();
        assert_eq!(control.play(), Some(1));
        assert_eq!(control.play(), None);
        assert!(control.pause());
        assert!(!control.pause());
        assert_eq!(control.play(), Some(2));
    }

    #[tokio::test]
    async fn runs_until_energy_is_spent() {
        let fakes = FakeServices::compliant();
        // Three Blue messages at 0.55 cost 3.57 each.
        let session = started_session(&fakes, |c| c.debate.energy_budget = Decimal::from(10)).await;
        let control = Arc::new(AutoPlayControl::new());
        let generation = control.play().unwrap();

        let end = run_autoplay(Arc::clone(&session), Arc::clone(&control), generation)
            .await
            .unwrap();

        assert_eq!(end, AutoPlayEnd::Finished);
        assert!(!control.is_active());
        let guard = session.lock().await;
        assert_eq!(guard.controller().state(), TurnState::Finished);
        assert_eq!(guard.controller().team(Team::Blue).turn_count(), 3);
        assert!(!guard.sync().is_interval_active());
        assert_eq!(fakes.engine.steps(), 6);
    }

    #[tokio::test]
    async fn pause_lets_in_flight_turn_finish() {
        let fakes = FakeServices::compliant();
        let gate = fakes.generator.gate();
        gate.add_permits(1);
        let session = started_session(&fakes, |_| {}).await;
        let control = Arc::new(AutoPlayControl::new());
        let generation = control.play().unwrap();

        let task = tokio::spawn(run_autoplay(
            Arc::clone(&session),
            Arc::clone(&control),
            generation,
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fakes.generator.calls(), 1, "Blue's generation is parked on the gate");

        control.pause();
        gate.add_permits(1);
        let end = task.await.unwrap().unwrap();

        assert_eq!(end, AutoPlayEnd::Paused);
        let guard = session.lock().await;
        assert_eq!(guard.controller().team(Team::Blue).turn_count(), 1);
        assert_eq!(guard.controller().state(), TurnState::RedTurn);
        assert!(!guard.sync().is_interval_active());
        assert_eq!(fakes.generator.calls(), 2);
    }

    #[tokio::test]
    async fn parks_on_human_turn_and_resumes_after_input() {
        let fakes = FakeServices::compliant();
        let session =
            started_session(&fakes, |c| c.teams.blue.controller = ControllerKind::Human).await;
        let control = Arc::new(AutoPlayControl::new());
        let generation = control.play().unwrap();

        let task = tokio::spawn(run_autoplay(
            Arc::clone(&session),
            Arc::clone(&control),
            generation,
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fakes.generator.calls(), 1);

        session
            .lock()
            .await
            .submit_human_message(Team::Blue, "Coffee keeps the world awake")
            .await
            .unwrap();
        control.human_input_arrived();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fakes.generator.calls(), 2);

        control.pause();
        assert_eq!(task.await.unwrap().unwrap(), AutoPlayEnd::Paused);
    }

    #[tokio::test]
    async fn stale_loop_yields_to_newer_generation() {
        let control = AutoPlayControl::new();
        let first = control.play().unwrap();
        control.pause();
        let second = control.play().unwrap();

        assert!(!control.is_current(first));
        assert!(control.is_current(second));
        assert!(!control.release(first, None));
        assert!(control.is_active());
    }

    #[test]
    fn stale_release_keeps_newer_flag_and_error() {
        let control = AutoPlayControl::new();
        let first = control.play().unwrap();
        control.pause();
        let second = control.play().unwrap();

        let stale = DebateError::RunFinished;
        assert!(!control.release(first, Some(&stale)));
        assert!(control.is_current(second));
        assert_eq!(control.last_error(), None);

        let failure = DebateError::Transport(ServiceError::Transport("down".to_owned()));
        assert!(control.release(second, Some(&failure)));
        assert!(!control.is_active());
        assert!(control.last_error().unwrap().contains("down"));

        assert_eq!(control.play(), Some(3));
        assert_eq!(control.last_error(), None);
    }

    #[tokio::test]
    async fn generation_failure_is_recorded() {
        let fakes = FakeServices::compliant();
        let session = started_session(&fakes, |_| {}).await;
        fakes.generator.set_failing(true);
        let control = Arc::new(AutoPlayControl::new());
        let generation = control.play().unwrap();

        let result = run_autoplay(Arc::clone(&session), Arc::clone(&control), generation).await;

        assert!(matches!(result, Err(DebateError::Transport(_))));
        assert!(!control.is_active());
        assert!(control.last_error().is_some());
        assert!(!session.lock().await.sync().is_interval_active());

        control.clear_error();
        assert_eq!(control.last_error(), None);
    }
}
