//! Debate session lifecycle.
//!
//! A [`DebateSession`] is one run: it is created when a network is
//! generated (or the engine is restarted), owns the turn controller, the
//! ledger handle and the simulation sync, and is dropped wholesale on
//! restart. Nothing outlives it except the services it was built from.
//!
//! Readers never lock the session. They hold a [`SessionProjection`],
//! which only sees the published turn view, the latest snapshot, a
//! consistent ledger reading and the results log.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use clash_ledger::ResourceLedger;
use clash_types::{
    ControlState, GraphRequest, GraphResponse, SessionId, SessionView, SimulationSnapshot,
    SimulationStatus, Team, TurnState, TurnView,
};

use crate::autoplay::AutoPlayControl;
use crate::config::DebateConfig;
use crate::controller::{TeamSlot, TurnController, TurnOutcome};
use crate::error::DebateError;
use crate::ledger::SharedLedger;
use crate::network::validate_request;
use crate::pipeline::{MessagePipeline, PipelineConfig};
use crate::prompt::PromptEngine;
use crate::report::ResultsLog;
use crate::services::{Backend, GraphService, Services, SimulationEngine};
use crate::sync::{SimulationSync, SyncError};
use crate::topic::Topic;

/// One debate run.
pub struct DebateSession<B: Backend> {
    id: SessionId,
    controller: TurnController<B>,
    sync: Arc<SimulationSync<B::Engine>>,
    ledger: SharedLedger,
}

impl<B: Backend> DebateSession<B> {
    /// Generate a new graph and build a session on it.
    ///
    /// The request is validated before the graph service is called.
    pub async fn generate(
        config: &DebateConfig,
        services: &Services<B>,
        prompts: Arc<PromptEngine>,
        request: GraphRequest,
    ) -> Result<Self, DebateError> {
        let request = validate_request(request)?;
        let response = services.graphs.generate_graph(&request).await?;
        info!(
            kind = request.kind.as_str(),
            nodes = response.graph.node_count(),
            edges = response.graph.edges.len(),
            "network generated"
        );
        Self::assemble(config, services, prompts, response)
    }

    /// Restart the engine and build a fresh session on its new graph.
    pub async fn restart(
        config: &DebateConfig,
        services: &Services<B>,
        prompts: Arc<PromptEngine>,
    ) -> Result<Self, DebateError> {
        let response = services.engine.restart().await?;
        info!(nodes = response.graph.node_count(), "simulation restarted");
        Self::assemble(config, services, prompts, response)
    }

    fn assemble(
        config: &DebateConfig,
        services: &Services<B>,
        prompts: Arc<PromptEngine>,
        response: GraphResponse,
    ) -> Result<Self, DebateError> {
        let rules = &config.debate;
        let red_topic = Topic::resolve(&config.teams.red.topic, &rules.topics, rules.topic_word_limit)?;
        let blue_topic =
            Topic::resolve(&config.teams.blue.topic, &rules.topics, rules.topic_word_limit)?;

        let ledger = SharedLedger::new(ResourceLedger::new(
            response.graph.node_count(),
            rules.energy_budget,
            rules.energy_policy,
        )?);

        let sync = Arc::new(SimulationSync::new(
            Arc::clone(&services.engine),
            ledger.clone(),
            SimulationSnapshot::idle(response.graph, response.stats),
            Duration::from_millis(config.simulation.poll_interval_ms),
        ));

        let pipeline = MessagePipeline::new(
            Arc::clone(&services.generator),
            Arc::clone(&services.validator),
            prompts,
            PipelineConfig {
                word_min: rules.word_min,
                word_max: rules.word_max,
                max_attempts: rules.max_attempts,
            },
        );

        let controller = TurnController::new(
            TeamSlot::new(Team::Red, config.teams.red.controller.clone(), red_topic),
            TeamSlot::new(Team::Blue, config.teams.blue.controller.clone(), blue_topic),
            pipeline,
            ledger.clone(),
            Arc::clone(&sync),
        );

        let id = SessionId::new();
        info!(session_id = %id, "session created");
        Ok(Self {
            id,
            controller,
            sync,
            ledger,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Session identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The turn controller.
    pub const fn controller(&self) -> &TurnController<B> {
        &self.controller
    }

    /// The simulation sync.
    pub const fn sync(&self) -> &Arc<SimulationSync<B::Engine>> {
        &self.sync
    }

    /// A lock-free read handle.
    pub fn projection(&self) -> SessionProjection {
        SessionProjection {
            session_id: self.id,
            turn: self.controller.subscribe(),
            simulation: self.sync.subscribe(),
            ledger: self.ledger.clone(),
            results: self.sync.results_log(),
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Start the engine, then open the debate.
    pub async fn start(&mut self) -> Result<TurnOutcome, DebateError> {
        let state = self.controller.state();
        if state != TurnState::AwaitingFirstMove {
            return Err(DebateError::InvalidState {
                operation: "start",
                state,
            });
        }
        self.sync.start().await?;
        self.controller.start().await
    }

    /// Play the active team's turn.
    pub async fn advance(&mut self) -> Result<TurnOutcome, DebateError> {
        self.controller.advance().await
    }

    /// Accept a human message for `team`.
    pub async fn submit_human_message(
        &mut self,
        team: Team,
        text: &str,
    ) -> Result<TurnOutcome, DebateError> {
        self.controller.submit_human_message(team, text).await
    }

    /// Poll the engine once.
    ///
    /// Rejected while interval polling is on.
    pub async fn poll(&self) -> Result<SimulationSnapshot, DebateError> {
        if self.sync.is_interval_active() {
            return Err(SyncError::IntervalActive.into());
        }
        Ok(self.sync.poll().await?)
    }

    /// Stop background polling before the session is dropped.
    pub async fn shutdown(&self) {
        self.sync.stop_interval().await;
        info!(session_id = %self.id, "session closed");
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Read-only view of a session for the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionProjection {
    session_id: SessionId,
    turn: watch::Receiver<TurnView>,
    simulation: watch::Receiver<SimulationSnapshot>,
    ledger: SharedLedger,
    results: ResultsLog,
}

impl SessionProjection {
    /// The session this projection reads.
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Assemble the dashboard view.
    pub async fn view(&self, autoplay: &AutoPlayControl) -> SessionView {
        let turn = self.turn.borrow().clone();
        let simulation = self.simulation.borrow().clone();
        let ledger = self.ledger.reading().await;
        let controls = controls(&turn, simulation.status, autoplay.is_active());
        SessionView {
            session_id: self.session_id,
            turn,
            ledger,
            simulation,
            controls,
            last_error: autoplay.last_error(),
        }
    }

    /// The results log as CSV, `None` when empty.
    pub async fn results_csv(&self) -> Option<String> {
        self.results.csv().await
    }
}

/// Which controls are usable.
fn controls(turn: &TurnView, status: SimulationStatus, autoplay: bool) -> ControlState {
    let finished = turn.state.is_terminal() || status.is_terminal();
    let started = turn.state != TurnState::AwaitingFirstMove;
    let awaiting_human = match turn.state {
        TurnState::AwaitingHumanInput(team) if !finished => Some(team),
        _ => None,
    };
    ControlState {
        can_start: !started && !finished,
        can_advance: !autoplay
            && !turn.generating
            && !finished
            && matches!(turn.state, TurnState::RedTurn | TurnState::BlueTurn),
        can_play: !autoplay && started && !finished,
        can_pause: autoplay,
        awaiting_human,
    }
}
