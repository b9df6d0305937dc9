//! The turn state machine.
//!
//! ```text
//!                 start()
//! AwaitingFirstMove ---> RedTurn | AwaitingHumanInput(Red)
//!
//! RedTurn  --advance()--> accepted Red message  --> BlueTurn | AwaitingHumanInput(Blue)
//! BlueTurn --advance()--> accepted Blue message --> RedTurn  | AwaitingHumanInput(Red)
//! AwaitingHumanInput(t) --submit_human_message(t, text)--> (same as above)
//!
//! any --(simulation finished)--> Finished
//! ```
//!
//! Accepting a message always runs the same sequence: record it on the
//! acting team, charge the ledger, hand the turn to the opponent, then
//! step the simulation. A failed generation leaves the state untouched, so
//! the same team can simply try again.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use clash_types::{
    ControllerKind, Message, MessageId, MessageOrigin, Team, TeamView, TurnState, TurnView,
};

use crate::error::DebateError;
use crate::ledger::SharedLedger;
use crate::pipeline::{MessagePipeline, MoveRequest};
use crate::potency::{parse_potency_lenient, word_count};
use crate::services::Backend;
use crate::sync::SimulationSync;
use crate::topic::Topic;

/// What a turn operation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A message was accepted and the turn passed to the opponent.
    Accepted(Message),
    /// The named team must submit a message through the human-input
    /// boundary before the debate can continue.
    AwaitingHuman(Team),
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// One team's controller, topic and message history.
#[derive(Debug, Clone)]
pub struct TeamSlot {
    team: Team,
    controller: ControllerKind,
    topic: Topic,
    messages: Vec<Message>,
}

impl TeamSlot {
    /// A team with no messages yet.
    pub const fn new(team: Team, controller: ControllerKind, topic: Topic) -> Self {
        Self {
            team,
            controller,
            topic,
            messages: Vec::new(),
        }
    }

    /// Which team.
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Who produces the team's messages.
    pub const fn controller(&self) -> &ControllerKind {
        &self.controller
    }

    /// The team's topic.
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Accepted messages so far.
    pub fn turn_count(&self) -> u32 {
        u32::try_from(self.messages.len()).unwrap_or(u32::MAX)
    }

    /// The most recent accepted message.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Accepted messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn view(&self) -> TeamView {
        TeamView {
            team: self.team,
            controller: self.controller.to_string(),
            topic: self.topic.to_string(),
            turn_count: self.turn_count(),
            messages: self.messages.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Decides whose turn it is and dispatches it to a model or a human.
pub struct TurnController<B: Backend> {
    state: TurnState,
    generating: bool,
    red: TeamSlot,
    blue: TeamSlot,
    pipeline: MessagePipeline<B>,
    ledger: SharedLedger,
    sync: Arc<SimulationSync<B::Engine>>,
    view: watch::Sender<TurnView>,
}

impl<B: Backend> TurnController<B> {
    /// Create a controller in [`TurnState::AwaitingFirstMove`].
    pub fn new(
        red: TeamSlot,
        blue: TeamSlot,
        pipeline: MessagePipeline<B>,
        ledger: SharedLedger,
        sync: Arc<SimulationSync<B::Engine>>,
    ) -> Self {
        let initial = TurnView {
            state: TurnState::AwaitingFirstMove,
            generating: false,
            teams: vec![red.view(), blue.view()],
        };
        let (view, _) = watch::channel(initial);
        Self {
            state: TurnState::AwaitingFirstMove,
            generating: false,
            red,
            blue,
            pipeline,
            ledger,
            sync,
            view,
        }
    }

    /// The current state.
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// One team's slot.
    pub const fn team(&self, team: Team) -> &TeamSlot {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    /// Subscribe to turn-view updates.
    pub fn subscribe(&self) -> watch::Receiver<TurnView> {
        self.view.subscribe()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Open the debate with Red's first move.
    ///
    /// Suspends at [`TurnOutcome::AwaitingHuman`] when Red is human.
    pub async fn start(&mut self) -> Result<TurnOutcome, DebateError> {
        match self.state {
            TurnState::AwaitingFirstMove => {}
            TurnState::Finished => return Err(DebateError::RunFinished),
            state => {
                return Err(DebateError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }
        self.ensure_running()?;

        self.state = self.state_for(Team::Red);
        info!(state = ?self.state, "debate started");
        self.publish();
        self.play(Team::Red).await
    }

    /// Play the active team's turn.
    ///
    /// A model-controlled team generates through the pipeline. A
    /// human-controlled team returns [`TurnOutcome::AwaitingHuman`] without
    /// changing anything.
    pub async fn advance(&mut self) -> Result<TurnOutcome, DebateError> {
        let team = match self.state {
            TurnState::RedTurn => Team::Red,
            TurnState::BlueTurn => Team::Blue,
            TurnState::AwaitingHumanInput(team) => return Ok(TurnOutcome::AwaitingHuman(team)),
            TurnState::Finished => return Err(DebateError::RunFinished),
            TurnState::AwaitingFirstMove => {
                return Err(DebateError::InvalidState {
                    operation: "advance",
                    state: self.state,
                });
            }
        };
        self.ensure_running()?;
        self.play(team).await
    }

    /// Accept a human-typed message for `team`.
    ///
    /// Only valid in [`TurnState::AwaitingHumanInput`] for the same team.
    /// The text is stored as is; its potency is read only if it carries a
    /// well-formed marker.
    pub async fn submit_human_message(
        &mut self,
        team: Team,
        text: &str,
    ) -> Result<TurnOutcome, DebateError> {
        match self.state {
            TurnState::AwaitingHumanInput(waiting) if waiting == team => {}
            TurnState::Finished => return Err(DebateError::RunFinished),
            state => {
                return Err(DebateError::InvalidState {
                    operation: "submit a human message",
                    state,
                });
            }
        }
        self.ensure_running()?;

        let message = Message {
            id: MessageId::new(),
            team,
            origin: MessageOrigin::Human,
            text: text.to_owned(),
            word_count: word_count(text),
            potency: parse_potency_lenient(text),
            accepted_at: Utc::now(),
        };
        info!(team = %team, word_count = message.word_count, "human message submitted");
        self.accept(message).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Generate and accept a move for a model-controlled team.
    async fn play(&mut self, team: Team) -> Result<TurnOutcome, DebateError> {
        let Some(model) = self.team(team).controller().model().map(str::to_owned) else {
            self.state = TurnState::AwaitingHumanInput(team);
            self.publish();
            return Ok(TurnOutcome::AwaitingHuman(team));
        };

        self.generating = true;
        self.publish();

        let result = self
            .pipeline
            .generate(&MoveRequest {
                team,
                model: &model,
                red_topic: self.red.topic().as_str(),
                blue_topic: self.blue.topic().as_str(),
                previous: self.team(team.opponent()).last_message(),
            })
            .await;

        self.generating = false;
        match result {
            Ok(message) => self.accept(message).await,
            Err(e) => {
                warn!(team = %team, error = %e, "turn not consumed");
                self.publish();
                Err(e)
            }
        }
    }

    /// Record, charge, hand over, then step the simulation.
    async fn accept(&mut self, message: Message) -> Result<TurnOutcome, DebateError> {
        let team = message.team;
        self.slot_mut(team).messages.push(message.clone());

        if let Some(potency) = message.potency {
            self.ledger.apply_potency(team, potency).await;
        }

        self.state = self.state_for(team.opponent());
        self.publish();

        // The message stands once accepted; a failed engine call only shows
        // up as the snapshot's Error status.
        if let Err(e) = self.sync.on_message_accepted(&message).await {
            warn!(team = %team, error = %e, "simulation sync failed after accepted message");
        }
        if self.sync.is_finished() {
            self.finish();
        }

        Ok(TurnOutcome::Accepted(message))
    }

    /// Reject the operation if the simulation has finished.
    fn ensure_running(&mut self) -> Result<(), DebateError> {
        if self.sync.is_finished() {
            self.finish();
            return Err(DebateError::RunFinished);
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.state != TurnState::Finished {
            self.state = TurnState::Finished;
            info!("debate finished");
            self.publish();
        }
    }

    /// The state in which `team` holds the turn.
    fn state_for(&self, team: Team) -> TurnState {
        if self.team(team).controller().is_human() {
            TurnState::AwaitingHumanInput(team)
        } else {
            match team {
                Team::Red => TurnState::RedTurn,
                Team::Blue => TurnState::BlueTurn,
            }
        }
    }

    const fn slot_mut(&mut self, team: Team) -> &mut TeamSlot {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }

    fn publish(&self) {
        self.view.send_replace(TurnView {
            state: self.state,
            generating: self.generating,
            teams: vec![self.red.view(), self.blue.view()],
        });
    }
}
