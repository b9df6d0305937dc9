//! Error types for turn orchestration.
//!
//! [`DebateError`] is what the turn controller, the message pipeline and
//! the session surface to callers. Constraint violations (word count,
//! topical validation) never appear here: they are retried inside the
//! pipeline and only show up as [`DebateError::GenerationExhausted`] once
//! the attempt budget is spent.

use clash_ledger::LedgerError;
use clash_types::{Team, TurnState};

use crate::network::GraphRequestError;
use crate::potency::PotencyError;
use crate::prompt::PromptError;
use crate::services::ServiceError;
use crate::sync::SyncError;
use crate::topic::TopicError;

/// Errors raised while driving a debate.
#[derive(Debug, thiserror::Error)]
pub enum DebateError {
    /// A generation, validation or simulation call failed. The turn was
    /// not consumed and the operation can be retried.
    #[error("service call failed: {0}")]
    Transport(#[from] ServiceError),

    /// An otherwise acceptable message carried no well-formed potency.
    #[error("potency parse failure: {0}")]
    Potency(#[from] PotencyError),

    /// The generator never produced an acceptable message.
    #[error("{team} generation exhausted after {attempts} attempts")]
    GenerationExhausted {
        /// The team whose move failed.
        team: Team,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The operation is not valid in the controller's current state.
    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// The state at the time.
        state: TurnState,
    },

    /// The simulation has finished; no further moves are accepted.
    #[error("the run has finished")]
    RunFinished,

    /// Manual control was attempted while autoplay drives the debate.
    #[error("autoplay is active")]
    AutoplayActive,

    /// Network parameters were rejected before any service call.
    #[error(transparent)]
    Network(#[from] GraphRequestError),

    /// A team topic was rejected.
    #[error(transparent)]
    Topic(#[from] TopicError),

    /// A prompt template failed to render.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The ledger could not be built.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The simulation sync rejected the operation.
    #[error(transparent)]
    Sync(#[from] SyncError),
}
