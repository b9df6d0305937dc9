//! Turn orchestration, message pipeline and simulation sync for Clash.
//!
//! Two teams, Red and Blue, take turns arguing opposing topics while an
//! external simulation propagates their messages through a social network.
//! This crate owns everything between a button press and an accepted
//! message: whose turn it is, how a compliant message is produced, what it
//! costs, and when the run is over.
//!
//! # Modules
//!
//! - [`controller`] -- [`TurnController`]: the Red/Blue turn state machine.
//! - [`pipeline`] -- [`MessagePipeline`]: generate, check and retry one move.
//! - [`sync`] -- [`SimulationSync`]: forwards accepted messages to the
//!   simulation and folds its reports back into the ledger.
//! - [`session`] -- [`DebateSession`]: one network and one run, wired up.
//! - [`autoplay`] -- the cooperative autoplay loop.
//! - [`ledger`] -- the shared influence/energy ledger handle.
//! - [`potency`] -- potency marker parsing and word counting.
//! - [`prompt`] -- prompt templates.
//! - [`topic`] -- preset and custom topic resolution.
//! - [`network`] -- graph-request validation.
//! - [`report`] -- CSV export of logged rounds.
//! - [`config`] -- YAML configuration.
//! - [`services`] -- traits for the generator, validator, simulation and
//!   graph services.
//!
//! [`TurnController`]: controller::TurnController
//! [`MessagePipeline`]: pipeline::MessagePipeline
//! [`SimulationSync`]: sync::SimulationSync
//! [`DebateSession`]: session::DebateSession

pub mod autoplay;
pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod network;
pub mod pipeline;
pub mod potency;
pub mod prompt;
pub mod report;
pub mod services;
pub mod session;
pub mod sync;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod topic;

pub use autoplay::{AutoPlayControl, AutoPlayEnd, run_autoplay};
pub use config::{ConfigError, DebateConfig};
pub use controller::{TurnController, TurnOutcome};
pub use error::DebateError;
pub use services::{Backend, ServiceError, Services};
pub use session::{DebateSession, SessionProjection};
