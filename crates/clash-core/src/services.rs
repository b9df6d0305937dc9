//! Contracts for the external collaborators.
//!
//! The core never talks to a network itself. Every outside service is a
//! trait here, implemented over HTTP by `clash-runner` and by in-memory
//! fakes in tests. A [`Backend`] bundles one implementation of each so a
//! session only needs a single type parameter.

use std::future::Future;
use std::sync::Arc;

use clash_types::{AlignmentStats, GraphData, GraphRequest, GraphResponse, Message, Team};

use crate::prompt::RenderedPrompt;

/// A failed call to an external service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request never completed (connection, timeout, non-2xx status).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with something that could not be understood.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// No backend serves this model identifier.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
}

// ---------------------------------------------------------------------------
// Generation and validation
// ---------------------------------------------------------------------------

/// One call to the generation service.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// The team the text is generated for.
    pub team: Team,
    /// Model identifier, e.g. `gpt-4o-mini`.
    pub model: &'a str,
    /// The rendered prompt.
    pub prompt: &'a RenderedPrompt,
}

/// Produces message text from a prompt.
pub trait GenerationService: Send + Sync + 'static {
    /// Generate one draft.
    fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// Judges whether a draft argues for a topic.
pub trait ValidationService: Send + Sync + 'static {
    /// `true` when `text` is aligned with `topic`.
    fn validate(
        &self,
        text: &str,
        topic: &str,
    ) -> impl Future<Output = Result<bool, ServiceError>> + Send;
}

// ---------------------------------------------------------------------------
// Simulation and graph generation
// ---------------------------------------------------------------------------

/// Status values the simulation engine reports on poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Still advancing.
    Running,
    /// Done. No further steps will be accepted.
    Finished,
    /// The engine failed.
    Error,
}

/// Result of polling the simulation engine.
///
/// Graph and stats are optional: an engine may report status only.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    /// Engine status.
    pub status: EngineStatus,
    /// Step counter, if reported.
    pub step: Option<u64>,
    /// Current graph, if reported.
    pub graph: Option<GraphData>,
    /// Current stats, if reported.
    pub stats: Option<AlignmentStats>,
}

/// The opinion-dynamics simulation.
pub trait SimulationEngine: Send + Sync + 'static {
    /// Start the run on the current graph.
    fn start(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Hand the engine the message that was just accepted.
    fn submit_message(
        &self,
        message: &Message,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Advance one step. Does not return the result.
    fn step(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Fetch the current status and snapshot.
    fn poll(&self) -> impl Future<Output = Result<PollResponse, ServiceError>> + Send;

    /// Throw away the run and return a fresh graph.
    fn restart(&self) -> impl Future<Output = Result<GraphResponse, ServiceError>> + Send;
}

/// Builds the social graph.
pub trait GraphService: Send + Sync + 'static {
    /// Generate a graph for an already validated request.
    fn generate_graph(
        &self,
        request: &GraphRequest,
    ) -> impl Future<Output = Result<GraphResponse, ServiceError>> + Send;
}

// ---------------------------------------------------------------------------
// Backend bundle
// ---------------------------------------------------------------------------

/// One implementation of every external collaborator.
pub trait Backend: Send + Sync + 'static {
    /// Text generation.
    type Generator: GenerationService;
    /// Topical validation.
    type Validator: ValidationService;
    /// Simulation engine.
    type Engine: SimulationEngine;
    /// Graph generation.
    type Graphs: GraphService;
}

/// Shared handles to a backend's services.
pub struct Services<B: Backend> {
    /// Text generation.
    pub generator: Arc<B::Generator>,
    /// Topical validation.
    pub validator: Arc<B::Validator>,
    /// Simulation engine.
    pub engine: Arc<B::Engine>,
    /// Graph generation.
    pub graphs: Arc<B::Graphs>,
}

impl<B: Backend> Services<B> {
    /// Wrap concrete services.
    pub fn new(
        generator: B::Generator,
        validator: B::Validator,
        engine: B::Engine,
        graphs: B::Graphs,
    ) -> Self {
        Self {
            generator: Arc::new(generator),
            validator: Arc::new(validator),
            engine: Arc::new(engine),
            graphs: Arc::new(graphs),
        }
    }
}

impl<B: Backend> Clone for Services<B> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            validator: Arc::clone(&self.validator),
            engine: Arc::clone(&self.engine),
            graphs: Arc::clone(&self.graphs),
        }
    }
}
