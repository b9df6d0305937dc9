//! In-memory fakes of the external services.
//!
//! Every fake is a cheap `Arc` handle: clone it, hand one copy to the code
//! under test and keep the other to script responses and inspect calls.
//! Compiled for this crate's tests and, with the `testing` feature, for
//! downstream test suites.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::Semaphore;

use clash_types::{
    Alignment, AlignmentStats, GraphData, GraphEdge, GraphNode, GraphRequest, GraphResponse,
    Message, MessageId, MessageOrigin, Team,
};

use crate::prompt::RenderedPrompt;
use crate::services::{
    Backend, EngineStatus, GenerationRequest, GenerationService, GraphService, PollResponse,
    ServiceError, Services, SimulationEngine, ValidationService,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend made of the fakes below.
#[derive(Debug)]
pub struct FakeBackend;

impl Backend for FakeBackend {
    type Generator = ScriptedGenerator;
    type Validator = TopicValidator;
    type Engine = FakeEngine;
    type Graphs = FakeGraphs;
}

/// Fake services plus the handles to script them.
#[derive(Debug, Clone)]
pub struct FakeServices {
    /// Generator handle.
    pub generator: ScriptedGenerator,
    /// Validator handle.
    pub validator: TopicValidator,
    /// Engine handle.
    pub engine: FakeEngine,
    /// Graph service handle.
    pub graphs: FakeGraphs,
}

impl FakeServices {
    /// Compliant generator, approving validator, a 10-node engine.
    pub fn compliant() -> Self {
        Self {
            generator: ScriptedGenerator::compliant(),
            validator: TopicValidator::always(true),
            engine: FakeEngine::new(10),
            graphs: FakeGraphs::default(),
        }
    }

    /// Service bundle sharing state with these handles.
    pub fn services(&self) -> Services<FakeBackend> {
        Services::new(
            self.generator.clone(),
            self.validator.clone(),
            self.engine.clone(),
            self.graphs.clone(),
        )
    }
}

/// A draft of exactly `words` words ending in `Potency = <potency>`.
pub fn sentence(words: u32, potency: &str) -> String {
    let filler = words.saturating_sub(3);
    let mut parts: Vec<String> = (0..filler).map(|i| format!("point{i}")).collect();
    parts.push(format!("Potency = {potency}"));
    parts.join(" ")
}

/// A human message with no potency.
pub fn human_message(team: Team, text: &str) -> Message {
    Message {
        id: MessageId::new(),
        team,
        origin: MessageOrigin::Human,
        text: text.to_owned(),
        word_count: crate::potency::word_count(text),
        potency: None,
        accepted_at: Utc::now(),
    }
}

/// A graph of `nodes` nodes in a ring, alignments cycling Red, Blue, Neutral.
pub fn graph(nodes: u32) -> GraphData {
    let alignment = |i: u32| match i % 3 {
        0 => Alignment::Red,
        1 => Alignment::Blue,
        _ => Alignment::Neutral,
    };
    GraphData {
        nodes: (0..nodes)
            .map(|id| GraphNode {
                id,
                alignment: alignment(id),
                alienated: false,
                susceptibility: None,
                uncertainty: None,
            })
            .collect(),
        edges: (0..nodes)
            .map(|from| GraphEdge {
                from,
                to: from.saturating_add(1).checked_rem(nodes).unwrap_or(0),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GeneratorScript {
    queue: VecDeque<String>,
    fallback: Option<String>,
    failing: bool,
    calls: usize,
    last_prompt: Option<RenderedPrompt>,
    models: Vec<String>,
    gate: Option<Arc<Semaphore>>,
}

/// Generator that replays scripted drafts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator(Arc<Mutex<GeneratorScript>>);

impl ScriptedGenerator {
    /// Replay `drafts` in order, then fail with a protocol error.
    pub fn new(drafts: impl IntoIterator<Item = String>) -> Self {
        let script = GeneratorScript {
            queue: drafts.into_iter().collect(),
            ..GeneratorScript::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    /// Return `draft` forever.
    pub fn repeat(draft: String) -> Self {
        let script = GeneratorScript {
            fallback: Some(draft),
            ..GeneratorScript::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    /// Always return a 35-word draft with potency 0.55.
    pub fn compliant() -> Self {
        Self::repeat(sentence(35, "0.55"))
    }

    /// Fail every call with a transport error.
    pub fn failing() -> Self {
        let generator = Self::default();
        generator.set_failing(true);
        generator
    }

    /// Switch transport failures on or off.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.0).failing = failing;
    }

    /// Make every call wait for a permit on the returned semaphore.
    ///
    /// The semaphore starts with no permits, so calls hang until the test
    /// releases them one at a time.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        lock(&self.0).gate = Some(Arc::clone(&gate));
        gate
    }

    /// Queue drafts ahead of the fallback.
    pub fn push(&self, draft: String) {
        lock(&self.0).queue.push_back(draft);
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        lock(&self.0).calls
    }

    /// The prompt of the latest call.
    pub fn last_prompt(&self) -> Option<RenderedPrompt> {
        lock(&self.0).last_prompt.clone()
    }

    /// Model identifiers requested, in order.
    pub fn models(&self) -> Vec<String> {
        lock(&self.0).models.clone()
    }
}

impl GenerationService for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        let gate = lock(&self.0).gate.clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| ServiceError::Transport(e.to_string()))?
                .forget();
        }

        let mut script = lock(&self.0);
        script.calls = script.calls.saturating_add(1);
        script.last_prompt = Some(request.prompt.clone());
        script.models.push(request.model.to_owned());
        if script.failing {
            return Err(ServiceError::Transport(String::from("generator offline")));
        }
        match script.queue.pop_front() {
            Some(draft) => Ok(draft),
            None => script
                .fallback
                .clone()
                .ok_or_else(|| ServiceError::Protocol(String::from("script exhausted"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ValidatorScript {
    queue: VecDeque<bool>,
    fallback: bool,
    calls: usize,
    last_topic: Option<String>,
}

/// Validator that replays scripted verdicts.
#[derive(Debug, Clone, Default)]
pub struct TopicValidator(Arc<Mutex<ValidatorScript>>);

impl TopicValidator {
    /// Always answer `verdict`.
    pub fn always(verdict: bool) -> Self {
        let script = ValidatorScript {
            fallback: verdict,
            ..ValidatorScript::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    /// Answer `verdicts` in order, then `true`.
    pub fn sequence(verdicts: impl IntoIterator<Item = bool>) -> Self {
        let script = ValidatorScript {
            queue: verdicts.into_iter().collect(),
            fallback: true,
            ..ValidatorScript::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        lock(&self.0).calls
    }

    /// Topic of the latest call.
    pub fn last_topic(&self) -> Option<String> {
        lock(&self.0).last_topic.clone()
    }
}

impl ValidationService for TopicValidator {
    async fn validate(&self, _text: &str, topic: &str) -> Result<bool, ServiceError> {
        let mut script = lock(&self.0);
        script.calls = script.calls.saturating_add(1);
        script.last_topic = Some(topic.to_owned());
        let fallback = script.fallback;
        Ok(script.queue.pop_front().unwrap_or(fallback))
    }
}

// ---------------------------------------------------------------------------
// Simulation engine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EngineScript {
    nodes: u32,
    started: bool,
    steps: u64,
    polls: usize,
    restarts: usize,
    submitted: Vec<(Team, String)>,
    finish_after: Option<u64>,
    alienated: u32,
    fail_polls: bool,
    fail_steps: bool,
}

/// Engine that counts calls and reports a static graph.
#[derive(Debug, Clone)]
pub struct FakeEngine(Arc<Mutex<EngineScript>>);

impl FakeEngine {
    /// An engine over a graph of `nodes` nodes.
    pub fn new(nodes: u32) -> Self {
        Self(Arc::new(Mutex::new(EngineScript {
            nodes,
            ..EngineScript::default()
        })))
    }

    /// Report `Finished` once `steps` steps were taken.
    pub fn finish_after_steps(&self, steps: u64) {
        lock(&self.0).finish_after = Some(steps);
    }

    /// Mark the first `count` nodes alienated in poll results.
    pub fn set_alienated(&self, count: u32) {
        lock(&self.0).alienated = count;
    }

    /// Fail polls with a transport error.
    pub fn set_poll_failure(&self, failing: bool) {
        lock(&self.0).fail_polls = failing;
    }

    /// Fail steps with a transport error.
    pub fn set_step_failure(&self, failing: bool) {
        lock(&self.0).fail_steps = failing;
    }

    /// Whether `start` was called since the last restart.
    pub fn started(&self) -> bool {
        lock(&self.0).started
    }

    /// Steps taken since the last restart.
    pub fn steps(&self) -> u64 {
        lock(&self.0).steps
    }

    /// Polls received.
    pub fn polls(&self) -> usize {
        lock(&self.0).polls
    }

    /// Restarts received.
    pub fn restarts(&self) -> usize {
        lock(&self.0).restarts
    }

    /// Messages submitted, as `(team, text)`.
    pub fn submitted(&self) -> Vec<(Team, String)> {
        lock(&self.0).submitted.clone()
    }
}

impl SimulationEngine for FakeEngine {
    async fn start(&self) -> Result<(), ServiceError> {
        lock(&self.0).started = true;
        Ok(())
    }

    async fn submit_message(&self, message: &Message) -> Result<(), ServiceError> {
        lock(&self.0)
            .submitted
            .push((message.team, message.text.clone()));
        Ok(())
    }

    async fn step(&self) -> Result<(), ServiceError> {
        let mut script = lock(&self.0);
        if script.fail_steps {
            return Err(ServiceError::Transport(String::from("engine unreachable")));
        }
        script.steps = script.steps.saturating_add(1);
        Ok(())
    }

    async fn poll(&self) -> Result<PollResponse, ServiceError> {
        let mut script = lock(&self.0);
        script.polls = script.polls.saturating_add(1);
        if script.fail_polls {
            return Err(ServiceError::Transport(String::from("engine unreachable")));
        }

        let mut g = graph(script.nodes);
        let alienated = usize::try_from(script.alienated).unwrap_or(usize::MAX);
        for node in g.nodes.iter_mut().take(alienated) {
            node.alienated = true;
        }
        let status = match script.finish_after {
            Some(limit) if script.steps >= limit => EngineStatus::Finished,
            _ => EngineStatus::Running,
        };
        Ok(PollResponse {
            status,
            step: Some(script.steps),
            stats: Some(AlignmentStats::from_graph(&g)),
            graph: Some(g),
        })
    }

    async fn restart(&self) -> Result<GraphResponse, ServiceError> {
        let mut script = lock(&self.0);
        script.restarts = script.restarts.saturating_add(1);
        script.started = false;
        script.steps = 0;
        script.submitted.clear();
        let g = graph(script.nodes);
        Ok(GraphResponse {
            stats: AlignmentStats::from_graph(&g),
            graph: g,
        })
    }
}

// ---------------------------------------------------------------------------
// Graph generation
// ---------------------------------------------------------------------------

/// Graph service that builds [`graph`]s of the requested size.
#[derive(Debug, Clone, Default)]
pub struct FakeGraphs(Arc<Mutex<Vec<GraphRequest>>>);

impl FakeGraphs {
    /// Requests received, in order.
    pub fn requests(&self) -> Vec<GraphRequest> {
        lock(&self.0).clone()
    }
}

impl GraphService for FakeGraphs {
    async fn generate_graph(&self, request: &GraphRequest) -> Result<GraphResponse, ServiceError> {
        lock(&self.0).push(request.clone());
        let g = graph(request.nodes);
        Ok(GraphResponse {
            stats: AlignmentStats::from_graph(&g),
            graph: g,
        })
    }
}
