//! Keeps the local [`SimulationSnapshot`] in step with the external engine.
//!
//! # Modes
//!
//! - **Single-shot**: after a manually driven turn, the sync polls once
//!   right after stepping the engine.
//! - **Interval**: while autoplay runs, a background task polls on a fixed
//!   period and the per-turn poll is skipped.
//!
//! Every engine call (submit, step, poll) goes through one async gate, so
//! at most one request is outstanding and the two modes can never advance
//! the engine twice for the same turn.
//!
//! # Terminal states
//!
//! Once a poll yields `Finished` the snapshot is frozen: further polls
//! return it without contacting the engine and steps are rejected.
//! Transport failures set the `Error` status and halt interval polling;
//! a later manual poll may recover.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use clash_types::{AlignmentStats, Message, SimulationSnapshot, SimulationStatus};

use crate::ledger::SharedLedger;
use crate::report::{ResultRow, ResultsLog};
use crate::services::{EngineStatus, PollResponse, ServiceError, SimulationEngine};

/// Errors raised by the simulation sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The run has finished; the engine is not contacted again.
    #[error("the simulation has finished")]
    Finished,

    /// A manual poll was requested while interval polling owns the engine.
    #[error("interval polling is active")]
    IntervalActive,

    /// The engine call failed.
    #[error("simulation engine call failed: {0}")]
    Engine(#[from] ServiceError),
}

/// State guarded by the engine gate.
#[derive(Debug, Default)]
struct Gate {
    /// Messages accepted so far.
    accepted: u32,
    /// Accepted messages not yet in the results log, with their ordinal.
    pending: Vec<(u32, Message)>,
}

/// Owner of the simulation snapshot.
pub struct SimulationSync<E: SimulationEngine> {
    engine: Arc<E>,
    ledger: SharedLedger,
    snapshot: watch::Sender<SimulationSnapshot>,
    gate: Mutex<Gate>,
    rows: ResultsLog,
    interval_active: AtomicBool,
    interval: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
}

impl<E: SimulationEngine> SimulationSync<E> {
    /// Create a sync starting from `initial`.
    pub fn new(
        engine: Arc<E>,
        ledger: SharedLedger,
        initial: SimulationSnapshot,
        period: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(initial);
        Self {
            engine,
            ledger,
            snapshot,
            gate: Mutex::new(Gate::default()),
            rows: ResultsLog::new(),
            interval_active: AtomicBool::new(false),
            interval: Mutex::new(None),
            period,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<SimulationSnapshot> {
        self.snapshot.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> SimulationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// The current status.
    pub fn status(&self) -> SimulationStatus {
        self.snapshot.borrow().status
    }

    /// Whether the run has finished.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether interval polling is on.
    pub fn is_interval_active(&self) -> bool {
        self.interval_active.load(Ordering::Acquire)
    }

    /// A handle on the results log.
    pub fn results_log(&self) -> ResultsLog {
        self.rows.clone()
    }

    /// A copy of the results log.
    pub async fn results(&self) -> Vec<ResultRow> {
        self.rows.rows().await
    }

    /// The results log as CSV, `None` when empty.
    pub async fn results_csv(&self) -> Option<String> {
        self.rows.csv().await
    }

    // -----------------------------------------------------------------------
    // Engine operations
    // -----------------------------------------------------------------------

    /// Start the engine and mark the snapshot running.
    pub async fn start(&self) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        if self.is_finished() {
            return Err(SyncError::Finished);
        }
        self.engine.start().await.map_err(|e| self.fail(e))?;
        self.replace_status(SimulationStatus::Running);
        info!("simulation started");
        Ok(())
    }

    /// Advance the engine by one step without fetching the result.
    pub async fn step(&self) -> Result<(), SyncError> {
        let _gate = self.gate.lock().await;
        self.step_gated().await
    }

    /// Feed an accepted message to the engine and advance it.
    ///
    /// In single-shot mode the engine is polled right after. It is also
    /// polled when the energy pool has just run dry, so the run finishes
    /// without waiting for the next interval tick.
    pub async fn on_message_accepted(&self, message: &Message) -> Result<(), SyncError> {
        {
            let mut gate = self.gate.lock().await;
            if self.is_finished() {
                return Err(SyncError::Finished);
            }
            gate.accepted = gate.accepted.saturating_add(1);
            let ordinal = gate.accepted;
            gate.pending.push((ordinal, message.clone()));

            self.engine
                .submit_message(message)
                .await
                .map_err(|e| self.fail(e))?;
            self.step_gated().await?;
        }

        if !self.is_interval_active() || self.ledger.is_exhausted().await {
            self.poll().await?;
        }
        Ok(())
    }

    /// Fetch the engine's status and replace the snapshot.
    ///
    /// A finished snapshot is returned as is, without an engine call.
    /// Every message accepted since the previous successful poll gets its
    /// own result row, carrying this poll's stats.
    pub async fn poll(&self) -> Result<SimulationSnapshot, SyncError> {
        let mut gate = self.gate.lock().await;
        let current = self.snapshot();
        if current.status.is_terminal() {
            return Ok(current);
        }

        let response = self.engine.poll().await.map_err(|e| self.fail(e))?;
        let next = match response.status {
            EngineStatus::Running => self.absorb(current, response).await,
            EngineStatus::Finished => {
                info!(step = ?response.step, "simulation reported finished");
                replace_from(current, response, SimulationStatus::Finished)
            }
            EngineStatus::Error => {
                warn!("simulation reported an error");
                replace_from(current, response, SimulationStatus::Error)
            }
        };

        if next.status != SimulationStatus::Error {
            self.flush_rows(&mut gate, &next.stats).await;
        }
        if next.status != SimulationStatus::Running {
            self.halt_interval();
        }
        self.snapshot.send_replace(next.clone());
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Interval polling
    // -----------------------------------------------------------------------

    /// Start polling every period in the background.
    ///
    /// A no-op when interval polling is already on.
    pub async fn start_interval(self: &Arc<Self>) {
        let mut slot = self.interval.lock().await;
        if self.interval_active.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(stale) = slot.take() {
            stale.abort();
        }

        let sync = Arc::clone(self);
        let period = self.period;
        *slot = Some(tokio::spawn(async move {
            let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !sync.is_interval_active() {
                    break;
                }
                match sync.poll().await {
                    Ok(snapshot) if snapshot.status == SimulationStatus::Running => {}
                    Ok(snapshot) => {
                        debug!(status = ?snapshot.status, "interval polling ended");
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "interval polling ended");
                        break;
                    }
                }
            }
        }));
        info!(period_ms = period.as_millis(), "interval polling started");
    }

    /// Stop interval polling and cancel the background task.
    pub async fn stop_interval(&self) {
        self.halt_interval();
        if let Some(handle) = self.interval.lock().await.take() {
            handle.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Step the engine. The caller holds the gate.
    async fn step_gated(&self) -> Result<(), SyncError> {
        if self.is_finished() {
            return Err(SyncError::Finished);
        }
        self.engine.step().await.map_err(|e| self.fail(e))?;
        debug!("simulation stepped");
        Ok(())
    }

    /// Fold a running poll into a new snapshot, update influence and apply
    /// the termination rules.
    async fn absorb(
        &self,
        current: SimulationSnapshot,
        response: PollResponse,
    ) -> SimulationSnapshot {
        let graph = response.graph.unwrap_or(current.graph);
        let stats = response
            .stats
            .unwrap_or_else(|| AlignmentStats::from_graph(&graph));
        let step = response.step.map_or(current.step, |s| s.max(current.step));

        self.ledger.apply_alienation(stats.alienated).await;
        let reading = self.ledger.reading().await;

        let energy_spent = reading.energy_remaining <= Decimal::ZERO;
        let all_alienated = stats.alienated_percentage >= 100.0;
        let status = if energy_spent || all_alienated {
            info!(energy_spent, all_alienated, step, "run finished");
            SimulationStatus::Finished
        } else {
            SimulationStatus::Running
        };

        SimulationSnapshot {
            step,
            status,
            graph,
            stats,
        }
    }

    /// Move pending messages into the results log. The caller holds the gate.
    async fn flush_rows(&self, gate: &mut Gate, stats: &AlignmentStats) {
        if gate.pending.is_empty() {
            return;
        }
        let reading = self.ledger.reading().await;
        let rows = gate
            .pending
            .drain(..)
            .map(|(ordinal, message)| ResultRow {
                turn: ordinal.div_ceil(2),
                team: Some(message.team),
                message: message.text,
                potency: message.potency,
                stats: stats.clone(),
                influence_remaining: reading.influence_remaining,
                energy_remaining: reading.energy_remaining,
            })
            .collect();
        self.rows.extend(rows).await;
    }

    /// Record a failed engine call: error status, interval halted.
    fn fail(&self, error: ServiceError) -> SyncError {
        warn!(error = %error, "simulation call failed");
        self.halt_interval();
        if !self.is_finished() {
            self.replace_status(SimulationStatus::Error);
        }
        SyncError::Engine(error)
    }

    fn halt_interval(&self) {
        if self.interval_active.swap(false, Ordering::AcqRel) {
            info!("interval polling halted");
        }
    }

    fn replace_status(&self, status: SimulationStatus) {
        let mut next = self.snapshot();
        next.status = status;
        self.snapshot.send_replace(next);
    }
}

/// Build a snapshot from a non-running poll, keeping what it omits.
fn replace_from(
    current: SimulationSnapshot,
    response: PollResponse,
    status: SimulationStatus,
) -> SimulationSnapshot {
    SimulationSnapshot {
        step: response.step.map_or(current.step, |s| s.max(current.step)),
        status,
        graph: response.graph.unwrap_or(current.graph),
        stats: response.stats.unwrap_or(current.stats),
    }
}
