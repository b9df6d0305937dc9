//! REST API endpoint handlers for the Observer server.
//!
//! Reads go through the session projection and never wait on a turn.
//! Control endpoints lock the session, run the operation to completion
//! and answer with the updated [`SessionView`]. A successful control
//! action clears the error left by a failed autoplay loop.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/session` | Dashboard view |
//! | `POST` | `/api/network` | Generate a network, start a new session |
//! | `POST` | `/api/session/start` | Start the engine and play Red's opening |
//! | `POST` | `/api/session/restart` | Restart the engine, start a new session |
//! | `POST` | `/api/turn/advance` | Play the active team's turn |
//! | `POST` | `/api/turn/human` | Submit a human-authored message |
//! | `POST` | `/api/autoplay/play` | Switch autoplay on |
//! | `POST` | `/api/autoplay/pause` | Switch autoplay off at the next turn boundary |
//! | `POST` | `/api/simulation/poll` | Poll the engine once |
//! | `GET` | `/api/results.csv` | Download logged rounds |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use tracing::info;

use clash_core::config::TeamConfig;
use clash_core::sync::SyncError;
use clash_core::{Backend, DebateError, run_autoplay};
use clash_types::{GraphRequest, SessionView, SimulationSnapshot, Team, TurnState};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Request body for `POST /api/network`.
///
/// Graph parameters sit at the top level; `red` and `blue` optionally
/// change a team's controller and topic.
#[derive(Debug, serde::Deserialize)]
pub struct NetworkRequest {
    /// Graph parameters.
    #[serde(flatten)]
    pub graph: GraphRequest,
    /// New Red setup.
    #[serde(default)]
    pub red: Option<TeamConfig>,
    /// New Blue setup.
    #[serde(default)]
    pub blue: Option<TeamConfig>,
}

/// Request body for `POST /api/turn/human`.
#[derive(Debug, serde::Deserialize)]
pub struct HumanMessageRequest {
    /// The team the message is for.
    pub team: Team,
    /// Message text, taken verbatim.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Current dashboard view.
pub async fn get_session<B: Backend>(State(state): State<Arc<AppState<B>>>) -> Json<SessionView> {
    Json(state.view().await)
}

/// Logged rounds as pipe-separated CSV.
pub async fn download_results<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let csv = state.results_csv().await;
    let csv = csv.ok_or_else(|| ObserverError::NotFound("Nothing to download".to_owned()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"results.csv\"",
            ),
        ],
        csv,
    ))
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Generate a new network and replace the session.
pub async fn generate_network<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Json(body): Json<NetworkRequest>,
) -> Result<Json<SessionView>, ObserverError> {
    state.regenerate(body.graph, body.red, body.blue).await?;
    Ok(Json(state.view().await))
}

/// Restart the engine and replace the session.
pub async fn restart_session<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<SessionView>, ObserverError> {
    state.restart().await?;
    Ok(Json(state.view().await))
}

/// Start the engine and play Red's opening move.
pub async fn start_session<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<SessionView>, ObserverError> {
    state.session().lock().await.start().await?;
    state.autoplay().clear_error();
    Ok(Json(state.view().await))
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// Play the active team's turn.
///
/// Rejected while autoplay drives the debate.
pub async fn advance_turn<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<SessionView>, ObserverError> {
    if state.autoplay().is_active() {
        return Err(DebateError::AutoplayActive.into());
    }
    state.session().lock().await.advance().await?;
    state.autoplay().clear_error();
    Ok(Json(state.view().await))
}

/// Submit a human message and wake a parked autoplay loop.
pub async fn submit_human_message<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Json(body): Json<HumanMessageRequest>,
) -> Result<Json<SessionView>, ObserverError> {
    state
        .session()
        .lock()
        .await
        .submit_human_message(body.team, &body.text)
        .await?;
    state.autoplay().clear_error();
    state.autoplay().human_input_arrived();
    Ok(Json(state.view().await))
}

// ---------------------------------------------------------------------------
// Autoplay
// ---------------------------------------------------------------------------

/// Switch autoplay on.
///
/// Only valid once the debate has started and before it has finished.
/// Idempotent while autoplay is already on. The loop runs detached; an
/// error that stops it is recorded on the autoplay control and shown in
/// the session view.
pub async fn play<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<SessionView>, ObserverError> {
    {
        let session = state.session().lock().await;
        match session.controller().state() {
            TurnState::Finished => return Err(DebateError::RunFinished.into()),
            TurnState::AwaitingFirstMove => {
                return Err(DebateError::InvalidState {
                    operation: "play",
                    state: TurnState::AwaitingFirstMove,
                }
                .into());
            }
            TurnState::RedTurn | TurnState::BlueTurn | TurnState::AwaitingHumanInput(_) => {}
        }
        if session.sync().is_finished() {
            return Err(DebateError::RunFinished.into());
        }
    }

    if let Some(generation) = state.autoplay().play() {
        info!(generation, "autoplay requested");
        tokio::spawn(run_autoplay(
            Arc::clone(state.session()),
            Arc::clone(state.autoplay()),
            generation,
        ));
    }
    Ok(Json(state.view().await))
}

/// Switch autoplay off. A turn in flight still completes.
pub async fn pause<B: Backend>(State(state): State<Arc<AppState<B>>>) -> Json<SessionView> {
    if state.autoplay().pause() {
        info!("autoplay pause requested");
    }
    Json(state.view().await)
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Poll the engine once. Rejected while autoplay polls on an interval.
pub async fn poll_simulation<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<SimulationSnapshot>, ObserverError> {
    if state.autoplay().is_active() {
        return Err(DebateError::Sync(SyncError::IntervalActive).into());
    }
    let snapshot = state.session().lock().await.poll().await?;
    Ok(Json(snapshot))
}
