//! Axum router construction for the Observer API.
//!
//! Assembles every route into a single [`Router`] with CORS enabled for
//! cross-origin dashboard access and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use clash_core::Backend;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Observer server.
///
/// See [`handlers`] for the endpoint table. CORS allows any origin.
pub fn build_router<B: Backend>(state: Arc<AppState<B>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Reads
        .route("/api/session", get(handlers::get_session::<B>))
        .route("/api/results.csv", get(handlers::download_results::<B>))
        // Session lifecycle
        .route("/api/network", post(handlers::generate_network::<B>))
        .route("/api/session/start", post(handlers::start_session::<B>))
        .route("/api/session/restart", post(handlers::restart_session::<B>))
        // Turns
        .route("/api/turn/advance", post(handlers::advance_turn::<B>))
        .route("/api/turn/human", post(handlers::submit_human_message::<B>))
        // Autoplay
        .route("/api/autoplay/play", post(handlers::play::<B>))
        .route("/api/autoplay/pause", post(handlers::pause::<B>))
        // Simulation
        .route("/api/simulation/poll", post(handlers::poll_simulation::<B>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
