//! Observer API server for the Clash debate simulation.
//!
//! An Axum HTTP server that is both the presentation projection and the
//! human-input boundary: it serves the session view, takes run, step and
//! pause commands, accepts human messages, regenerates the network and
//! exports the results log.
//!
//! # Architecture
//!
//! [`AppState`] holds the live session behind a mutex plus a lock-free
//! projection of it. Reads use the projection; controls lock the session
//! for the length of one operation. Autoplay runs as a spawned task that
//! takes the same lock once per turn.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
