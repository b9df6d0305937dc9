//! Observer HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves the router
//! until the process ends.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use clash_core::Backend;
use clash_core::config::ServerConfig;

use crate::router::build_router;
use crate::state::AppState;

/// Start the Observer HTTP server.
///
/// # Errors
///
/// Returns an error if the address is malformed, the TCP listener cannot
/// bind, or the server hits a fatal I/O error.
pub async fn start_server<B: Backend>(
    config: &ServerConfig,
    state: Arc<AppState<B>>,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "observer server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    Ok(())
}

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
