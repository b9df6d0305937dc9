//! Error types for the Observer API server.
//!
//! [`ObserverError`] converts into an Axum response with a JSON body of
//! the form `{"error": "...", "status": 409}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use clash_core::DebateError;
use clash_core::services::ServiceError;
use clash_core::sync::SyncError;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A debate operation failed.
    #[error(transparent)]
    Debate(#[from] DebateError),
}

impl ObserverError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Debate(e) => debate_status(e),
        }
    }
}

const fn debate_status(error: &DebateError) -> StatusCode {
    match error {
        DebateError::InvalidState { .. }
        | DebateError::RunFinished
        | DebateError::AutoplayActive
        | DebateError::Sync(SyncError::Finished | SyncError::IntervalActive) => {
            StatusCode::CONFLICT
        }
        DebateError::Network(_)
        | DebateError::Topic(_)
        | DebateError::Transport(ServiceError::UnsupportedModel(_)) => StatusCode::BAD_REQUEST,
        DebateError::Transport(_)
        | DebateError::GenerationExhausted { .. }
        | DebateError::Potency(_)
        | DebateError::Sync(SyncError::Engine(_)) => StatusCode::BAD_GATEWAY,
        DebateError::Prompt(_) | DebateError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
