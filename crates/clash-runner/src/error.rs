//! Error types for the runner binary.
//!
//! Service-level failures inside a debate surface as
//! [`clash_core::ServiceError`]; [`RunnerError`] only covers start-up.

/// Errors that stop the runner from starting.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// An environment variable is missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// The YAML debate configuration could not be loaded.
    #[error(transparent)]
    Settings(#[from] clash_core::ConfigError),

    /// Prompt templates failed to load.
    #[error(transparent)]
    Prompt(#[from] clash_core::prompt::PromptError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The initial session could not be created.
    #[error(transparent)]
    Debate(#[from] clash_core::DebateError),

    /// The observer server failed.
    #[error(transparent)]
    Server(#[from] clash_observer::ServerError),
}
