//! Server entry point for the Clash debate simulation.
//!
//! Wires the HTTP service clients into a debate session and serves the
//! observer API.
//!
//! # Architecture
//!
//! ```text
//! Observer API --> DebateSession --> LLM router (generation, validation)
//!                               \--> simulation service (graph, steps, polls)
//! ```

mod config;
mod error;
mod llm;
mod simulation;
mod validation;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clash_core::prompt::PromptEngine;
use clash_core::{Backend, DebateConfig, DebateSession, Services};
use clash_observer::{AppState, start_server};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::llm::LlmRouter;
use crate::simulation::{HttpGraphService, HttpSimulationEngine, SimulationClient};
use crate::validation::LlmValidator;

/// The production service bundle.
enum HttpBackend {}

impl Backend for HttpBackend {
    type Generator = LlmRouter;
    type Validator = LlmValidator;
    type Engine = HttpSimulationEngine;
    type Graphs = HttpGraphService;
}

/// Application entry point.
///
/// Initializes logging, loads the environment and YAML configuration,
/// generates the initial network and serves the observer API until the
/// process is terminated.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the initial network
/// cannot be generated, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("clash-runner starting");

    let settings = RunnerConfig::from_env()?;
    let config = load_debate_config(&settings)?;
    info!(
        config_path = %settings.config_path.display(),
        simulation_url = settings.simulation_url,
        validation_model = settings.validation_model,
        request_timeout_ms = settings.request_timeout.as_millis(),
        "configuration loaded"
    );

    let prompts = Arc::new(match &config.prompts.templates_dir {
        Some(dir) => {
            info!(templates_dir = %dir.display(), "loading prompt templates");
            PromptEngine::from_dir(dir)?
        }
        None => PromptEngine::builtin()?,
    });

    let client = reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .build()
        .map_err(RunnerError::from)?;

    let router = LlmRouter::new(&client, &settings);
    info!(backends = ?router.configured(), "LLM backends configured");
    if let Err(e) = router.backend_for(&settings.validation_model) {
        warn!(error = %e, "validation model is not routable; every draft will fail validation");
    }

    let validator = LlmValidator::new(
        router.clone(),
        settings.validation_model.clone(),
        Arc::clone(&prompts),
    );
    let simulation = SimulationClient::new(client, &settings.simulation_url);
    let services = Services::<HttpBackend>::new(
        router,
        validator,
        HttpSimulationEngine::new(simulation.clone()),
        HttpGraphService::new(simulation),
    );

    let session = DebateSession::generate(
        &config,
        &services,
        Arc::clone(&prompts),
        config.network.clone(),
    )
    .await
    .map_err(RunnerError::from)?;

    let server = config.server.clone();
    let state = Arc::new(AppState::new(config, services, prompts, session));
    start_server(&server, state).await.map_err(RunnerError::from)?;

    Ok(())
}

/// Load the YAML file, falling back to defaults when it does not exist.
fn load_debate_config(settings: &RunnerConfig) -> Result<DebateConfig, RunnerError> {
    if settings.config_path.exists() {
        return Ok(DebateConfig::from_file(&settings.config_path)?);
    }
    warn!(
        config_path = %settings.config_path.display(),
        "config file not found, using defaults"
    );
    Ok(DebateConfig::default())
}
