//! Shared application state for the Observer API server.
//!
//! [`AppState`] owns the one live [`DebateSession`] behind a mutex and a
//! [`SessionProjection`] of it for reads. Read endpoints only touch the
//! projection, so a dashboard refresh never waits on a generation in
//! flight. Regenerating the network or restarting swaps the session in
//! place and replaces the projection.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use clash_core::config::TeamConfig;
use clash_core::prompt::PromptEngine;
use clash_core::{
    AutoPlayControl, Backend, DebateConfig, DebateError, DebateSession, Services, SessionProjection,
};
use clash_types::{GraphRequest, SessionView};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState<B: Backend> {
    config: RwLock<DebateConfig>,
    services: Services<B>,
    prompts: Arc<PromptEngine>,
    session: Arc<Mutex<DebateSession<B>>>,
    projection: RwLock<SessionProjection>,
    autoplay: Arc<AutoPlayControl>,
}

impl<B: Backend> AppState<B> {
    /// Serve `session`, built from `config` and `services`.
    pub fn new(
        config: DebateConfig,
        services: Services<B>,
        prompts: Arc<PromptEngine>,
        session: DebateSession<B>,
    ) -> Self {
        let projection = session.projection();
        Self {
            config: RwLock::new(config),
            services,
            prompts,
            session: Arc::new(Mutex::new(session)),
            projection: RwLock::new(projection),
            autoplay: Arc::new(AutoPlayControl::new()),
        }
    }

    /// The live session.
    pub const fn session(&self) -> &Arc<Mutex<DebateSession<B>>> {
        &self.session
    }

    /// The autoplay flag.
    pub const fn autoplay(&self) -> &Arc<AutoPlayControl> {
        &self.autoplay
    }

    /// The dashboard view of the live session.
    pub async fn view(&self) -> SessionView {
        let projection = self.projection.read().await.clone();
        projection.view(&self.autoplay).await
    }

    /// The live session's results log as CSV, `None` when empty.
    pub async fn results_csv(&self) -> Option<String> {
        let projection = self.projection.read().await.clone();
        projection.results_csv().await
    }

    /// Generate a new network and replace the session with one on it.
    ///
    /// A team setup, when given, replaces that team's controller and topic
    /// for this and later sessions. On failure the current session is kept.
    pub async fn regenerate(
        &self,
        request: GraphRequest,
        red: Option<TeamConfig>,
        blue: Option<TeamConfig>,
    ) -> Result<(), DebateError> {
        let mut config = self.config.read().await.clone();
        if let Some(red) = red {
            config.teams.red = red;
        }
        if let Some(blue) = blue {
            config.teams.blue = blue;
        }
        self.pause_autoplay();
        let mut session = self.session.lock().await;
        let next =
            DebateSession::generate(&config, &self.services, Arc::clone(&self.prompts), request)
                .await?;
        self.replace(&mut session, next).await;
        *self.config.write().await = config;
        self.autoplay.clear_error();
        Ok(())
    }

    /// Restart the engine and replace the session with a fresh one.
    pub async fn restart(&self) -> Result<(), DebateError> {
        let config = self.config.read().await.clone();
        self.pause_autoplay();
        let mut session = self.session.lock().await;
        let next =
            DebateSession::restart(&config, &self.services, Arc::clone(&self.prompts)).await?;
        self.replace(&mut session, next).await;
        self.autoplay.clear_error();
        Ok(())
    }

    fn pause_autoplay(&self) {
        if self.autoplay.pause() {
            info!("autoplay paused for session replacement");
        }
    }

    async fn replace(&self, current: &mut DebateSession<B>, next: DebateSession<B>) {
        current.shutdown().await;
        *self.projection.write().await = next.projection();
        *current = next;
    }
}
