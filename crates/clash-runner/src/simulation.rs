//! HTTP client for the opinion-dynamics simulation service.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Reply |
//! |--------|------|------|-------|
//! | `POST` | `/generate_network` | graph request | `{graph, stats}` |
//! | `POST` | `/start_simulation` | -- | ignored |
//! | `POST` | `/message` | `{team, text, potency}` | ignored |
//! | `POST` | `/step` | -- | ignored |
//! | `GET` | `/get_update` | -- | `{status, current_step, data, stats}` |
//! | `GET` | `/restart_simulation` | -- | `{graph, stats}` |

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use clash_core::services::{
    EngineStatus, GraphService, PollResponse, ServiceError, SimulationEngine,
};
use clash_types::{AlignmentStats, GraphData, GraphRequest, GraphResponse, Message, Potency, Team};

/// Shared connection to the simulation service.
#[derive(Debug, Clone)]
pub struct SimulationClient {
    client: reqwest::Client,
    base_url: String,
}

impl SimulationClient {
    /// A client for the service at `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("GET /{path} failed: {e}")))?;
        decode(path, response).await
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ServiceError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("POST /{path} failed: {e}")))?;
        check_status(path, response).await
    }
}

async fn check_status(
    path: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned());
    Err(ServiceError::Transport(format!(
        "/{path} returned {status}: {body}"
    )))
}

async fn decode<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    check_status(path, response)
        .await?
        .json()
        .await
        .map_err(|e| ServiceError::Protocol(format!("/{path} reply parse failed: {e}")))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    team: Team,
    text: &'a str,
    potency: Option<Potency>,
}

#[derive(Debug, serde::Deserialize)]
struct UpdateBody {
    status: String,
    #[serde(default)]
    current_step: Option<u64>,
    #[serde(default)]
    data: Option<GraphData>,
    #[serde(default)]
    stats: Option<AlignmentStats>,
}

impl TryFrom<UpdateBody> for PollResponse {
    type Error = ServiceError;

    fn try_from(body: UpdateBody) -> Result<Self, Self::Error> {
        let status = match body.status.as_str() {
            "running" => EngineStatus::Running,
            "finished" => EngineStatus::Finished,
            "error" => EngineStatus::Error,
            other => {
                return Err(ServiceError::Protocol(format!(
                    "unknown simulation status {other:?}"
                )));
            }
        };
        Ok(Self {
            status,
            step: body.current_step,
            graph: body.data,
            stats: body.stats,
        })
    }
}

// ---------------------------------------------------------------------------
// Service implementations
// ---------------------------------------------------------------------------

/// [`SimulationEngine`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSimulationEngine(SimulationClient);

impl HttpSimulationEngine {
    /// Wrap a client.
    pub const fn new(client: SimulationClient) -> Self {
        Self(client)
    }
}

impl SimulationEngine for HttpSimulationEngine {
    async fn start(&self) -> Result<(), ServiceError> {
        self.0.post("start_simulation", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn submit_message(&self, message: &Message) -> Result<(), ServiceError> {
        let body = SubmitBody {
            team: message.team,
            text: &message.text,
            potency: message.potency,
        };
        self.0.post("message", &body).await?;
        debug!(team = %message.team, "message submitted to simulation");
        Ok(())
    }

    async fn step(&self) -> Result<(), ServiceError> {
        self.0.post("step", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn poll(&self) -> Result<PollResponse, ServiceError> {
        let body: UpdateBody = self.0.get("get_update").await?;
        PollResponse::try_from(body)
    }

    async fn restart(&self) -> Result<GraphResponse, ServiceError> {
        self.0.get("restart_simulation").await
    }
}

/// [`GraphService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGraphService(SimulationClient);

impl HttpGraphService {
    /// Wrap a client.
    pub const fn new(client: SimulationClient) -> Self {
        Self(client)
    }
}

impl GraphService for HttpGraphService {
    async fn generate_graph(&self, request: &GraphRequest) -> Result<GraphResponse, ServiceError> {
        let response = self.0.post("generate_network", request).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("/generate_network reply parse failed: {e}")))
    }
}
