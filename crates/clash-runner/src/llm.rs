//! LLM backends and model routing.
//!
//! Each backend speaks one vendor API over `reqwest`. [`LlmRouter`] picks
//! the backend from the model identifier: identifiers containing `gpt` go
//! to the `OpenAI`-compatible API, `claude` to Anthropic and `gemini` to
//! Google. Backends are plain structs behind an enum rather than trait
//! objects, since async methods are not dyn-compatible.

use tracing::debug;

use clash_core::prompt::RenderedPrompt;
use clash_core::services::{GenerationRequest, GenerationService, ServiceError};

use crate::config::{ApiConfig, RunnerConfig};

/// Sampling settings for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Debate moves: varied wording, room for 40 words and a potency marker.
pub const GENERATION_SAMPLING: Sampling = Sampling {
    temperature: 0.9,
    max_tokens: 150,
};

/// Validation verdicts: a single deterministic word.
pub const VALIDATION_SAMPLING: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 5,
};

// ---------------------------------------------------------------------------
// Model families
// ---------------------------------------------------------------------------

/// Vendor family a model identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// `OpenAI` GPT models.
    Gpt,
    /// Anthropic Claude models.
    Claude,
    /// Google Gemini models.
    Gemini,
}

impl ModelFamily {
    /// Classify a model identifier by substring.
    pub fn of(model: &str) -> Option<Self> {
        let model = model.to_ascii_lowercase();
        if model.contains("gpt") {
            Some(Self::Gpt)
        } else if model.contains("claude") {
            Some(Self::Claude)
        } else if model.contains("gemini") {
            Some(Self::Gemini)
        } else {
            None
        }
    }

    const fn key_var(self) -> &'static str {
        match self {
            Self::Gpt => "OPENAI_API_KEY",
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// One configured vendor API.
#[derive(Debug, Clone)]
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Gemini `generateContent` API.
    Gemini(GeminiBackend),
}

impl LlmBackend {
    /// Send a prompt to `model` and return the response text.
    pub async fn complete(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, ServiceError> {
        match self {
            Self::OpenAi(backend) => backend.complete(model, prompt, sampling).await,
            Self::Anthropic(backend) => backend.complete(model, prompt, sampling).await,
            Self::Gemini(backend) => backend.complete(model, prompt, sampling).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Gemini(_) => "gemini",
        }
    }
}

/// Connection details shared by every backend.
#[derive(Debug, Clone)]
struct Endpoint {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl Endpoint {
    fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            api_url: api.api_url.clone(),
            api_key: api.api_key.clone(),
        }
    }
}

/// Send a prepared request and decode a JSON body.
///
/// Connection failures and non-2xx statuses are transport errors; a body
/// that is not JSON is a protocol error.
async fn send_json(
    vendor: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(|e| ServiceError::Transport(format!("{vendor} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(ServiceError::Transport(format!(
            "{vendor} returned {status}: {error_body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ServiceError::Protocol(format!("{vendor} response parse failed: {e}")))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiBackend(Endpoint);

impl OpenAiBackend {
    /// Create a backend on a shared client.
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self(Endpoint::new(client, api))
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, ServiceError> {
        let endpoint = &self.0;
        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens
        });

        let request = endpoint
            .client
            .post(format!("{}/chat/completions", endpoint.api_url))
            .bearer_auth(&endpoint.api_key)
            .json(&body);

        extract_openai_content(&send_json("OpenAI", request).await?)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, ServiceError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            ServiceError::Protocol("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// The system prompt is a top-level field and the reply is at
/// `content[0].text`.
#[derive(Debug, Clone)]
pub struct AnthropicBackend(Endpoint);

impl AnthropicBackend {
    /// Create a backend on a shared client.
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self(Endpoint::new(client, api))
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, ServiceError> {
        let endpoint = &self.0;
        let body = serde_json::json!({
            "model": model,
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let request = endpoint
            .client
            .post(format!("{}/messages", endpoint.api_url))
            .header("x-api-key", &endpoint.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);

        extract_anthropic_content(&send_json("Anthropic", request).await?)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, ServiceError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            ServiceError::Protocol("Anthropic response missing content[0].text".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Gemini backend
// ---------------------------------------------------------------------------

/// Backend for the Gemini `generateContent` API.
///
/// The model is part of the path: `{api_url}/models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiBackend(Endpoint);

impl GeminiBackend {
    /// Create a backend on a shared client.
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self(Endpoint::new(client, api))
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, ServiceError> {
        let endpoint = &self.0;
        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": prompt.system}]},
            "contents": [
                {"role": "user", "parts": [{"text": prompt.user}]}
            ],
            "generationConfig": {
                "temperature": sampling.temperature,
                "maxOutputTokens": sampling.max_tokens
            }
        });

        let request = endpoint
            .client
            .post(format!(
                "{}/models/{model}:generateContent",
                endpoint.api_url
            ))
            .header("x-goog-api-key", &endpoint.api_key)
            .json(&body);

        extract_gemini_content(&send_json("Gemini", request).await?)
    }
}

/// Extract the text content from a Gemini response.
///
/// The first candidate's text parts are joined with newlines.
fn extract_gemini_content(json: &serde_json::Value) -> Result<String, ServiceError> {
    let parts: Vec<&str> = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(serde_json::Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        return Err(ServiceError::Protocol(
            "Gemini response missing candidates[0].content.parts[].text".to_owned(),
        ));
    }
    Ok(parts.join("\n"))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes each call to the backend serving the model's family.
#[derive(Debug, Clone, Default)]
pub struct LlmRouter {
    openai: Option<LlmBackend>,
    anthropic: Option<LlmBackend>,
    gemini: Option<LlmBackend>,
}

impl LlmRouter {
    /// Build a router with every backend that has a key configured.
    pub fn new(client: &reqwest::Client, config: &RunnerConfig) -> Self {
        Self {
            openai: config
                .openai
                .as_ref()
                .map(|api| LlmBackend::OpenAi(OpenAiBackend::new(client.clone(), api))),
            anthropic: config
                .anthropic
                .as_ref()
                .map(|api| LlmBackend::Anthropic(AnthropicBackend::new(client.clone(), api))),
            gemini: config
                .gemini
                .as_ref()
                .map(|api| LlmBackend::Gemini(GeminiBackend::new(client.clone(), api))),
        }
    }

    /// Names of the configured backends.
    pub fn configured(&self) -> Vec<&str> {
        [&self.openai, &self.anthropic, &self.gemini]
            .into_iter()
            .flatten()
            .map(LlmBackend::name)
            .collect()
    }

    /// The backend serving `model`.
    pub fn backend_for(&self, model: &str) -> Result<&LlmBackend, ServiceError> {
        let family = ModelFamily::of(model)
            .ok_or_else(|| ServiceError::UnsupportedModel(model.to_owned()))?;
        let backend = match family {
            ModelFamily::Gpt => self.openai.as_ref(),
            ModelFamily::Claude => self.anthropic.as_ref(),
            ModelFamily::Gemini => self.gemini.as_ref(),
        };
        backend.ok_or_else(|| {
            ServiceError::UnsupportedModel(format!("{model} ({} is not set)", family.key_var()))
        })
    }

    /// Complete a prompt on whichever backend serves `model`.
    pub async fn complete(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, ServiceError> {
        let backend = self.backend_for(model)?;
        debug!(model, backend = backend.name(), "LLM call");
        backend.complete(model, prompt, sampling).await
    }
}

impl GenerationService for LlmRouter {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        debug!(team = %request.team, model = request.model, "generating draft");
        self.complete(request.model, request.prompt, GENERATION_SAMPLING)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn api() -> ApiConfig {
        ApiConfig {
            api_url: "http://localhost:1".to_owned(),
            api_key: "test".to_owned(),
        }
    }

    fn openai_only() -> LlmRouter {
        LlmRouter {
            openai: Some(LlmBackend::OpenAi(OpenAiBackend::new(
                reqwest::Client::new(),
                &api(),
            ))),
            ..LlmRouter::default()
        }
    }

    #[test]
    fn families_by_substring() {
        assert_eq!(ModelFamily::of("gpt-4o-mini"), Some(ModelFamily::Gpt));
        assert_eq!(ModelFamily::of("claude-3-5-haiku"), Some(ModelFamily::Claude));
        assert_eq!(ModelFamily::of("gemini-1.5-flash"), Some(ModelFamily::Gemini));
        assert_eq!(ModelFamily::of("GPT-4"), Some(ModelFamily::Gpt));
        assert_eq!(ModelFamily::of("llama-3"), None);
    }

    #[test]
    fn routes_to_configured_backend() {
        let router = openai_only();
        assert_eq!(router.backend_for("gpt-4o-mini").unwrap().name(), "openai-compatible");
        assert_eq!(router.configured(), vec!["openai-compatible"]);
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let err = openai_only().backend_for("llama-3").err();
        assert!(matches!(err, Some(ServiceError::UnsupportedModel(m)) if m == "llama-3"));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = openai_only().backend_for("gemini-1.5-flash").err();
        assert!(
            matches!(err, Some(ServiceError::UnsupportedModel(m)) if m.contains("GEMINI_API_KEY"))
        );
    }

    #[test]
    fn extract_openai_content_valid() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "Screens isolate us. Potency = 0.64"}}]
        });
        assert_eq!(
            extract_openai_content(&json).unwrap(),
            "Screens isolate us. Potency = 0.64"
        );
    }

    #[test]
    fn extract_openai_content_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        assert!(matches!(
            extract_openai_content(&json),
            Err(ServiceError::Protocol(_))
        ));
    }

    #[test]
    fn extract_anthropic_content_valid() {
        let json = serde_json::json!({"content": [{"type": "text", "text": "True"}]});
        assert_eq!(extract_anthropic_content(&json).unwrap(), "True");
    }

    #[test]
    fn extract_anthropic_content_missing() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_content(&json).is_err());
    }

    #[test]
    fn extract_gemini_content_valid() {
        let json = serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Friends connect. Potency = 0.42"}]}}]
        });
        assert!(extract_gemini_content(&json).unwrap().ends_with("0.42"));
    }

    #[test]
    fn extract_gemini_content_joins_parts() {
        let json = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "First part."}, {"text": "Potency = 0.37"}]}}]
        });
        assert_eq!(
            extract_gemini_content(&json).unwrap(),
            "First part.\nPotency = 0.37"
        );
    }

    #[test]
    fn extract_gemini_content_blocked() {
        let json = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(extract_gemini_content(&json).is_err());
    }
}
