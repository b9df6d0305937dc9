//! Runner configuration loaded from environment variables.
//!
//! Debate rules live in the YAML file named by `CLASH_CONFIG`; this module
//! only covers what differs between deployments: where the LLM APIs and the
//! simulation service are, and the keys to reach them.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::RunnerError;

/// Default YAML configuration path.
const DEFAULT_CONFIG_PATH: &str = "clash-config.yaml";
/// Default per-request timeout.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Complete runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the YAML debate configuration.
    pub config_path: PathBuf,
    /// `OpenAI`-compatible chat completions API, used for `gpt` models.
    pub openai: Option<ApiConfig>,
    /// Anthropic Messages API, used for `claude` models.
    pub anthropic: Option<ApiConfig>,
    /// Gemini `generateContent` API, used for `gemini` models.
    pub gemini: Option<ApiConfig>,
    /// Model asked to judge topical alignment.
    pub validation_model: String,
    /// Base URL of the simulation service.
    pub simulation_url: String,
    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
}

/// Where one LLM API lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base API URL, without a trailing slash.
    pub api_url: String,
    /// API key.
    pub api_key: String,
}

impl RunnerConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables:
    /// - `CLASH_CONFIG` -- YAML path (default `clash-config.yaml`)
    /// - `OPENAI_API_KEY`, `OPENAI_API_URL` (default `https://api.openai.com/v1`)
    /// - `ANTHROPIC_API_KEY`, `ANTHROPIC_API_URL` (default `https://api.anthropic.com/v1`)
    /// - `GEMINI_API_KEY`, `GEMINI_API_URL`
    ///   (default `https://generativelanguage.googleapis.com/v1beta`)
    /// - `VALIDATION_MODEL` -- default `gpt-4o-mini`
    /// - `SIMULATION_URL` -- default `http://localhost:5000`
    /// - `REQUEST_TIMEOUT_MS` -- default 30000
    ///
    /// A backend is enabled only when its key is set.
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RunnerError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_owned());

        let request_timeout_ms: u64 = var("REQUEST_TIMEOUT_MS", &DEFAULT_TIMEOUT_MS.to_string())
            .parse()
            .map_err(|e| RunnerError::Config(format!("invalid REQUEST_TIMEOUT_MS: {e}")))?;

        let config = Self {
            config_path: PathBuf::from(var("CLASH_CONFIG", DEFAULT_CONFIG_PATH)),
            openai: api_config(&lookup, "OPENAI", "https://api.openai.com/v1"),
            anthropic: api_config(&lookup, "ANTHROPIC", "https://api.anthropic.com/v1"),
            gemini: api_config(
                &lookup,
                "GEMINI",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            validation_model: var("VALIDATION_MODEL", "gpt-4o-mini"),
            simulation_url: trim_url(var("SIMULATION_URL", "http://localhost:5000")),
            request_timeout: Duration::from_millis(request_timeout_ms),
        };

        if config.openai.is_none() && config.anthropic.is_none() && config.gemini.is_none() {
            return Err(RunnerError::Config(
                "no LLM backend configured: set OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY"
                    .to_owned(),
            ));
        }
        Ok(config)
    }
}

/// Read `<PREFIX>_API_KEY` and `<PREFIX>_API_URL`.
fn api_config(
    lookup: &impl Fn(&str) -> Option<String>,
    prefix: &str,
    default_url: &str,
) -> Option<ApiConfig> {
    let api_key = lookup(&format!("{prefix}_API_KEY")).filter(|k| !k.trim().is_empty())?;
    let api_url = lookup(&format!("{prefix}_API_URL")).unwrap_or_else(|| default_url.to_owned());
    Some(ApiConfig {
        api_url: trim_url(api_url),
        api_key,
    })
}

fn trim_url(url: String) -> String {
    match url.strip_suffix('/') {
        Some(trimmed) => trimmed.to_owned(),
        None => url,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<RunnerConfig, RunnerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        RunnerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_one_key() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.config_path, PathBuf::from("clash-config.yaml"));
        assert_eq!(
            config.openai.as_ref().map(|a| a.api_url.as_str()),
            Some("https://api.openai.com/v1")
        );
        assert!(config.anthropic.is_none());
        assert!(config.gemini.is_none());
        assert_eq!(config.validation_model, "gpt-4o-mini");
        assert_eq!(config.simulation_url, "http://localhost:5000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn trailing_slashes_are_dropped() {
        let config = load(&[
            ("GEMINI_API_KEY", "g-test"),
            ("GEMINI_API_URL", "http://gemini.local/v1/"),
            ("SIMULATION_URL", "http://sim:9000/"),
        ])
        .unwrap();
        assert_eq!(config.gemini.unwrap().api_url, "http://gemini.local/v1");
        assert_eq!(config.simulation_url, "http://sim:9000");
    }

    #[test]
    fn blank_key_disables_backend() {
        let result = load(&[("ANTHROPIC_API_KEY", "  ")]);
        assert!(matches!(result, Err(RunnerError::Config(_))));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result = load(&[("OPENAI_API_KEY", "sk"), ("REQUEST_TIMEOUT_MS", "soon")]);
        let message = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("REQUEST_TIMEOUT_MS"));
    }
}
