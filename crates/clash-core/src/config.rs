//! Configuration loading and typed config structures for a debate.
//!
//! The canonical configuration lives in `clash-config.yaml` at the project
//! root. Every section is optional; missing sections and fields fall back
//! to the defaults below, which encode the standard debate rules.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;

use clash_ledger::EnergyPolicy;
use clash_types::{ControllerKind, GraphRequest};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The values parsed but contradict each other.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level debate configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DebateConfig {
    /// Message constraints, retry budget, topics and energy.
    #[serde(default)]
    pub debate: DebateRules,

    /// Per-team controller and topic.
    #[serde(default)]
    pub teams: TeamsConfig,

    /// Parameters for the initial social graph.
    #[serde(default)]
    pub network: GraphRequest,

    /// Simulation polling.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// HTTP server binding.
    #[serde(default)]
    pub server: ServerConfig,

    /// Prompt template overrides.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

impl DebateConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are inconsistent.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.debate;
        if rules.word_min > rules.word_max {
            return Err(ConfigError::Invalid(format!(
                "debate.word_min ({}) exceeds debate.word_max ({})",
                rules.word_min, rules.word_max
            )));
        }
        if rules.max_attempts == 0 {
            return Err(ConfigError::Invalid(String::from(
                "debate.max_attempts must be at least 1",
            )));
        }
        if rules.energy_budget.is_sign_negative() {
            return Err(ConfigError::Invalid(String::from(
                "debate.energy_budget must not be negative",
            )));
        }
        if self.simulation.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "simulation.poll_interval_ms must be positive",
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Debate rules
// ---------------------------------------------------------------------------

/// Message constraints and resource settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DebateRules {
    /// Minimum words in a generated message (inclusive).
    #[serde(default = "default_word_min")]
    pub word_min: u32,

    /// Maximum words in a generated message (inclusive).
    #[serde(default = "default_word_max")]
    pub word_max: u32,

    /// Generation attempts per move before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Word cap on custom topics.
    #[serde(default = "default_topic_word_limit")]
    pub topic_word_limit: usize,

    /// Preset topics offered to the operator.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Starting energy.
    #[serde(default = "default_energy_budget")]
    pub energy_budget: Decimal,

    /// Which teams spend energy.
    #[serde(default)]
    pub energy_policy: EnergyPolicy,
}

impl Default for DebateRules {
    fn default() -> Self {
        Self {
            word_min: default_word_min(),
            word_max: default_word_max(),
            max_attempts: default_max_attempts(),
            topic_word_limit: default_topic_word_limit(),
            topics: default_topics(),
            energy_budget: default_energy_budget(),
            energy_policy: EnergyPolicy::default(),
        }
    }
}

const fn default_word_min() -> u32 {
    30
}

const fn default_word_max() -> u32 {
    40
}

const fn default_max_attempts() -> u32 {
    8
}

const fn default_topic_word_limit() -> usize {
    12
}

fn default_topics() -> Vec<String> {
    [
        "Social media does more harm than good",
        "Social media brings people together",
        "Remote work should be the default",
        "Offices are essential for good teamwork",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_energy_budget() -> Decimal {
    Decimal::from(70)
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Both teams.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamsConfig {
    /// The opening team.
    #[serde(default = "default_red")]
    pub red: TeamConfig,

    /// The responding team.
    #[serde(default = "default_blue")]
    pub blue: TeamConfig,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            red: default_red(),
            blue: default_blue(),
        }
    }
}

/// One team's controller and topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamConfig {
    /// `human` or a model identifier.
    pub controller: ControllerKind,

    /// A preset topic or free text.
    #[serde(default)]
    pub topic: String,
}

fn default_red() -> TeamConfig {
    TeamConfig {
        controller: ControllerKind::Model(String::from("gpt-4o-mini")),
        topic: String::from("Social media does more harm than good"),
    }
}

fn default_blue() -> TeamConfig {
    TeamConfig {
        controller: ControllerKind::Model(String::from("gemini-1.5-flash")),
        topic: String::from("Social media brings people together"),
    }
}

// ---------------------------------------------------------------------------
// Simulation, server, prompts
// ---------------------------------------------------------------------------

/// Simulation polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Interval polling period while autoplay runs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

/// HTTP server binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

/// Prompt template location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding `system.j2`, `first_move.j2`, `reply.j2` and
    /// `validation.j2`. The built-in templates are used when absent.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}
