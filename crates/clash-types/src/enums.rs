//! Enumeration types for the Clash debate simulation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Teams and alignment
// ---------------------------------------------------------------------------

/// One of the two debating teams.
///
/// Red always opens the debate; turns then strictly alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Team {
    /// The opening team.
    Red,
    /// The responding team. Its potency drains Energy by default.
    Blue,
}

impl Team {
    /// Both teams in turn order.
    pub const ALL: [Self; 2] = [Self::Red, Self::Blue];

    /// The team that argues against this one.
    pub const fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// Capitalised display name (`"Red"` / `"Blue"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Blue => "Blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a team name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTeam(pub String);

impl fmt::Display for UnknownTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown team: {}", self.0)
    }
}

impl std::error::Error for UnknownTeam {}

impl FromStr for Team {
    type Err = UnknownTeam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            other => Err(UnknownTeam(other.to_owned())),
        }
    }
}

/// Opinion held by a node of the social graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Alignment {
    /// Persuaded by the Red team.
    Red,
    /// Persuaded by the Blue team.
    Blue,
    /// Not yet persuaded by either side.
    Neutral,
}

impl From<Team> for Alignment {
    fn from(team: Team) -> Self {
        match team {
            Team::Red => Self::Red,
            Team::Blue => Self::Blue,
        }
    }
}

// ---------------------------------------------------------------------------
// Controllers
// ---------------------------------------------------------------------------

/// Who produces a team's messages.
///
/// Configured as the literal `"human"` (or `"user"`) or as a model
/// identifier such as `gpt-4o-mini`. Display names offered by the
/// dashboard ("ChatGPT 4o Mini", "Gemini 1.5 Flash") are accepted and
/// mapped to their identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControllerKind {
    /// Messages are typed by a person through the human-input boundary.
    Human,
    /// Messages are produced by the named generation model.
    Model(String),
}

impl ControllerKind {
    /// Whether this team waits for human input.
    pub const fn is_human(&self) -> bool {
        matches!(self, Self::Human)
    }

    /// The model identifier, if generated.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Human => None,
            Self::Model(id) => Some(id),
        }
    }
}

/// Map dashboard display names to model identifiers.
fn model_identifier(name: &str) -> &str {
    match name {
        "Gemini 1.0 Pro" => "gemini-1.0-pro",
        "Gemini 1.5 Flash" => "gemini-1.5-flash",
        "ChatGPT 4o Mini" => "gpt-4o-mini",
        other => other,
    }
}

impl From<String> for ControllerKind {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("human") || trimmed.eq_ignore_ascii_case("user") {
            Self::Human
        } else {
            Self::Model(model_identifier(trimmed).to_owned())
        }
    }
}

impl From<ControllerKind> for String {
    fn from(kind: ControllerKind) -> Self {
        match kind {
            ControllerKind::Human => Self::from("human"),
            ControllerKind::Model(id) => id,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => f.write_str("human"),
            Self::Model(id) => f.write_str(id),
        }
    }
}

/// How a message entered the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MessageOrigin {
    /// Produced by a model and passed the constraint pipeline.
    Generated,
    /// Submitted verbatim by a person. No constraints applied.
    Human,
}

// ---------------------------------------------------------------------------
// Turn state machine
// ---------------------------------------------------------------------------

/// The turn controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "state", content = "team")]
#[ts(export, export_to = "bindings/")]
pub enum TurnState {
    /// Session created, `start()` not yet called.
    AwaitingFirstMove,
    /// Red holds the turn and is model-controlled.
    RedTurn,
    /// Blue holds the turn and is model-controlled.
    BlueTurn,
    /// The named team holds the turn and waits for a human submission.
    AwaitingHumanInput(Team),
    /// The simulation reported completion. Terminal.
    Finished,
}

impl TurnState {
    /// The team holding the turn, if any.
    pub const fn active_team(self) -> Option<Team> {
        match self {
            Self::RedTurn => Some(Team::Red),
            Self::BlueTurn => Some(Team::Blue),
            Self::AwaitingHumanInput(team) => Some(team),
            Self::AwaitingFirstMove | Self::Finished => None,
        }
    }

    /// Whether the state accepts no further moves.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Status of the external opinion-dynamics simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SimulationStatus {
    /// Graph generated, no step taken yet.
    Idle,
    /// Advancing and being polled.
    Running,
    /// Completed. Terminal: no further advancement is accepted.
    Finished,
    /// The last poll failed. Automatic polling is halted.
    Error,
}

impl SimulationStatus {
    /// Whether a snapshot in this status is terminal.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Random-graph model used by the graph-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TopologyKind {
    /// Erdos-Renyi: every edge exists with a fixed probability.
    ErdosRenyi,
    /// Barabasi-Albert: preferential attachment.
    BarabasiAlbert,
    /// Watts-Strogatz: rewired ring lattice.
    WattsStrogatz,
}

impl TopologyKind {
    /// Wire name understood by the graph service.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ErdosRenyi => "erdos_renyi",
            Self::BarabasiAlbert => "barabasi_albert",
            Self::WattsStrogatz => "watts_strogatz",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_alternates() {
        assert_eq!(Team::Red.opponent(), Team::Blue);
        assert_eq!(Team::Blue.opponent(), Team::Red);
    }

    #[test]
    fn team_parses_case_insensitively() {
        assert_eq!("red".parse::<Team>().ok(), Some(Team::Red));
        assert_eq!(" BLUE ".parse::<Team>().ok(), Some(Team::Blue));
        assert!("green".parse::<Team>().is_err());
    }

    #[test]
    fn controller_from_config_string() {
        assert_eq!(ControllerKind::from(String::from("User")), ControllerKind::Human);
        assert_eq!(
            ControllerKind::from(String::from("ChatGPT 4o Mini")),
            ControllerKind::Model(String::from("gpt-4o-mini"))
        );
        assert_eq!(
            ControllerKind::from(String::from("gemini-1.5-flash")).model(),
            Some("gemini-1.5-flash")
        );
    }

    #[test]
    fn turn_state_serializes_tagged() {
        let json = serde_json::to_value(TurnState::AwaitingHumanInput(Team::Blue))
            .unwrap_or_default();
        assert_eq!(json["state"], "AwaitingHumanInput");
        assert_eq!(json["team"], "Blue");
    }

    #[test]
    fn only_finished_is_terminal() {
        assert!(SimulationStatus::Finished.is_terminal());
        assert!(!SimulationStatus::Error.is_terminal());
        assert!(TurnState::Finished.is_terminal());
        assert_eq!(TurnState::AwaitingFirstMove.active_team(), None);
    }

    #[test]
    fn topology_wire_names() {
        let json = serde_json::to_string(&TopologyKind::WattsStrogatz).unwrap_or_default();
        assert_eq!(json, "\"watts_strogatz\"");
        assert_eq!(TopologyKind::ErdosRenyi.as_str(), "erdos_renyi");
    }
}
