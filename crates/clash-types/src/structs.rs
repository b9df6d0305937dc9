//! Core entity structs for the Clash debate simulation.
//!
//! Everything the presentation layer reads is defined here so it can be
//! exported to `TypeScript` via `ts-rs`. Quantities that must keep two
//! exact decimals (potency, energy) use [`Decimal`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Alignment, MessageOrigin, SimulationStatus, Team, TurnState};
use crate::ids::{MessageId, SessionId};

// ---------------------------------------------------------------------------
// Potency
// ---------------------------------------------------------------------------

/// Self-assigned strength of a generated message.
///
/// Always carries exactly two decimal places and lies in the half-open
/// range `(0.10, 1.00]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "Decimal", into = "Decimal")]
#[ts(export, export_to = "bindings/")]
pub struct Potency(#[ts(as = "String")] Decimal);

impl Potency {
    /// Exclusive lower bound.
    pub const FLOOR: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
    /// Inclusive upper bound.
    pub const CEILING: Decimal = Decimal::from_parts(100, 0, 0, false, 2);

    /// Build a potency from hundredths (`73` is `0.73`).
    ///
    /// Returns `None` outside `(0.10, 1.00]`.
    pub fn from_hundredths(hundredths: u32) -> Option<Self> {
        Self::from_decimal(Decimal::new(i64::from(hundredths), 2))
    }

    /// Validate a decimal value.
    ///
    /// Returns `None` when the value is out of range or carries more than
    /// two decimal places.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        if value <= Self::FLOOR || value > Self::CEILING {
            return None;
        }
        if value.round_dp(2) != value {
            return None;
        }
        let mut normalized = value;
        normalized.rescale(2);
        Some(Self(normalized))
    }

    /// The underlying decimal value.
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Potency {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value).ok_or_else(|| format!("potency {value} outside (0.10, 1.00]"))
    }
}

impl From<Potency> for Decimal {
    fn from(potency: Potency) -> Self {
        potency.0
    }
}

impl core::fmt::Display for Potency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// An accepted debate message.
///
/// A `Message` only exists once accepted: rejected drafts never leave the
/// message pipeline. It is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// The team that argued it.
    pub team: Team,
    /// Generated or human-typed.
    pub origin: MessageOrigin,
    /// Full text as produced, including the potency marker.
    pub text: String,
    /// Whitespace-delimited word count of `text`.
    pub word_count: u32,
    /// Parsed potency. Absent only for human text without a marker.
    pub potency: Option<Potency>,
    /// When the message was accepted.
    pub accepted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

/// A node of the social graph as reported by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphNode {
    /// Node identifier, stable for the lifetime of a graph.
    pub id: u32,
    /// Current opinion.
    pub alignment: Alignment,
    /// Whether the node has disengaged from the debate.
    #[serde(default)]
    pub alienated: bool,
    /// How easily the node is persuaded, if reported.
    #[serde(default)]
    pub susceptibility: Option<f64>,
    /// How unsure the node is of its opinion, if reported.
    #[serde(default)]
    pub uncertainty: Option<f64>,
}

/// An undirected edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphEdge {
    /// One endpoint.
    pub from: u32,
    /// The other endpoint.
    pub to: u32,
}

/// Nodes and edges of the social graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphData {
    /// All nodes.
    pub nodes: Vec<GraphNode>,
    /// All edges. Static for the lifetime of a graph.
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    /// Number of nodes, saturating at `u32::MAX`.
    pub fn node_count(&self) -> u32 {
        u32::try_from(self.nodes.len()).unwrap_or(u32::MAX)
    }
}

/// Alignment counts and percentages over the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AlignmentStats {
    /// Nodes aligned with Red.
    pub red: u32,
    /// Nodes aligned with Blue.
    pub blue: u32,
    /// Nodes aligned with neither team.
    pub neutral: u32,
    /// Nodes marked alienated.
    pub alienated: u32,
    /// `red` as a percentage of all nodes.
    pub red_percentage: f64,
    /// `blue` as a percentage of all nodes.
    pub blue_percentage: f64,
    /// `neutral` as a percentage of all nodes.
    pub neutral_percentage: f64,
    /// `alienated` as a percentage of all nodes.
    pub alienated_percentage: f64,
}

impl AlignmentStats {
    /// Derive the stats from raw counts.
    ///
    /// Neutral is whatever is left of `total` after Red and Blue.
    /// Percentages are zero for an empty graph.
    pub fn from_counts(red: u32, blue: u32, alienated: u32, total: u32) -> Self {
        let neutral = total.saturating_sub(red).saturating_sub(blue);
        let pct = |count: u32| {
            if total == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(total) * 100.0
            }
        };
        Self {
            red,
            blue,
            neutral,
            alienated,
            red_percentage: pct(red),
            blue_percentage: pct(blue),
            neutral_percentage: pct(neutral),
            alienated_percentage: pct(alienated),
        }
    }

    /// Count alignments directly from a graph.
    pub fn from_graph(graph: &GraphData) -> Self {
        let mut red: u32 = 0;
        let mut blue: u32 = 0;
        let mut alienated: u32 = 0;
        for node in &graph.nodes {
            match node.alignment {
                Alignment::Red => red = red.saturating_add(1),
                Alignment::Blue => blue = blue.saturating_add(1),
                Alignment::Neutral => {}
            }
            if node.alienated {
                alienated = alienated.saturating_add(1);
            }
        }
        Self::from_counts(red, blue, alienated, graph.node_count())
    }

    /// Total population covered by these stats.
    pub const fn total(&self) -> u32 {
        self.red.saturating_add(self.blue).saturating_add(self.neutral)
    }
}

/// Latest view of the external simulation.
///
/// Replaced wholesale on every successful poll, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationSnapshot {
    /// Simulation step counter. Monotonic.
    pub step: u64,
    /// Run status.
    pub status: SimulationStatus,
    /// Current graph.
    pub graph: GraphData,
    /// Current alignment stats.
    pub stats: AlignmentStats,
}

impl SimulationSnapshot {
    /// An idle snapshot for a freshly generated graph.
    pub fn idle(graph: GraphData, stats: AlignmentStats) -> Self {
        Self {
            step: 0,
            status: SimulationStatus::Idle,
            graph,
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Projections for the presentation layer
// ---------------------------------------------------------------------------

/// Read-only copy of the resource ledger, taken after any mutation completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerReading {
    /// Remaining influence (un-alienated nodes).
    pub influence_remaining: u32,
    /// Influence at session start (node count).
    pub influence_max: u32,
    /// Remaining energy, two decimals.
    #[ts(as = "String")]
    pub energy_remaining: Decimal,
    /// Energy at session start.
    #[ts(as = "String")]
    pub energy_budget: Decimal,
}

/// One team's column in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TeamView {
    /// Which team.
    pub team: Team,
    /// `"human"` or the model identifier.
    pub controller: String,
    /// The topic the team argues for.
    pub topic: String,
    /// Accepted messages so far.
    pub turn_count: u32,
    /// Accepted messages in order.
    pub messages: Vec<Message>,
}

/// Which controls the dashboard should enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ControlState {
    /// The run can be started.
    pub can_start: bool,
    /// A manual next-turn is possible.
    pub can_advance: bool,
    /// Autoplay can be switched on.
    pub can_play: bool,
    /// Autoplay can be paused.
    pub can_pause: bool,
    /// The team whose human input is awaited, if any.
    pub awaiting_human: Option<Team>,
}

/// Turn-related part of the session projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TurnView {
    /// Current state.
    pub state: TurnState,
    /// Whether a generation call is in flight.
    pub generating: bool,
    /// Both teams, Red first.
    pub teams: Vec<TeamView>,
}

/// Everything the dashboard renders, as one consistent projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionView {
    /// Session identifier.
    pub session_id: SessionId,
    /// Turn indicator and message feeds.
    pub turn: TurnView,
    /// Influence and energy gauges.
    pub ledger: LedgerReading,
    /// Graph and stats.
    pub simulation: SimulationSnapshot,
    /// Control enablement.
    pub controls: ControlState,
    /// Why autoplay last stopped on an error, until the next successful
    /// control action.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn potency_range_is_half_open() {
        assert!(Potency::from_hundredths(10).is_none());
        assert!(Potency::from_hundredths(11).is_some());
        assert!(Potency::from_hundredths(100).is_some());
        assert!(Potency::from_hundredths(101).is_none());
    }

    #[test]
    fn potency_rejects_extra_precision() {
        assert!(Potency::from_decimal(Decimal::new(735, 3)).is_none());
        let p = Potency::from_decimal(Decimal::new(7, 1));
        assert_eq!(p.map(|p| p.to_string()), Some(String::from("0.70")));
    }

    #[test]
    fn potency_deserialization_validates() {
        let ok: Result<Potency, _> = serde_json::from_str("\"0.73\"");
        assert_eq!(ok.ok(), Potency::from_hundredths(73));
        let bad: Result<Potency, _> = serde_json::from_str("\"1.50\"");
        assert!(bad.is_err());
    }

    #[test]
    fn stats_from_counts() {
        let stats = AlignmentStats::from_counts(2, 3, 1, 10);
        assert_eq!(stats.neutral, 5);
        assert_eq!(stats.total(), 10);
        assert!((stats.blue_percentage - 30.0).abs() < f64::EPSILON);
        assert!((stats.alienated_percentage - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_for_empty_graph() {
        let stats = AlignmentStats::from_graph(&GraphData::default());
        assert_eq!(stats.total(), 0);
        assert!(stats.red_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn stats_from_graph_counts_alienation() {
        let graph = GraphData {
            nodes: vec![
                GraphNode {
                    id: 0,
                    alignment: Alignment::Red,
                    alienated: false,
                    susceptibility: None,
                    uncertainty: None,
                },
                GraphNode {
                    id: 1,
                    alignment: Alignment::Neutral,
                    alienated: true,
                    susceptibility: Some(0.4),
                    uncertainty: Some(0.2),
                },
            ],
            edges: vec![GraphEdge { from: 0, to: 1 }],
        };
        let stats = AlignmentStats::from_graph(&graph);
        assert_eq!(stats.red, 1);
        assert_eq!(stats.neutral, 1);
        assert_eq!(stats.alienated, 1);
    }
}
