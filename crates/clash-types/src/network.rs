//! Request and response types for the graph-generation service.
//!
//! Bounds on the request are declared with `validator` so the same rules
//! apply whether a request comes from the YAML config or the HTTP API.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::enums::TopologyKind;
use crate::structs::{AlignmentStats, GraphData};

/// Parameters for generating a new social graph.
///
/// Only the parameters relevant to `kind` are used by the service, but
/// all of them are range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct GraphRequest {
    /// Random-graph model.
    pub kind: TopologyKind,
    /// Number of nodes.
    #[validate(range(min = 1, max = 50))]
    pub nodes: u32,
    /// Spread of initial node uncertainty.
    #[validate(range(min = 0.0, max = 1.0))]
    pub uncertainty: f64,
    /// Erdos-Renyi edge probability.
    #[validate(range(min = 0.0, max = 1.0))]
    pub er_probability: f64,
    /// Barabasi-Albert edges per new node (at least one).
    #[validate(range(min = 1, max = 5))]
    pub ba_connections: u32,
    /// Watts-Strogatz ring neighbours.
    #[validate(range(max = 10))]
    pub ws_neighbours: u32,
    /// Watts-Strogatz rewiring probability.
    #[validate(range(min = 0.0, max = 1.0))]
    pub ws_rewire_probability: f64,
}

impl GraphRequest {
    /// Round the probability-like fields to two decimals, as the
    /// dashboard sliders do.
    #[must_use]
    pub fn rounded(mut self) -> Self {
        self.uncertainty = round_2dp(self.uncertainty);
        self.er_probability = round_2dp(self.er_probability);
        self
    }
}

impl Default for GraphRequest {
    fn default() -> Self {
        Self {
            kind: TopologyKind::ErdosRenyi,
            nodes: 10,
            uncertainty: 0.5,
            er_probability: 0.5,
            ba_connections: 2,
            ws_neighbours: 4,
            ws_rewire_probability: 0.1,
        }
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A freshly generated (or restarted) graph with its initial stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphResponse {
    /// The graph.
    pub graph: GraphData,
    /// Initial alignment stats.
    pub stats: AlignmentStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_is_valid() {
        assert!(GraphRequest::default().validate().is_ok());
    }

    #[test]
    fn node_count_bounds() {
        let too_many = GraphRequest {
            nodes: 51,
            ..GraphRequest::default()
        };
        assert!(too_many.validate().is_err());

        let none = GraphRequest {
            nodes: 0,
            ..GraphRequest::default()
        };
        assert!(none.validate().is_err());
    }

    #[test]
    fn barabasi_albert_needs_a_connection() {
        let request = GraphRequest {
            kind: TopologyKind::BarabasiAlbert,
            ba_connections: 0,
            ..GraphRequest::default()
        };
        let errors = request.validate().err().map(|e| e.field_errors().len());
        assert_eq!(errors, Some(1));
    }

    #[test]
    fn probabilities_are_bounded() {
        let request = GraphRequest {
            er_probability: 1.5,
            ws_rewire_probability: -0.1,
            ..GraphRequest::default()
        };
        let errors = request.validate().err().map(|e| e.field_errors().len());
        assert_eq!(errors, Some(2));
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        let request = GraphRequest {
            uncertainty: 0.456,
            er_probability: 0.123,
            ..GraphRequest::default()
        }
        .rounded();
        assert!((request.uncertainty - 0.46).abs() < 1e-9);
        assert!((request.er_probability - 0.12).abs() < 1e-9);
    }
}
