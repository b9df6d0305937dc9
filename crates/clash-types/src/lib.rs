//! Shared type definitions for the Clash debate simulation.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace. Types flow downstream to `TypeScript` via `ts-rs` for the
//! dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for sessions and messages
//! - [`enums`] -- Teams, alignments, controllers, turn and simulation states
//! - [`structs`] -- Messages, potency, graph snapshots, dashboard projections
//! - [`network`] -- Graph-generation request and response

pub mod enums;
pub mod ids;
pub mod network;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    Alignment, ControllerKind, MessageOrigin, SimulationStatus, Team, TopologyKind, TurnState,
    UnknownTeam,
};
pub use ids::{MessageId, SessionId};
pub use network::{GraphRequest, GraphResponse};
pub use structs::{
    AlignmentStats, ControlState, GraphData, GraphEdge, GraphNode, LedgerReading, Message,
    Potency, SessionView, SimulationSnapshot, TeamView, TurnView,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the bindings to `bindings/` relative to the crate
        // root when `export_all` is called.
        use ts_rs::TS;

        let _ = crate::ids::SessionId::export_all();
        let _ = crate::ids::MessageId::export_all();

        let _ = crate::enums::Team::export_all();
        let _ = crate::enums::Alignment::export_all();
        let _ = crate::enums::MessageOrigin::export_all();
        let _ = crate::enums::TurnState::export_all();
        let _ = crate::enums::SimulationStatus::export_all();
        let _ = crate::enums::TopologyKind::export_all();

        let _ = crate::structs::Potency::export_all();
        let _ = crate::structs::Message::export_all();
        let _ = crate::structs::SimulationSnapshot::export_all();
        let _ = crate::structs::SessionView::export_all();

        let _ = crate::network::GraphRequest::export_all();
        let _ = crate::network::GraphResponse::export_all();
    }
}
