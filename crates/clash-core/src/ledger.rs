//! Shared handle to a session's [`ResourceLedger`].
//!
//! The turn controller charges energy and the simulation sync reduces
//! influence, possibly from different tasks. Both go through this handle,
//! which serializes mutations behind an async `RwLock`. A reading is only
//! ever taken under the read lock, so no observer sees a half-applied
//! update.

use std::sync::Arc;

use tokio::sync::RwLock;

use clash_ledger::{LedgerEntry, ResourceLedger};
use clash_types::{LedgerReading, Potency, Team};

/// Cloneable, lock-protected ledger.
#[derive(Debug, Clone)]
pub struct SharedLedger(Arc<RwLock<ResourceLedger>>);

impl SharedLedger {
    /// Wrap a ledger.
    pub fn new(ledger: ResourceLedger) -> Self {
        Self(Arc::new(RwLock::new(ledger)))
    }

    /// Charge an accepted message's potency.
    pub async fn apply_potency(&self, team: Team, potency: Potency) -> Option<LedgerEntry> {
        self.0.write().await.apply_potency(team, potency).cloned()
    }

    /// Record the simulation's alienated-node count.
    pub async fn apply_alienation(&self, alienated: u32) -> Option<LedgerEntry> {
        self.0.write().await.apply_alienation(alienated).cloned()
    }

    /// A consistent copy of both gauges.
    pub async fn reading(&self) -> LedgerReading {
        self.0.read().await.reading()
    }

    /// Whether energy is spent.
    pub async fn is_exhausted(&self) -> bool {
        self.0.read().await.is_exhausted()
    }
}
