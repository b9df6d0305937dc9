//! Influence and energy accounting for the Clash debate simulation.
//!
//! Two counters deplete over a session:
//!
//! - **Influence** starts at the graph's node count and drops as the
//!   simulation alienates nodes.
//! - **Energy** starts at a fixed budget and drops by
//!   `(10 * potency / 3) ^ 2.1` for every charged message.
//!
//! Neither counter ever increases. Which team's messages are charged is
//! decided by the [`EnergyPolicy`].
//!
//! # Usage
//!
//! ```
//! use clash_ledger::{EnergyPolicy, ResourceLedger};
//! use clash_types::{Potency, Team};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> Result<(), clash_ledger::LedgerError> {
//! let mut ledger = ResourceLedger::new(10, Decimal::from(70), EnergyPolicy::BlueOnly)?;
//! if let Some(potency) = Potency::from_hundredths(30) {
//!     ledger.apply_potency(Team::Blue, potency);
//! }
//! assert_eq!(ledger.energy_remaining(), Decimal::from(69));
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod policy;

pub use ledger::{EntryKind, LedgerEntry, ResourceLedger};
pub use policy::{EnergyPolicy, energy_cost};

use rust_decimal::Decimal;

/// Errors that can occur when building a ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The energy budget must not be negative.
    #[error("energy budget must not be negative, got {budget}")]
    InvalidBudget {
        /// The rejected budget.
        budget: Decimal,
    },
}
