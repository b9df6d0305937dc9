//! The resource ledger: two depleting counters and an append-only log.
//!
//! # Design
//!
//! - **Monotonic**: influence and energy never increase within a session.
//! - **Append-only**: every debit is recorded as a [`LedgerEntry`].
//! - **Precision**: energy uses [`Decimal`] with two places, no floats
//!   past the cost curve.

use rust_decimal::Decimal;
use tracing::{debug, info};

use clash_types::{LedgerReading, Potency, Team};

use crate::LedgerError;
use crate::policy::EnergyPolicy;

/// What a ledger entry debited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Energy spent by a message.
    Energy {
        /// The team whose message was charged.
        team: Team,
        /// The potency that drove the charge.
        potency: Potency,
    },
    /// Influence lost to alienated nodes.
    Influence {
        /// Alienated-node count reported by the simulation.
        alienated: u32,
    },
}

/// A single debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// What was debited.
    pub kind: EntryKind,
    /// Amount actually removed (after clamping at zero).
    pub amount: Decimal,
    /// Balance of the debited counter afterwards.
    pub balance_after: Decimal,
}

/// Influence and energy for one debate session.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    influence_max: u32,
    influence_remaining: u32,
    energy_budget: Decimal,
    energy_remaining: Decimal,
    policy: EnergyPolicy,
    entries: Vec<LedgerEntry>,
}

impl ResourceLedger {
    /// Create a ledger for a graph of `node_count` nodes.
    ///
    /// Influence starts at the node count and energy at `energy_budget`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidBudget`] for a negative budget.
    pub fn new(
        node_count: u32,
        energy_budget: Decimal,
        policy: EnergyPolicy,
    ) -> Result<Self, LedgerError> {
        if energy_budget.is_sign_negative() {
            return Err(LedgerError::InvalidBudget {
                budget: energy_budget,
            });
        }
        Ok(Self {
            influence_max: node_count,
            influence_remaining: node_count,
            energy_budget: energy_budget.round_dp(2),
            energy_remaining: energy_budget.round_dp(2),
            policy,
            entries: Vec::new(),
        })
    }

    /// Charge the energy cost of an accepted message.
    ///
    /// The charge depends on the [`EnergyPolicy`]; uncharged teams leave
    /// the ledger untouched and return `None`. Energy is clamped at zero.
    pub fn apply_potency(&mut self, team: Team, potency: Potency) -> Option<&LedgerEntry> {
        let cost = self.policy.cost(team, potency);
        if cost.is_zero() {
            debug!(team = %team, potency = %potency, "potency has no ledger effect");
            return None;
        }

        let amount = cost.min(self.energy_remaining);
        self.energy_remaining = self
            .energy_remaining
            .checked_sub(amount)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO);

        info!(
            team = %team,
            potency = %potency,
            cost = %cost,
            energy_remaining = %self.energy_remaining,
            "energy spent"
        );

        self.entries.push(LedgerEntry {
            kind: EntryKind::Energy { team, potency },
            amount,
            balance_after: self.energy_remaining,
        });
        self.entries.last()
    }

    /// Reduce influence to reflect `alienated` disengaged nodes.
    ///
    /// Influence is `node_count - alienated`, but never rises: a report
    /// with fewer alienated nodes than before leaves it unchanged.
    pub fn apply_alienation(&mut self, alienated: u32) -> Option<&LedgerEntry> {
        let target = self.influence_max.saturating_sub(alienated);
        if target >= self.influence_remaining {
            return None;
        }

        let lost = self.influence_remaining.saturating_sub(target);
        self.influence_remaining = target;

        debug!(
            alienated = alienated,
            influence_remaining = self.influence_remaining,
            "influence lost"
        );

        self.entries.push(LedgerEntry {
            kind: EntryKind::Influence { alienated },
            amount: Decimal::from(lost),
            balance_after: Decimal::from(self.influence_remaining),
        });
        self.entries.last()
    }

    /// Remaining influence.
    pub const fn influence_remaining(&self) -> u32 {
        self.influence_remaining
    }

    /// Remaining energy.
    pub const fn energy_remaining(&self) -> Decimal {
        self.energy_remaining
    }

    /// Whether the energy pool is spent.
    pub fn is_exhausted(&self) -> bool {
        self.energy_remaining <= Decimal::ZERO
    }

    /// The active energy policy.
    pub const fn policy(&self) -> EnergyPolicy {
        self.policy
    }

    /// All debits in order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// A consistent copy of both gauges.
    pub const fn reading(&self) -> LedgerReading {
        LedgerReading {
            influence_remaining: self.influence_remaining,
            influence_max: self.influence_max,
            energy_remaining: self.energy_remaining,
            energy_budget: self.energy_budget,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn potency(hundredths: u32) -> Potency {
        Potency::from_hundredths(hundredths).unwrap()
    }

    fn ledger(policy: EnergyPolicy) -> ResourceLedger {
        ResourceLedger::new(10, Decimal::from(70), policy).unwrap()
    }

    #[test]
    fn starts_full() {
        let reading = ledger(EnergyPolicy::BlueOnly).reading();
        assert_eq!(reading.influence_remaining, 10);
        assert_eq!(reading.influence_max, 10);
        assert_eq!(reading.energy_remaining, Decimal::from(70));
    }

    #[test]
    fn negative_budget_rejected() {
        let result = ResourceLedger::new(10, Decimal::from(-1), EnergyPolicy::BlueOnly);
        assert!(matches!(result, Err(LedgerError::InvalidBudget { .. })));
    }

    #[test]
    fn red_potency_is_free_by_default() {
        let mut l = ledger(EnergyPolicy::BlueOnly);
        assert!(l.apply_potency(Team::Red, potency(99)).is_none());
        assert_eq!(l.energy_remaining(), Decimal::from(70));
        assert!(l.entries().is_empty());
    }

    #[test]
    fn blue_potency_drains_energy() {
        let mut l = ledger(EnergyPolicy::BlueOnly);
        let entry = l.apply_potency(Team::Blue, potency(100)).cloned().unwrap();
        assert_eq!(entry.amount, Decimal::new(1253, 2));
        assert_eq!(l.energy_remaining(), Decimal::new(5747, 2));
    }

    #[test]
    fn energy_is_non_increasing_and_clamped() {
        let mut l = ledger(EnergyPolicy::Symmetric);
        let mut previous = l.energy_remaining();
        for i in 0..12 {
            let team = if i % 2 == 0 { Team::Red } else { Team::Blue };
            l.apply_potency(team, potency(97));
            assert!(l.energy_remaining() <= previous);
            previous = l.energy_remaining();
        }
        assert!(l.is_exhausted());
        assert_eq!(l.energy_remaining(), Decimal::ZERO);
    }

    #[test]
    fn influence_never_rises() {
        let mut l = ledger(EnergyPolicy::BlueOnly);
        assert!(l.apply_alienation(3).is_some());
        assert_eq!(l.influence_remaining(), 7);
        assert!(l.apply_alienation(1).is_none());
        assert_eq!(l.influence_remaining(), 7);
        l.apply_alienation(25);
        assert_eq!(l.influence_remaining(), 0);
    }

    #[test]
    fn entries_record_balances() {
        let mut l = ledger(EnergyPolicy::BlueOnly);
        l.apply_alienation(2);
        l.apply_potency(Team::Blue, potency(30));
        let balances: Vec<Decimal> = l.entries().iter().map(|e| e.balance_after).collect();
        assert_eq!(balances, vec![Decimal::from(8), Decimal::from(69)]);
    }
}
