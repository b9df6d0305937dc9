//! Energy policies: which team's potency drains the energy pool, and how much.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use clash_types::{Potency, Team};

/// Exponent of the energy cost curve.
const COST_EXPONENT: f64 = 2.1;

/// Decides whether a team's accepted message costs energy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyPolicy {
    /// Only Blue spends energy. Red messages are free.
    #[default]
    BlueOnly,
    /// Both teams spend from the same pool.
    Symmetric,
}

impl EnergyPolicy {
    /// Whether `team` is charged under this policy.
    pub const fn charges(self, team: Team) -> bool {
        match self {
            Self::BlueOnly => matches!(team, Team::Blue),
            Self::Symmetric => true,
        }
    }

    /// Energy charged to `team` for a message of the given potency.
    ///
    /// Zero when the policy does not charge the team.
    pub fn cost(self, team: Team, potency: Potency) -> Decimal {
        if self.charges(team) {
            energy_cost(potency)
        } else {
            Decimal::ZERO
        }
    }
}

/// `(10 * potency / 3) ^ 2.1`, rounded to two decimals.
///
/// The curve is steep on purpose: a 1.00 message costs about 12.5 energy
/// while a 0.30 message costs about 1.
pub fn energy_cost(potency: Potency) -> Decimal {
    let p = potency.value().to_f64().unwrap_or(0.0);
    let raw = (10.0 * p / 3.0).powf(COST_EXPONENT);
    Decimal::from_f64(raw)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}
