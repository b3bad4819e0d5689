//! Weight-based dynamic parimutuel pricing over a "pot".
//!
//! A bet's DPM weight is its claim on the other side of the pot. Winners get their stake back
//! plus their weight's share of the losing pot, less the fee. The phantom seed prices the pot
//! but is never paid out.

use serde::{Deserialize, Serialize};

use crate::core::types::{Bet, Outcome, Pool, Resolution};
use crate::error::PricingError;
use crate::pricing::fees::Fees;
use crate::pricing::pool::get_probability;

pub const MECHANISM: &str = "dpm-weight";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotContract {
    pub pot: Pool,
    /// Phantom part of the pot.
    #[serde(rename = "seedAmounts")]
    pub seed_amounts: Pool,
    #[serde(rename = "dpmWeights")]
    pub dpm_weights: Pool,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl PotContract {
    /// `pot` is the full seeded pot, `seed_amounts` the phantom part of it.
    pub fn new(pot: Pool, seed_amounts: Pool) -> Self {
        Self {
            pot,
            seed_amounts,
            dpm_weights: Pool::zero(),
            resolution: None,
        }
    }

    pub fn probability(&self) -> f64 {
        get_probability(&self.pot)
    }

    /// Stakes and ante on `outcome`, without the phantom seed.
    pub fn real_pot(&self, outcome: Outcome) -> f64 {
        self.pot.get(outcome) - self.seed_amounts.get(outcome)
    }
}

/// `amount * other² / (own² + amount * own)` against the pre-bet pot.
pub fn get_dpm_weight(pot: &Pool, amount: f64, outcome: Outcome) -> f64 {
    let (own, other) = pot.sides(outcome);
    (amount * other.powi(2)) / (own.powi(2) + amount * own)
}

/// Adds a bet to the pot, returning its weight.
pub fn apply_bet(contract: &mut PotContract, outcome: Outcome, amount: f64) -> f64 {
    let weight = get_dpm_weight(&contract.pot, amount, outcome);
    contract.pot = contract.pot.with_added(outcome, amount);
    contract.dpm_weights = contract.dpm_weights.with_added(outcome, weight);
    weight
}

fn standard_winnings(contract: &PotContract, bet: &Bet, outcome: Outcome, fees: &Fees) -> f64 {
    if bet.outcome != outcome {
        return 0.0;
    }
    let total_weight = contract.dpm_weights.get(outcome);
    if total_weight == 0.0 {
        return 0.0;
    }
    let losing_pot = contract.real_pot(outcome.opposite());
    bet.amount + fees.dpm_keep() * (bet.shares / total_weight) * losing_pot
}

pub fn calculate_winnings(
    contract: &PotContract,
    bet: &Bet,
    resolution: Resolution,
    fees: &Fees,
) -> Result<f64, PricingError> {
    match resolution {
        Resolution::Cancel => Ok(bet.amount),
        Resolution::Yes => Ok(standard_winnings(contract, bet, Outcome::Yes, fees)),
        Resolution::No => Ok(standard_winnings(contract, bet, Outcome::No, fees)),
        Resolution::Mkt => Err(PricingError::Unsupported {
            mechanism: MECHANISM,
            operation: "MKT resolution",
        }),
    }
}

pub fn current_value(contract: &PotContract, bet: &Bet, fees: &Fees) -> f64 {
    let p = contract.probability();
    p * standard_winnings(contract, bet, Outcome::Yes, fees)
        + (1.0 - p) * standard_winnings(contract, bet, Outcome::No, fees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpm_weight_example() {
        let pot = Pool { yes: 100.0, no: 100.0 };
        let weight = get_dpm_weight(&pot, 50.0, Outcome::Yes);
        assert!((weight - 500_000.0 / 15_000.0).abs() < 1e-9);
        // Weight excludes principal, pool shares include it.
        let shares = crate::pricing::pool::calculate_shares(&pot, 50.0, Outcome::Yes);
        assert!((shares - weight - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_winnings_draw_from_losing_pot() {
        let mut contract = PotContract::new(Pool { yes: 100.0, no: 100.0 }, Pool::zero());
        let w1 = apply_bet(&mut contract, Outcome::Yes, 50.0);
        let w2 = apply_bet(&mut contract, Outcome::Yes, 30.0);
        let no_w = apply_bet(&mut contract, Outcome::No, 10.0);
        let fees = Fees::default();

        let first = Bet::quote(Outcome::Yes, 50.0, w1);
        let second = Bet::quote(Outcome::Yes, 30.0, w2);
        let loser = Bet::quote(Outcome::No, 10.0, no_w);

        let a = calculate_winnings(&contract, &first, Resolution::Yes, &fees).unwrap();
        let b = calculate_winnings(&contract, &second, Resolution::Yes, &fees).unwrap();
        let profit = (a - 50.0) + (b - 30.0);
        assert!((profit - 0.98 * contract.pot.no).abs() < 1e-9);
        // Earlier bettor got the better price.
        assert!((a - 50.0) / 50.0 > (b - 30.0) / 30.0);

        assert_eq!(
            calculate_winnings(&contract, &loser, Resolution::Yes, &fees),
            Ok(0.0)
        );
        assert_eq!(
            calculate_winnings(&contract, &loser, Resolution::Cancel, &fees),
            Ok(10.0)
        );
    }

    #[test]
    fn test_phantom_seed_is_never_paid_out() {
        // 300 seeded at even odds, 200 of it phantom.
        let mut contract = PotContract::new(
            Pool { yes: 150.0, no: 150.0 },
            Pool { yes: 100.0, no: 100.0 },
        );
        let w = apply_bet(&mut contract, Outcome::Yes, 10.0);
        let bet = Bet::quote(Outcome::Yes, 10.0, w);

        let paid = calculate_winnings(&contract, &bet, Resolution::Yes, &Fees::default()).unwrap();
        assert!((paid - (10.0 + 0.98 * 50.0)).abs() < 1e-9);
        // Real money is the stake plus the 100 ante.
        assert!(paid <= 110.0);
    }

    #[test]
    fn test_no_weight_on_outcome_pays_nothing() {
        let contract = PotContract::new(Pool { yes: 100.0, no: 100.0 }, Pool::zero());
        let bet = Bet::quote(Outcome::No, 10.0, 5.0);
        assert_eq!(
            calculate_winnings(&contract, &bet, Resolution::No, &Fees::default()),
            Ok(0.0)
        );
    }

    #[test]
    fn test_current_value_mirrors() {
        let mut contract = PotContract::new(
            Pool { yes: 80.0, no: 120.0 },
            Pool { yes: 40.0, no: 60.0 },
        );
        let w = apply_bet(&mut contract, Outcome::Yes, 40.0);
        apply_bet(&mut contract, Outcome::No, 15.0);
        let bet = Bet::quote(Outcome::Yes, 40.0, w);

        let mirror = PotContract {
            pot: contract.pot.mirrored(),
            seed_amounts: contract.seed_amounts.mirrored(),
            dpm_weights: contract.dpm_weights.mirrored(),
            resolution: None,
        };
        let fees = Fees::default();
        let value = current_value(&contract, &bet, &fees);
        let mirrored = current_value(&mirror, &bet.mirrored(), &fees);
        assert!((value - mirrored).abs() < 1e-9);
        assert!(value > 0.0);
    }
}
