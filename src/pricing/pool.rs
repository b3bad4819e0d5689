//! Pool-based dynamic parimutuel pricing.
//!
//! The implied probability is the ratio of squared stakes. A bettor's shares are fixed at bet
//! time from the pool as it stood before the bet; at resolution the winning side splits the
//! real (non-seed) pool pro rata to shares in excess of stake.

use serde::{Deserialize, Serialize};

use crate::core::types::{Bet, Outcome, Pool, Resolution};
use crate::error::PricingError;
use crate::pricing::fees::Fees;

pub const MECHANISM: &str = "dpm-pool";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolContract {
    pub pool: Pool,
    /// Phantom part of the seed. Never paid out.
    #[serde(rename = "startPool")]
    pub start_pool: Pool,
    #[serde(rename = "totalShares")]
    pub total_shares: Pool,
    #[serde(rename = "totalBets")]
    pub total_bets: Pool,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl PoolContract {
    pub fn new(seed: StartPool) -> Self {
        Self {
            pool: seed.pool,
            start_pool: seed.start,
            total_shares: Pool::zero(),
            total_bets: Pool::zero(),
            resolution: None,
        }
    }

    pub fn mirrored(&self) -> Self {
        Self {
            pool: self.pool.mirrored(),
            start_pool: self.start_pool.mirrored(),
            total_shares: self.total_shares.mirrored(),
            total_bets: self.total_bets.mirrored(),
            resolution: self.resolution,
        }
    }

    /// Stake and pool above the phantom seed.
    pub fn true_pool(&self) -> f64 {
        self.pool.total() - self.start_pool.total()
    }
}

/// `YES² / (YES² + NO²)`. An empty pool prices at even odds.
pub fn get_probability(pool: &Pool) -> f64 {
    let yes_sq = pool.yes.powi(2);
    let denominator = yes_sq + pool.no.powi(2);
    if denominator == 0.0 {
        return 0.5;
    }
    yes_sq / denominator
}

pub fn get_probability_after_bet(pool: &Pool, outcome: Outcome, bet: f64) -> f64 {
    get_probability(&pool.with_added(outcome, bet))
}

/// Shares bought by `bet`, principal included, against the pre-bet pool.
pub fn calculate_shares(pool: &Pool, bet: f64, outcome: Outcome) -> f64 {
    let (own, other) = pool.sides(outcome);
    bet + (bet * other.powi(2)) / (own.powi(2) + bet * own)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetInfo {
    pub shares: f64,
    pub new_pool: Pool,
    pub new_total_shares: Pool,
    pub new_total_bets: Pool,
    pub prob_before: f64,
    pub prob_after: f64,
}

pub fn get_new_bet_info(contract: &PoolContract, outcome: Outcome, amount: f64) -> BetInfo {
    let shares = calculate_shares(&contract.pool, amount, outcome);
    let new_pool = contract.pool.with_added(outcome, amount);
    BetInfo {
        shares,
        new_pool,
        new_total_shares: contract.total_shares.with_added(outcome, shares),
        new_total_bets: contract.total_bets.with_added(outcome, amount),
        prob_before: get_probability(&contract.pool),
        prob_after: get_probability(&new_pool),
    }
}

/// Payout of `bet` if the contract resolved to `outcome`.
pub fn calculate_standard_payout(
    contract: &PoolContract,
    bet: &Bet,
    outcome: Outcome,
    fees: &Fees,
) -> f64 {
    if bet.outcome != outcome {
        return 0.0;
    }
    let total_shares = contract.total_shares.get(outcome);
    if total_shares == 0.0 {
        return 0.0;
    }

    let true_pool = contract.true_pool();
    let total_bets = contract.total_bets.get(outcome);

    // Winners staked at least everything there is: refund pro rata, no fee.
    if total_bets >= true_pool {
        return bet.amount / total_bets * true_pool;
    }

    let total = total_shares - total_bets;
    let winnings_pool = true_pool - total_bets;
    bet.amount + fees.dpm_keep() * ((bet.shares - bet.amount) / total) * winnings_pool
}

pub fn calculate_payout(
    contract: &PoolContract,
    bet: &Bet,
    resolution: Resolution,
    fees: &Fees,
) -> Result<f64, PricingError> {
    match resolution {
        Resolution::Cancel => Ok(bet.amount),
        Resolution::Yes => Ok(calculate_standard_payout(contract, bet, Outcome::Yes, fees)),
        Resolution::No => Ok(calculate_standard_payout(contract, bet, Outcome::No, fees)),
        Resolution::Mkt => Err(PricingError::Unsupported {
            mechanism: MECHANISM,
            operation: "MKT resolution",
        }),
    }
}

pub fn resolved_payout(
    contract: &PoolContract,
    bet: &Bet,
    fees: &Fees,
) -> Result<f64, PricingError> {
    let resolution = contract.resolution.ok_or(PricingError::NotResolved)?;
    calculate_payout(contract, bet, resolution, fees)
}

/// Expected payout under the current implied probability.
pub fn current_value(contract: &PoolContract, bet: &Bet, fees: &Fees) -> f64 {
    let p = get_probability(&contract.pool);
    let yes_payout = calculate_standard_payout(contract, bet, Outcome::Yes, fees);
    let no_payout = calculate_standard_payout(contract, bet, Outcome::No, fees);
    p * yes_payout + (1.0 - p) * no_payout
}

/// Mana withdrawn from `outcome`'s pool by selling `shares`: the `b` solving
/// `calculate_shares(pool - b, b, outcome) = shares`.
pub fn calculate_share_value(pool: &Pool, shares: f64, outcome: Outcome) -> f64 {
    let (y, n) = pool.sides(outcome);
    let s = shares;
    let radicand = n.powi(4) + (s - y).powi(2) * y.powi(2) + 2.0 * n.powi(2) * y * (s + y);
    (n.powi(2) + s * y + y.powi(2) - radicand.sqrt()) / (2.0 * y)
}

/// Share value scaled by the pool's solvency ratio and capped at the side's own stake.
fn adjusted_share_value(contract: &PoolContract, bet: &Bet) -> f64 {
    let share_value = calculate_share_value(&contract.pool, bet.shares, bet.outcome);

    let p = get_probability(&contract.pool);
    let weighted_shares = p * contract.total_shares.yes + (1.0 - p) * contract.total_shares.no;
    let f = contract.true_pool() / weighted_shares;

    let my_pool = contract.pool.get(bet.outcome) - contract.start_pool.get(bet.outcome);
    (f.min(1.0) * share_value).min(my_pool)
}

/// Proceeds of selling `bet` back into the pool. Not clamped at zero.
pub fn calculate_sale_amount(contract: &PoolContract, bet: &Bet, fees: &Fees) -> f64 {
    fees.dpm_keep() * adjusted_share_value(contract, bet)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleInfo {
    pub share_value: f64,
    pub sale_amount: f64,
    pub fee: f64,
    pub new_pool: Pool,
    pub new_total_shares: Pool,
    pub new_total_bets: Pool,
    pub prob_before: f64,
    pub prob_after: f64,
}

pub fn get_sale_info(contract: &PoolContract, bet: &Bet, fees: &Fees) -> SaleInfo {
    let share_value = adjusted_share_value(contract, bet);
    let sale_amount = fees.dpm_keep() * share_value;
    let new_pool = contract.pool.with_added(bet.outcome, -share_value);

    SaleInfo {
        share_value,
        sale_amount,
        fee: share_value - sale_amount,
        new_pool,
        new_total_shares: contract.total_shares.with_added(bet.outcome, -bet.shares),
        new_total_bets: contract.total_bets.with_added(bet.outcome, -bet.amount),
        prob_before: get_probability(&contract.pool),
        prob_after: get_probability(&new_pool),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPool {
    /// Full seeded pool, ante included.
    pub pool: Pool,
    /// The phantom fraction of `pool`.
    pub start: Pool,
}

/// Seed pool of size `ante + phantom_ante` priced at `initial_prob`.
pub fn calc_start_pool(
    initial_prob: f64,
    ante: f64,
    phantom_ante: f64,
) -> Result<StartPool, PricingError> {
    if !(initial_prob > 0.0 && initial_prob < 1.0) {
        return Err(PricingError::InvalidProbability(initial_prob));
    }
    let total = ante + phantom_ante;
    if !(total > 0.0) || ante < 0.0 || phantom_ante < 0.0 {
        return Err(PricingError::InvalidAmount(total));
    }

    // Root of p(y² + (T - y)²) = y² that lies in [0, T].
    let p = initial_prob;
    let pool_yes = if p == 0.5 {
        p * total
    } else {
        total * (p - (p * (1.0 - p)).sqrt()) / (2.0 * p - 1.0)
    };
    let pool = Pool {
        yes: pool_yes,
        no: total - pool_yes,
    };

    let f = phantom_ante / total;
    Ok(StartPool {
        pool,
        start: Pool {
            yes: f * pool.yes,
            no: f * pool.no,
        },
    })
}
