//! Constant-product market maker ("cpmm-1").
//!
//! Invariant: `k = YES^p * NO^(1-p)`. A YES bet of `b` mints `b` YES and `b` NO shares into the
//! pool and takes out as many YES shares as keeps `k` fixed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{Bet, Outcome, Pool, Resolution};
use crate::error::PricingError;
use crate::pricing::fees::{FeeSplit, Fees};

pub const MECHANISM: &str = "cpmm-1";

/// Each side of the pool must keep at least this many shares.
pub const MINIMUM_LIQUIDITY: f64 = 100.0;

const FEE_ITERATIONS: usize = 10;
const MAX_SEARCH_ITERATIONS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpmmState {
    pub pool: Pool,
    pub p: f64,
}

impl CpmmState {
    /// Equal pool of `ante` shares per side, priced at `initial_prob`.
    pub fn initial(initial_prob: f64, ante: f64) -> Result<Self, PricingError> {
        if !(initial_prob > 0.0 && initial_prob < 1.0) {
            return Err(PricingError::InvalidProbability(initial_prob));
        }
        Ok(Self {
            pool: Pool::new(ante, ante)?,
            p: initial_prob,
        })
    }

    pub fn probability(&self) -> f64 {
        get_cpmm_probability(&self.pool, self.p)
    }
}

pub fn get_cpmm_probability(pool: &Pool, p: f64) -> f64 {
    let Pool { yes, no } = *pool;
    (p * no) / ((1.0 - p) * yes + p * no)
}

/// Shares bought by `bet`, before any fee.
pub fn calculate_cpmm_shares(pool: &Pool, p: f64, bet: f64, outcome: Outcome) -> f64 {
    if bet == 0.0 {
        return 0.0;
    }
    let Pool { yes: y, no: n } = *pool;
    let k = y.powf(p) * n.powf(1.0 - p);

    match outcome {
        Outcome::Yes => y + bet - (k * (bet + n).powf(p - 1.0)).powf(1.0 / p),
        Outcome::No => n + bet - (k * (bet + y).powf(-p)).powf(1.0 / (1.0 - p)),
    }
}

pub fn get_cpmm_probability_after_bet_before_fees(
    state: &CpmmState,
    outcome: Outcome,
    bet: f64,
) -> f64 {
    let shares = calculate_cpmm_shares(&state.pool, state.p, bet, outcome);
    let Pool { yes: y, no: n } = state.pool;
    let new_pool = match outcome {
        Outcome::Yes => Pool {
            yes: y - shares + bet,
            no: n + bet,
        },
        Outcome::No => Pool {
            yes: y + bet,
            no: n - shares + bet,
        },
    };
    get_cpmm_probability(&new_pool, state.p)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpmmFees {
    pub remaining_bet: f64,
    pub total_fees: f64,
    pub fees: FeeSplit,
}

/// Taker fee on `bet`, iterated toward the average fill price net of the fee itself.
pub fn get_cpmm_fees(state: &CpmmState, bet: f64, outcome: Outcome, fees: &Fees) -> CpmmFees {
    let mut fee = 0.0;
    for _ in 0..FEE_ITERATIONS {
        let bet_after_fee = bet - fee;
        let shares = calculate_cpmm_shares(&state.pool, state.p, bet_after_fee, outcome);
        let average_prob = bet_after_fee / shares;
        fee = fees.taker_fee(shares, average_prob);
    }

    let total_fees = if bet == 0.0 { 0.0 } else { fee };
    CpmmFees {
        remaining_bet: bet - total_fees,
        total_fees,
        fees: fees.split(total_fees),
    }
}

pub fn calculate_cpmm_shares_after_fee(
    state: &CpmmState,
    bet: f64,
    outcome: Outcome,
    fees: &Fees,
) -> f64 {
    let CpmmFees { remaining_bet, .. } = get_cpmm_fees(state, bet, outcome, fees);
    calculate_cpmm_shares(&state.pool, state.p, remaining_bet, outcome)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpmmPurchase {
    pub shares: f64,
    pub new_pool: Pool,
    pub new_p: f64,
    pub fees: FeeSplit,
}

impl CpmmPurchase {
    pub fn new_state(&self) -> CpmmState {
        CpmmState {
            pool: self.new_pool,
            p: self.new_p,
        }
    }
}

pub fn calculate_cpmm_purchase(
    state: &CpmmState,
    bet: f64,
    outcome: Outcome,
    fees: &Fees,
) -> CpmmPurchase {
    let CpmmFees {
        remaining_bet,
        fees: split,
        ..
    } = get_cpmm_fees(state, bet, outcome, fees);

    let shares = calculate_cpmm_shares(&state.pool, state.p, remaining_bet, outcome);
    let Pool { yes: y, no: n } = state.pool;
    let post_bet_pool = match outcome {
        Outcome::Yes => Pool {
            yes: y - shares + remaining_bet,
            no: n + remaining_bet,
        },
        Outcome::No => Pool {
            yes: y + remaining_bet,
            no: n - shares + remaining_bet,
        },
    };

    // Liquidity fee goes back into the pool as fresh liquidity.
    let added = add_cpmm_liquidity(&post_bet_pool, state.p, split.liquidity_fee);

    CpmmPurchase {
        shares,
        new_pool: added.new_pool,
        new_p: added.new_p,
        fees: split,
    }
}

/// Probability of `outcome` itself after the bet, fees included.
pub fn get_cpmm_outcome_probability_after_bet(
    state: &CpmmState,
    outcome: Outcome,
    bet: f64,
    fees: &Fees,
) -> f64 {
    let purchase = calculate_cpmm_purchase(state, bet, outcome, fees);
    let p = get_cpmm_probability(&purchase.new_pool, purchase.new_p);
    match outcome {
        Outcome::Yes => p,
        Outcome::No => 1.0 - p,
    }
}

/// Amount to bet on `outcome` to move the YES probability to `prob`, before fees.
pub fn calculate_cpmm_amount_to_prob(state: &CpmmState, prob: f64, outcome: Outcome) -> f64 {
    if prob <= 0.0 || prob >= 1.0 || prob.is_nan() {
        return f64::INFINITY;
    }
    let prob = match outcome {
        Outcome::Yes => prob,
        Outcome::No => 1.0 - prob,
    };

    let CpmmState { pool, p } = *state;
    let Pool { yes: y, no: n } = pool;
    let k = y.powf(p) * n.powf(1.0 - p);

    match outcome {
        Outcome::Yes => {
            let r = (p * (prob - 1.0)) / ((p - 1.0) * prob);
            r.powf(-p) * (k - n * r.powf(p))
        }
        Outcome::No => {
            let r = ((1.0 - p) * (prob - 1.0)) / (-p * prob);
            r.powf(p - 1.0) * (k - y * r.powf(1.0 - p))
        }
    }
}

pub fn calculate_cpmm_amount_to_prob_including_fees(
    state: &CpmmState,
    prob: f64,
    outcome: Outcome,
    fees: &Fees,
) -> f64 {
    let amount = calculate_cpmm_amount_to_prob(state, prob, outcome);
    let shares = calculate_cpmm_shares(&state.pool, state.p, amount, outcome);
    let average_prob = amount / shares;
    amount + fees.taker_fee(shares, average_prob)
}

/// Closed form for the amount buying exactly `shares`, fee-free. Only valid at `p = 0.5`.
pub fn calculate_cpmm_amount_to_buy_shares_fixed_p(
    state: &CpmmState,
    shares: f64,
    outcome: Outcome,
) -> Result<f64, PricingError> {
    if (state.p - 0.5).abs() > 1e-9 {
        return Err(PricingError::Unsupported {
            mechanism: MECHANISM,
            operation: "fixed-p share quote with p != 0.5",
        });
    }
    let Pool { yes: y, no: n } = state.pool;
    let other = match outcome {
        Outcome::Yes => n,
        Outcome::No => y,
    };
    Ok((shares - y - n + (4.0 * other * shares + (y + n - shares).powi(2)).sqrt()) / 2.0)
}

/// Bisection over `[min, max]` for the root of an increasing `comparator`.
pub fn binary_search(mut min: f64, mut max: f64, comparator: impl Fn(f64) -> f64) -> f64 {
    let mut mid = min;
    for _ in 0..MAX_SEARCH_ITERATIONS {
        mid = min + (max - min) / 2.0;
        if mid == min || mid == max {
            break;
        }
        let comparison = comparator(mid);
        if comparison == 0.0 {
            break;
        } else if comparison > 0.0 {
            max = mid;
        } else {
            min = mid;
        }
    }
    mid
}

/// Amount of mana (fees included) that buys `shares` of `outcome`.
pub fn calculate_amount_to_buy_shares(
    state: &CpmmState,
    shares: f64,
    outcome: Outcome,
    fees: &Fees,
) -> f64 {
    let prob = state.probability();
    let min_amount = shares
        * match outcome {
            Outcome::Yes => prob,
            Outcome::No => 1.0 - prob,
        };

    // A share never costs less than the current price nor more than 1.
    binary_search(min_amount, shares, |amount| {
        calculate_cpmm_purchase(state, amount, outcome, fees).shares - shares
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpmmSale {
    pub sale_value: f64,
    pub buy_amount: f64,
    pub new_state: CpmmState,
    pub fees: FeeSplit,
}

/// Selling `shares` of `outcome` is buying as many shares of the opposite outcome and
/// redeeming each YES+NO pair for 1.
pub fn calculate_cpmm_sale(
    state: &CpmmState,
    shares: f64,
    outcome: Outcome,
    fees: &Fees,
) -> Result<CpmmSale, PricingError> {
    if shares.round() < 0.0 || !shares.is_finite() {
        return Err(PricingError::InvalidAmount(shares));
    }
    let opposite = outcome.opposite();
    let buy_amount = calculate_amount_to_buy_shares(state, shares, opposite, fees);
    let purchase = calculate_cpmm_purchase(state, buy_amount, opposite, fees);

    Ok(CpmmSale {
        sale_value: purchase.shares - buy_amount,
        buy_amount,
        new_state: purchase.new_state(),
        fees: purchase.fees,
    })
}

// ----------- Liquidity -----------------

pub fn get_cpmm_liquidity(pool: &Pool, p: f64) -> f64 {
    pool.yes.powf(p) * pool.no.powf(1.0 - p)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityChange {
    pub new_pool: Pool,
    pub liquidity: f64,
    pub new_p: f64,
}

/// Adds `amount` shares to both sides, re-solving `p` so the probability stays put.
pub fn add_cpmm_liquidity(pool: &Pool, p: f64, amount: f64) -> LiquidityChange {
    let prob = get_cpmm_probability(pool, p);

    let Pool { yes: y, no: n } = *pool;
    let numerator = prob * (amount + y);
    let denominator = amount - n * (prob - 1.0) + prob * y;
    let new_p = numerator / denominator;

    let new_pool = Pool {
        yes: y + amount,
        no: n + amount,
    };

    let old_liquidity = get_cpmm_liquidity(pool, new_p);
    let new_liquidity = get_cpmm_liquidity(&new_pool, new_p);

    LiquidityChange {
        new_pool,
        liquidity: new_liquidity - old_liquidity,
        new_p,
    }
}

pub fn remove_cpmm_liquidity(
    pool: &Pool,
    p: f64,
    amount: f64,
) -> Result<LiquidityChange, PricingError> {
    let change = add_cpmm_liquidity(pool, p, -amount);
    if change.new_pool.yes < MINIMUM_LIQUIDITY {
        return Err(PricingError::InsufficientLiquidity(Outcome::Yes));
    }
    if change.new_pool.no < MINIMUM_LIQUIDITY {
        return Err(PricingError::InsufficientLiquidity(Outcome::No));
    }
    Ok(change)
}

pub fn maximum_removable_liquidity(pool: &Pool) -> f64 {
    (pool.yes.min(pool.no) - MINIMUM_LIQUIDITY).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProvision {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub amount: f64,
    #[serde(rename = "createdTime")]
    pub created_time: i64,
}

/// Each provider's share of the pool. Net withdrawers count as zero rather than being clawed
/// back; if everyone is a net withdrawer the earliest provider owns it all.
pub fn get_cpmm_liquidity_pool_weights(
    liquidities: &[LiquidityProvision],
) -> BTreeMap<String, f64> {
    let mut by_user: BTreeMap<String, f64> = BTreeMap::new();
    for l in liquidities {
        *by_user.entry(l.user_id.clone()).or_insert(0.0) += l.amount;
    }
    for amount in by_user.values_mut() {
        *amount = amount.max(0.0);
    }

    let total: f64 = by_user.values().sum();
    if total == 0.0 {
        return liquidities
            .iter()
            .min_by_key(|l| l.created_time)
            .map(|first| BTreeMap::from([(first.user_id.clone(), 1.0)]))
            .unwrap_or_default();
    }

    by_user
        .into_iter()
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(user, amount)| (user, amount / total))
        .collect()
}

pub fn get_user_liquidity_shares(
    user_id: &str,
    pool: &Pool,
    liquidities: &[LiquidityProvision],
) -> Pool {
    let weight = get_cpmm_liquidity_pool_weights(liquidities)
        .get(user_id)
        .copied()
        .unwrap_or(0.0);
    Pool {
        yes: weight * pool.yes,
        no: weight * pool.no,
    }
}

// ----------- Payouts -----------------

/// Each winning share pays 1. `Mkt` pays the resolution probability per YES share.
pub fn calculate_fixed_payout(
    state: &CpmmState,
    bet: &Bet,
    resolution: Resolution,
    resolution_probability: Option<f64>,
) -> f64 {
    match resolution {
        Resolution::Cancel => bet.amount,
        Resolution::Mkt => {
            let p = resolution_probability.unwrap_or_else(|| state.probability());
            let bet_p = match bet.outcome {
                Outcome::Yes => p,
                Outcome::No => 1.0 - p,
            };
            bet_p * bet.shares
        }
        Resolution::Yes | Resolution::No => {
            if resolution.outcome() == Some(bet.outcome) {
                bet.shares
            } else {
                0.0
            }
        }
    }
}

pub fn current_value(state: &CpmmState, bet: &Bet) -> f64 {
    calculate_fixed_payout(state, bet, Resolution::Mkt, None)
}
