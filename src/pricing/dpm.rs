//! Share-based dynamic parimutuel pricing ("dpm-2").
//!
//! Shares are issued so that the Euclidean norm of the outstanding share vector grows by exactly
//! the mana bet. Probability is the squared-share ratio; payouts split the whole pool across
//! winning shares net of the phantom seed shares.

use serde::{Deserialize, Serialize};

use crate::core::types::{Bet, Outcome, Pool, Resolution};
use crate::error::PricingError;
use crate::pricing::fees::Fees;

pub const MECHANISM: &str = "dpm-2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpmContract {
    pub pool: Pool,
    #[serde(rename = "totalShares")]
    pub total_shares: Pool,
    #[serde(rename = "totalBets")]
    pub total_bets: Pool,
    #[serde(rename = "phantomShares", default)]
    pub phantom_shares: Option<Pool>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(rename = "resolutionProbability", default)]
    pub resolution_probability: Option<f64>,
}

impl DpmContract {
    pub fn new(initial: &DpmInitialPool) -> Self {
        let pool = Pool {
            yes: initial.pool_yes,
            no: initial.pool_no,
        };
        Self {
            pool,
            total_shares: Pool {
                yes: initial.shares_yes,
                no: initial.shares_no,
            },
            total_bets: pool,
            phantom_shares: Some(Pool {
                yes: initial.phantom_yes,
                no: initial.phantom_no,
            }),
            resolution: None,
            resolution_probability: None,
        }
    }

    fn phantom(&self, outcome: Outcome) -> f64 {
        self.phantom_shares.map_or(0.0, |p| p.get(outcome))
    }
}

pub fn get_dpm_outcome_probability(total_shares: &Pool, outcome: Outcome) -> f64 {
    let square_sum = total_shares.yes.powi(2) + total_shares.no.powi(2);
    if square_sum == 0.0 {
        return 0.5;
    }
    total_shares.get(outcome).powi(2) / square_sum
}

pub fn get_dpm_probability(total_shares: &Pool) -> f64 {
    get_dpm_outcome_probability(total_shares, Outcome::Yes)
}

pub fn calculate_dpm_shares(total_shares: &Pool, bet: f64, outcome: Outcome) -> f64 {
    let square_sum = total_shares.yes.powi(2) + total_shares.no.powi(2);
    let shares = total_shares.get(outcome);
    let c = 2.0 * bet * square_sum.sqrt();
    (bet.powi(2) + shares.powi(2) + c).sqrt() - shares
}

pub fn get_dpm_outcome_probability_after_bet(
    total_shares: &Pool,
    outcome: Outcome,
    bet: f64,
) -> f64 {
    let shares = calculate_dpm_shares(total_shares, bet, outcome);
    get_dpm_outcome_probability(&total_shares.with_added(outcome, shares), outcome)
}

/// YES probability once `shares` of `outcome` are removed.
pub fn get_dpm_probability_after_sale(total_shares: &Pool, outcome: Outcome, shares: f64) -> f64 {
    get_dpm_probability(&total_shares.with_added(outcome, -shares))
}

/// Drop in the share-vector norm when `shares` of `outcome` are removed.
pub fn calculate_dpm_raw_share_value(total_shares: &Pool, shares: f64, outcome: Outcome) -> f64 {
    let current = (total_shares.yes.powi(2) + total_shares.no.powi(2)).sqrt();
    let (own, other) = total_shares.sides(outcome);
    let post_sale = ((own - shares).max(0.0).powi(2) + other.powi(2)).sqrt();
    current - post_sale
}

/// Pool actually on hand versus what the outstanding bets are expected to claim.
pub fn calculate_dpm_money_ratio(contract: &DpmContract, bet: &Bet, share_value: f64) -> f64 {
    let ts = &contract.total_shares;
    let p = get_dpm_outcome_probability(ts, bet.outcome);

    let actual = contract.pool.total() - share_value;
    let bet_amount = p * bet.amount;
    let expected = get_dpm_outcome_probability(ts, Outcome::Yes) * contract.total_bets.yes
        + get_dpm_outcome_probability(ts, Outcome::No) * contract.total_bets.no
        - bet_amount;

    if actual <= 0.0 || expected <= 0.0 {
        return 0.0;
    }
    actual / expected
}

pub fn calculate_dpm_share_value(contract: &DpmContract, bet: &Bet) -> f64 {
    let share_value = calculate_dpm_raw_share_value(&contract.total_shares, bet.shares, bet.outcome);
    let f = calculate_dpm_money_ratio(contract, bet, share_value);
    let my_pool = contract.pool.get(bet.outcome);
    (f.min(1.0) * share_value).min(my_pool)
}

pub fn calculate_dpm_sale_amount(contract: &DpmContract, bet: &Bet, fees: &Fees) -> f64 {
    let winnings = calculate_dpm_share_value(contract, bet);
    deduct_dpm_fees(bet.amount, winnings, fees)
}

/// Fee on profit only.
pub fn deduct_dpm_fees(bet_amount: f64, winnings: f64, fees: &Fees) -> f64 {
    if winnings > bet_amount {
        bet_amount + fees.dpm_keep() * (winnings - bet_amount)
    } else {
        winnings
    }
}

pub fn calculate_dpm_payout(
    contract: &DpmContract,
    bet: &Bet,
    resolution: Resolution,
    fees: &Fees,
) -> f64 {
    match resolution {
        Resolution::Cancel => calculate_dpm_cancel_payout(contract, bet),
        Resolution::Mkt => calculate_mkt_dpm_payout(contract, bet, fees),
        Resolution::Yes => calculate_standard_dpm_payout(contract, bet, Outcome::Yes, fees),
        Resolution::No => calculate_standard_dpm_payout(contract, bet, Outcome::No, fees),
    }
}

/// Pro-rata refund of the pool as it stands, not of the original stake.
pub fn calculate_dpm_cancel_payout(contract: &DpmContract, bet: &Bet) -> f64 {
    let bet_total = contract.total_bets.total();
    let pool_total = contract.pool.total();
    (bet.amount / bet_total) * pool_total
}

pub fn calculate_standard_dpm_payout(
    contract: &DpmContract,
    bet: &Bet,
    outcome: Outcome,
    fees: &Fees,
) -> f64 {
    if bet.outcome != outcome || bet.shares == 0.0 {
        return 0.0;
    }
    let total_shares = contract.total_shares.get(outcome);
    if total_shares == 0.0 {
        return 0.0;
    }

    let pool_total = contract.pool.total();
    let total = total_shares - contract.phantom(outcome);
    let winnings = (bet.shares / total) * pool_total;
    // Profit can be negative because of phantom shares.
    bet.amount + fees.dpm_keep() * (winnings - bet.amount).max(0.0)
}

fn calculate_mkt_dpm_payout(contract: &DpmContract, bet: &Bet, fees: &Fees) -> f64 {
    let p = contract
        .resolution_probability
        .unwrap_or_else(|| get_dpm_probability(&contract.total_shares));
    calculate_dpm_payout_at_probability(contract, bet, p, fees)
}

/// Payout when the contract resolves YES with probability `p` and NO otherwise.
pub fn calculate_dpm_payout_at_probability(
    contract: &DpmContract,
    bet: &Bet,
    p: f64,
    fees: &Fees,
) -> f64 {
    let ts = &contract.total_shares;
    let weighted_share_total = p * (ts.yes - contract.phantom(Outcome::Yes))
        + (1.0 - p) * (ts.no - contract.phantom(Outcome::No));

    let bet_p = match bet.outcome {
        Outcome::Yes => p,
        Outcome::No => 1.0 - p,
    };
    let winnings = (bet_p * bet.shares / weighted_share_total) * contract.pool.total();
    deduct_dpm_fees(bet.amount, winnings, fees)
}

/// Mark-to-market value: a market resolution at the current probability.
pub fn current_value(contract: &DpmContract, bet: &Bet, fees: &Fees) -> f64 {
    let p = get_dpm_probability(&contract.total_shares);
    calculate_dpm_payout_at_probability(contract, bet, p, fees)
}

/// What `bet` would pay if its side won straight after it was placed.
pub fn calculate_dpm_payout_after_correct_bet(
    contract: &DpmContract,
    bet: &Bet,
    fees: &Fees,
) -> f64 {
    let after = DpmContract {
        total_shares: contract.total_shares.with_added(bet.outcome, bet.shares),
        pool: contract.pool.with_added(bet.outcome, bet.amount),
        total_bets: contract.total_bets.with_added(bet.outcome, bet.amount),
        ..contract.clone()
    };
    calculate_standard_dpm_payout(&after, bet, bet.outcome, fees)
}

pub fn resolved_dpm_payout(
    contract: &DpmContract,
    bet: &Bet,
    fees: &Fees,
) -> Result<f64, PricingError> {
    let resolution = contract.resolution.ok_or(PricingError::NotResolved)?;
    Ok(calculate_dpm_payout(contract, bet, resolution, fees))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DpmBetInfo {
    pub shares: f64,
    pub new_pool: Pool,
    pub new_total_shares: Pool,
    pub new_total_bets: Pool,
    pub prob_before: f64,
    pub prob_after: f64,
}

pub fn get_new_dpm_bet_info(contract: &DpmContract, outcome: Outcome, amount: f64) -> DpmBetInfo {
    let shares = calculate_dpm_shares(&contract.total_shares, amount, outcome);
    let new_total_shares = contract.total_shares.with_added(outcome, shares);
    DpmBetInfo {
        shares,
        new_pool: contract.pool.with_added(outcome, amount),
        new_total_shares,
        new_total_bets: contract.total_bets.with_added(outcome, amount),
        prob_before: get_dpm_probability(&contract.total_shares),
        prob_after: get_dpm_probability(&new_total_shares),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DpmSaleInfo {
    pub share_value: f64,
    pub sale_amount: f64,
    pub new_pool: Pool,
    pub new_total_shares: Pool,
    pub new_total_bets: Pool,
    pub prob_before: f64,
    pub prob_after: f64,
}

pub fn get_dpm_sale_info(contract: &DpmContract, bet: &Bet, fees: &Fees) -> DpmSaleInfo {
    let share_value = calculate_dpm_share_value(contract, bet);
    DpmSaleInfo {
        share_value,
        sale_amount: deduct_dpm_fees(bet.amount, share_value, fees),
        new_pool: contract.pool.with_added(bet.outcome, -share_value),
        new_total_shares: contract.total_shares.with_added(bet.outcome, -bet.shares),
        new_total_bets: contract.total_bets.with_added(bet.outcome, -bet.amount),
        prob_before: get_dpm_probability(&contract.total_shares),
        prob_after: get_dpm_probability_after_sale(&contract.total_shares, bet.outcome, bet.shares),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpmInitialPool {
    pub shares_yes: f64,
    pub shares_no: f64,
    pub pool_yes: f64,
    pub pool_no: f64,
    pub phantom_yes: f64,
    pub phantom_no: f64,
}

pub fn calc_dpm_initial_pool(
    initial_prob: f64,
    ante: f64,
    phantom_ante: f64,
) -> Result<DpmInitialPool, PricingError> {
    if !(initial_prob > 0.0 && initial_prob < 1.0) {
        return Err(PricingError::InvalidProbability(initial_prob));
    }
    let total_ante = phantom_ante + ante;
    if !(total_ante > 0.0) || ante < 0.0 || phantom_ante < 0.0 {
        return Err(PricingError::InvalidAmount(total_ante));
    }
    let p = initial_prob;

    let shares_yes = (p * total_ante.powi(2)).sqrt();
    let shares_no = (total_ante.powi(2) - shares_yes.powi(2)).sqrt();

    Ok(DpmInitialPool {
        shares_yes,
        shares_no,
        pool_yes: p * ante,
        pool_no: (1.0 - p) * ante,
        phantom_yes: p.sqrt() * phantom_ante,
        phantom_no: (1.0 - p).sqrt() * phantom_ante,
    })
}
