use chrono::Utc;
use serde::Serialize;

use crate::core::types::{Bet, Outcome, Resolution};
use crate::error::PricingError;
use crate::market::mechanism::{BetFill, PricingMechanism, SaleFill};
use crate::pricing::cpmm::{self, CpmmState, LiquidityProvision};
use crate::pricing::dpm::{self, DpmContract};
use crate::pricing::fees::{FeeSplit, Fees};
use crate::pricing::pool::{self, PoolContract};
use crate::pricing::weight::{self, PotContract};

fn finite_shares(shares: f64) -> Result<f64, PricingError> {
    if !shares.is_finite() || shares < 0.0 {
        return Err(PricingError::Degenerate {
            what: "shares",
            value: shares,
        });
    }
    Ok(shares)
}

// Sale proceeds are not clamped by the formulas; refuse them here instead.
fn sane_sale(amount: f64) -> Result<f64, PricingError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(PricingError::Degenerate {
            what: "sale amount",
            value: amount,
        });
    }
    Ok(amount)
}

fn to_value<T: Serialize>(state: &T) -> serde_json::Value {
    serde_json::to_value(state).unwrap_or_default()
}

// ----------- dpm-pool -----------------

pub struct PoolMechanism {
    contract: PoolContract,
    fees: Fees,
}

impl PoolMechanism {
    pub fn new(contract: PoolContract, fees: Fees) -> Self {
        Self { contract, fees }
    }

    pub fn contract(&self) -> &PoolContract {
        &self.contract
    }
}

impl PricingMechanism for PoolMechanism {
    fn name(&self) -> &'static str {
        pool::MECHANISM
    }

    fn probability(&self) -> f64 {
        pool::get_probability(&self.contract.pool)
    }

    fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64 {
        pool::get_probability_after_bet(&self.contract.pool, outcome, amount)
    }

    fn place_bet(&mut self, outcome: Outcome, amount: f64) -> Result<BetFill, PricingError> {
        let info = pool::get_new_bet_info(&self.contract, outcome, amount);
        let shares = finite_shares(info.shares)?;

        self.contract.pool = info.new_pool;
        self.contract.total_shares = info.new_total_shares;
        self.contract.total_bets = info.new_total_bets;

        Ok(BetFill {
            shares,
            prob_before: info.prob_before,
            prob_after: info.prob_after,
        })
    }

    fn sell_bet(&mut self, bet: &Bet) -> Result<SaleFill, PricingError> {
        let info = pool::get_sale_info(&self.contract, bet, &self.fees);
        let amount = sane_sale(info.sale_amount)?;

        self.contract.pool = info.new_pool;
        self.contract.total_shares = info.new_total_shares;
        self.contract.total_bets = info.new_total_bets;

        Ok(SaleFill {
            amount,
            fee: info.fee,
            prob_before: info.prob_before,
            prob_after: info.prob_after,
        })
    }

    fn current_value(&self, bet: &Bet) -> f64 {
        pool::current_value(&self.contract, bet, &self.fees)
    }

    fn payout(
        &self,
        bet: &Bet,
        resolution: Resolution,
        _resolution_probability: Option<f64>,
    ) -> Result<f64, PricingError> {
        pool::calculate_payout(&self.contract, bet, resolution, &self.fees)
    }

    fn check_resolution(&self, resolution: Resolution) -> Result<(), PricingError> {
        let empty = Bet::quote(Outcome::Yes, 0.0, 0.0);
        pool::calculate_payout(&self.contract, &empty, resolution, &self.fees).map(|_| ())
    }

    fn resolve(&mut self, resolution: Resolution, _resolution_probability: Option<f64>) {
        self.contract.resolution = Some(resolution);
    }

    fn snapshot(&self) -> serde_json::Value {
        to_value(&self.contract)
    }
}

// ----------- dpm-weight -----------------

pub struct WeightMechanism {
    contract: PotContract,
    fees: Fees,
}

impl WeightMechanism {
    pub fn new(contract: PotContract, fees: Fees) -> Self {
        Self { contract, fees }
    }
}

impl PricingMechanism for WeightMechanism {
    fn name(&self) -> &'static str {
        weight::MECHANISM
    }

    fn probability(&self) -> f64 {
        self.contract.probability()
    }

    fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64 {
        pool::get_probability_after_bet(&self.contract.pot, outcome, amount)
    }

    fn place_bet(&mut self, outcome: Outcome, amount: f64) -> Result<BetFill, PricingError> {
        let prob_before = self.probability();
        finite_shares(weight::get_dpm_weight(&self.contract.pot, amount, outcome))?;
        let weight = weight::apply_bet(&mut self.contract, outcome, amount);

        Ok(BetFill {
            shares: weight,
            prob_before,
            prob_after: self.probability(),
        })
    }

    fn sell_bet(&mut self, _bet: &Bet) -> Result<SaleFill, PricingError> {
        Err(PricingError::Unsupported {
            mechanism: weight::MECHANISM,
            operation: "selling",
        })
    }

    fn current_value(&self, bet: &Bet) -> f64 {
        weight::current_value(&self.contract, bet, &self.fees)
    }

    fn payout(
        &self,
        bet: &Bet,
        resolution: Resolution,
        _resolution_probability: Option<f64>,
    ) -> Result<f64, PricingError> {
        weight::calculate_winnings(&self.contract, bet, resolution, &self.fees)
    }

    fn check_resolution(&self, resolution: Resolution) -> Result<(), PricingError> {
        let empty = Bet::quote(Outcome::Yes, 0.0, 0.0);
        weight::calculate_winnings(&self.contract, &empty, resolution, &self.fees).map(|_| ())
    }

    fn resolve(&mut self, resolution: Resolution, _resolution_probability: Option<f64>) {
        self.contract.resolution = Some(resolution);
    }

    fn snapshot(&self) -> serde_json::Value {
        to_value(&self.contract)
    }
}

// ----------- dpm-2 -----------------

pub struct DpmMechanism {
    contract: DpmContract,
    fees: Fees,
}

impl DpmMechanism {
    pub fn new(contract: DpmContract, fees: Fees) -> Self {
        Self { contract, fees }
    }
}

impl PricingMechanism for DpmMechanism {
    fn name(&self) -> &'static str {
        dpm::MECHANISM
    }

    fn probability(&self) -> f64 {
        dpm::get_dpm_probability(&self.contract.total_shares)
    }

    fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64 {
        let p = dpm::get_dpm_outcome_probability_after_bet(
            &self.contract.total_shares,
            outcome,
            amount,
        );
        match outcome {
            Outcome::Yes => p,
            Outcome::No => 1.0 - p,
        }
    }

    fn place_bet(&mut self, outcome: Outcome, amount: f64) -> Result<BetFill, PricingError> {
        let info = dpm::get_new_dpm_bet_info(&self.contract, outcome, amount);
        let shares = finite_shares(info.shares)?;

        self.contract.pool = info.new_pool;
        self.contract.total_shares = info.new_total_shares;
        self.contract.total_bets = info.new_total_bets;

        Ok(BetFill {
            shares,
            prob_before: info.prob_before,
            prob_after: info.prob_after,
        })
    }

    fn sell_bet(&mut self, bet: &Bet) -> Result<SaleFill, PricingError> {
        let info = dpm::get_dpm_sale_info(&self.contract, bet, &self.fees);
        let amount = sane_sale(info.sale_amount)?;

        self.contract.pool = info.new_pool;
        self.contract.total_shares = info.new_total_shares;
        self.contract.total_bets = info.new_total_bets;

        Ok(SaleFill {
            amount,
            fee: info.share_value - amount,
            prob_before: info.prob_before,
            prob_after: info.prob_after,
        })
    }

    fn current_value(&self, bet: &Bet) -> f64 {
        dpm::current_value(&self.contract, bet, &self.fees)
    }

    fn payout(
        &self,
        bet: &Bet,
        resolution: Resolution,
        resolution_probability: Option<f64>,
    ) -> Result<f64, PricingError> {
        let contract = DpmContract {
            resolution_probability,
            ..self.contract.clone()
        };
        Ok(dpm::calculate_dpm_payout(&contract, bet, resolution, &self.fees))
    }

    fn resolve(&mut self, resolution: Resolution, resolution_probability: Option<f64>) {
        self.contract.resolution = Some(resolution);
        self.contract.resolution_probability = resolution_probability;
    }

    fn snapshot(&self) -> serde_json::Value {
        to_value(&self.contract)
    }
}

// ----------- cpmm-1 -----------------

#[derive(Debug, Clone, Serialize)]
struct CpmmSnapshot<'a> {
    state: &'a CpmmState,
    probability: f64,
    #[serde(rename = "collectedFees")]
    collected_fees: &'a FeeSplit,
    #[serde(rename = "totalLiquidity")]
    total_liquidity: f64,
    liquidities: &'a [LiquidityProvision],
    resolution: Option<Resolution>,
    #[serde(rename = "resolutionProbability")]
    resolution_probability: Option<f64>,
}

pub struct CpmmMechanism {
    state: CpmmState,
    fees: Fees,
    collected_fees: FeeSplit,
    total_liquidity: f64,
    liquidities: Vec<LiquidityProvision>,
    resolution: Option<Resolution>,
    resolution_probability: Option<f64>,
}

impl CpmmMechanism {
    /// `ante` is the creator's initial liquidity, already in `state.pool`.
    pub fn new(state: CpmmState, fees: Fees, ante: f64) -> Self {
        Self {
            state,
            fees,
            collected_fees: FeeSplit::default(),
            total_liquidity: ante,
            liquidities: vec![LiquidityProvision {
                user_id: "creator".into(),
                amount: ante,
                created_time: Utc::now().timestamp_millis(),
            }],
            resolution: None,
            resolution_probability: None,
        }
    }

    pub fn state(&self) -> &CpmmState {
        &self.state
    }

    pub fn collected_fees(&self) -> &FeeSplit {
        &self.collected_fees
    }
}

impl PricingMechanism for CpmmMechanism {
    fn name(&self) -> &'static str {
        cpmm::MECHANISM
    }

    fn probability(&self) -> f64 {
        self.state.probability()
    }

    fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64 {
        let p = cpmm::get_cpmm_outcome_probability_after_bet(&self.state, outcome, amount, &self.fees);
        match outcome {
            Outcome::Yes => p,
            Outcome::No => 1.0 - p,
        }
    }

    fn place_bet(&mut self, outcome: Outcome, amount: f64) -> Result<BetFill, PricingError> {
        let prob_before = self.probability();
        let purchase = cpmm::calculate_cpmm_purchase(&self.state, amount, outcome, &self.fees);
        let shares = finite_shares(purchase.shares)?;

        self.state = purchase.new_state();
        self.collected_fees = self.collected_fees.add(&purchase.fees);

        Ok(BetFill {
            shares,
            prob_before,
            prob_after: self.probability(),
        })
    }

    fn sell_bet(&mut self, bet: &Bet) -> Result<SaleFill, PricingError> {
        let prob_before = self.probability();
        let sale = cpmm::calculate_cpmm_sale(&self.state, bet.shares, bet.outcome, &self.fees)?;
        let amount = sane_sale(sale.sale_value)?;

        self.state = sale.new_state;
        self.collected_fees = self.collected_fees.add(&sale.fees);

        Ok(SaleFill {
            amount,
            fee: sale.fees.total(),
            prob_before,
            prob_after: self.probability(),
        })
    }

    fn current_value(&self, bet: &Bet) -> f64 {
        cpmm::current_value(&self.state, bet)
    }

    fn payout(
        &self,
        bet: &Bet,
        resolution: Resolution,
        resolution_probability: Option<f64>,
    ) -> Result<f64, PricingError> {
        Ok(cpmm::calculate_fixed_payout(
            &self.state,
            bet,
            resolution,
            resolution_probability,
        ))
    }

    fn resolve(&mut self, resolution: Resolution, resolution_probability: Option<f64>) {
        self.resolution = Some(resolution);
        self.resolution_probability = resolution_probability;
    }

    fn add_liquidity(&mut self, user_id: &str, amount: f64) -> Result<f64, PricingError> {
        let change = cpmm::add_cpmm_liquidity(&self.state.pool, self.state.p, amount);
        if !change.new_p.is_finite() {
            return Err(PricingError::Degenerate {
                what: "p",
                value: change.new_p,
            });
        }
        self.state = CpmmState {
            pool: change.new_pool,
            p: change.new_p,
        };
        self.total_liquidity += change.liquidity;
        self.liquidities.push(LiquidityProvision {
            user_id: user_id.to_string(),
            amount,
            created_time: Utc::now().timestamp_millis(),
        });
        Ok(change.liquidity)
    }

    fn snapshot(&self) -> serde_json::Value {
        to_value(&CpmmSnapshot {
            state: &self.state,
            probability: self.probability(),
            collected_fees: &self.collected_fees,
            total_liquidity: self.total_liquidity,
            liquidities: &self.liquidities,
            resolution: self.resolution,
            resolution_probability: self.resolution_probability,
        })
    }
}
