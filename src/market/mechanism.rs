use crate::config::config::{MarketCfg, MechanismKind};
use crate::core::types::{Bet, Outcome, Resolution};
use crate::error::PricingError;
use crate::market::adapters::{CpmmMechanism, DpmMechanism, PoolMechanism, WeightMechanism};
use crate::pricing::cpmm::CpmmState;
use crate::pricing::dpm::{DpmContract, calc_dpm_initial_pool};
use crate::pricing::fees::Fees;
use crate::pricing::pool::{PoolContract, calc_start_pool};
use crate::pricing::weight::PotContract;

/// Result of filling a bet against the mechanism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetFill {
    pub shares: f64,
    pub prob_before: f64,
    pub prob_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleFill {
    pub amount: f64,
    pub fee: f64,
    pub prob_before: f64,
    pub prob_after: f64,
}

/// Stateful pricing engine for one market. Implementations own the contract state and only
/// mutate it when an operation succeeds.
pub trait PricingMechanism: Send + Sync {
    fn name(&self) -> &'static str;

    fn probability(&self) -> f64;

    fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64;

    fn place_bet(&mut self, outcome: Outcome, amount: f64) -> Result<BetFill, PricingError>;

    fn sell_bet(&mut self, bet: &Bet) -> Result<SaleFill, PricingError>;

    fn current_value(&self, bet: &Bet) -> f64;

    fn payout(
        &self,
        bet: &Bet,
        resolution: Resolution,
        resolution_probability: Option<f64>,
    ) -> Result<f64, PricingError>;

    /// Fails when the mechanism cannot settle to `resolution` at all.
    fn check_resolution(&self, _resolution: Resolution) -> Result<(), PricingError> {
        Ok(())
    }

    fn resolve(&mut self, resolution: Resolution, resolution_probability: Option<f64>);

    fn add_liquidity(&mut self, _user_id: &str, _amount: f64) -> Result<f64, PricingError> {
        Err(PricingError::Unsupported {
            mechanism: self.name(),
            operation: "adding liquidity",
        })
    }

    /// Contract state for reports.
    fn snapshot(&self) -> serde_json::Value;
}

pub fn mechanism_from_config(
    cfg: &MarketCfg,
    fees: Fees,
) -> Result<Box<dyn PricingMechanism>, PricingError> {
    let mechanism: Box<dyn PricingMechanism> = match cfg.mechanism {
        MechanismKind::DpmPool => {
            let seed = calc_start_pool(cfg.initial_probability, cfg.ante, cfg.phantom_ante)?;
            Box::new(PoolMechanism::new(PoolContract::new(seed), fees))
        }
        MechanismKind::DpmWeight => {
            let seed = calc_start_pool(cfg.initial_probability, cfg.ante, cfg.phantom_ante)?;
            Box::new(WeightMechanism::new(
                PotContract::new(seed.pool, seed.start),
                fees,
            ))
        }
        MechanismKind::Dpm2 => {
            let initial =
                calc_dpm_initial_pool(cfg.initial_probability, cfg.ante, cfg.phantom_ante)?;
            Box::new(DpmMechanism::new(DpmContract::new(&initial), fees))
        }
        MechanismKind::Cpmm1 => {
            let state = CpmmState::initial(cfg.initial_probability, cfg.ante)?;
            Box::new(CpmmMechanism::new(state, fees, cfg.ante))
        }
    };
    Ok(mechanism)
}
