use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::config::AppCfg;
use crate::core::types::{Bet, Outcome, Payout, Resolution, Sale};
use crate::error::PricingError;
use crate::market::ledger::{Ledger, to_money};
use crate::market::mechanism::{PricingMechanism, mechanism_from_config};

#[derive(Debug, Clone, Serialize)]
pub struct BetRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub bet: Bet,
    pub sale: Option<Sale>,
    pub payout: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub question: String,
    pub mechanism: &'static str,
    pub probability: f64,
    pub contract: serde_json::Value,
    pub resolution: Option<Resolution>,
    #[serde(rename = "resolutionProbability")]
    pub resolution_probability: Option<f64>,
    pub bets: Vec<BetRecord>,
    pub ledger: Ledger,
}

/// One binary market: a pricing mechanism, its bets and the ledger that pays for them.
pub struct Market {
    pub id: String,
    pub question: String,
    mechanism: Box<dyn PricingMechanism>,
    ledger: Ledger,
    bets: Vec<BetRecord>,
    resolution: Option<Resolution>,
    resolution_probability: Option<f64>,
}

impl Market {
    pub fn new(
        question: impl Into<String>,
        mechanism: Box<dyn PricingMechanism>,
        ledger: Ledger,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            mechanism,
            ledger,
            bets: Vec::new(),
            resolution: None,
            resolution_probability: None,
        }
    }

    pub fn from_config(cfg: &AppCfg) -> Result<Self, PricingError> {
        let mechanism = mechanism_from_config(&cfg.market, cfg.fees)?;
        let ledger = Ledger::new(to_money(cfg.market.starting_balance)?);
        let market = Self::new(cfg.market.question.clone(), mechanism, ledger);
        info!(
            market = %market.id,
            mechanism = market.mechanism.name(),
            prob = market.probability(),
            "Market created"
        );
        Ok(market)
    }

    pub fn probability(&self) -> f64 {
        self.mechanism.probability()
    }

    pub fn probability_after_bet(&self, outcome: Outcome, amount: f64) -> f64 {
        self.mechanism.probability_after_bet(outcome, amount)
    }

    pub fn mechanism_name(&self) -> &'static str {
        self.mechanism.name()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn balance(&self, user_id: &str) -> Decimal {
        self.ledger.balance(user_id)
    }

    pub fn bets(&self) -> &[BetRecord] {
        &self.bets
    }

    pub fn bet(&self, bet_id: &str) -> Result<&BetRecord, PricingError> {
        self.bets
            .iter()
            .find(|r| r.bet.id == bet_id)
            .ok_or_else(|| PricingError::UnknownBet(bet_id.to_string()))
    }

    fn ensure_open(&self) -> Result<(), PricingError> {
        match self.resolution {
            Some(_) => Err(PricingError::AlreadyResolved),
            None => Ok(()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn place_bet(
        &mut self,
        user_id: &str,
        outcome: Outcome,
        amount: f64,
    ) -> Result<Bet, PricingError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PricingError::InvalidAmount(amount));
        }
        self.ensure_open()?;
        let cost = to_money(amount)?;
        self.ledger.ensure(user_id, cost)?;

        let fill = self.mechanism.place_bet(outcome, amount)?;
        self.ledger.debit(user_id, cost)?;

        let bet = Bet {
            id: Uuid::new_v4().to_string(),
            outcome,
            amount,
            shares: fill.shares,
            prob_before: fill.prob_before,
            prob_after: fill.prob_after,
            created_time: Utc::now().timestamp_millis(),
        };
        info!(
            bet = %bet.id,
            shares = bet.shares,
            prob_before = bet.prob_before,
            prob_after = bet.prob_after,
            "Bet placed"
        );
        self.bets.push(BetRecord {
            user_id: user_id.to_string(),
            bet: bet.clone(),
            sale: None,
            payout: None,
        });
        Ok(bet)
    }

    #[tracing::instrument(skip(self))]
    pub fn sell_bet(&mut self, user_id: &str, bet_id: &str) -> Result<Sale, PricingError> {
        self.ensure_open()?;
        let idx = self
            .bets
            .iter()
            .position(|r| r.bet.id == bet_id)
            .ok_or_else(|| PricingError::UnknownBet(bet_id.to_string()))?;
        let record = &self.bets[idx];
        if record.user_id != user_id {
            return Err(PricingError::NotOwner {
                bet_id: bet_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        if record.sale.is_some() {
            return Err(PricingError::AlreadySold(bet_id.to_string()));
        }

        let bet = record.bet.clone();
        let fill = self.mechanism.sell_bet(&bet).inspect_err(|e| {
            warn!(bet = %bet_id, error = %e, "Sale refused");
        })?;
        let proceeds = to_money(fill.amount)?;
        self.ledger.credit(user_id, proceeds);

        let sale = Sale {
            bet_id: bet_id.to_string(),
            amount: fill.amount,
            fee: fill.fee,
            prob_before: fill.prob_before,
            prob_after: fill.prob_after,
        };
        info!(
            amount = sale.amount,
            fee = sale.fee,
            prob_after = sale.prob_after,
            "Bet sold"
        );
        self.bets[idx].sale = Some(sale.clone());
        Ok(sale)
    }

    /// Adds liquidity on mechanisms that support it, returning the liquidity minted.
    #[tracing::instrument(skip(self))]
    pub fn add_liquidity(&mut self, user_id: &str, amount: f64) -> Result<f64, PricingError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PricingError::InvalidAmount(amount));
        }
        self.ensure_open()?;
        let cost = to_money(amount)?;
        self.ledger.ensure(user_id, cost)?;

        let liquidity = self.mechanism.add_liquidity(user_id, amount)?;
        self.ledger.debit(user_id, cost)?;
        info!(liquidity, prob = self.probability(), "Liquidity added");
        Ok(liquidity)
    }

    /// Mark-to-market value of a bet. Sold bets are worth nothing; after resolution a bet is
    /// worth its payout.
    pub fn current_value(&self, bet_id: &str) -> Result<f64, PricingError> {
        let record = self.bet(bet_id)?;
        if record.sale.is_some() {
            return Ok(0.0);
        }
        if let Some(payout) = record.payout {
            return Ok(payout);
        }
        Ok(self.mechanism.current_value(&record.bet))
    }

    /// Settles every unsold bet. Terminal: a market resolves exactly once, and nothing is paid
    /// unless every payout is valid.
    #[tracing::instrument(skip(self))]
    pub fn resolve(
        &mut self,
        resolution: Resolution,
        probability: Option<f64>,
    ) -> Result<Vec<Payout>, PricingError> {
        self.ensure_open()?;
        self.mechanism.check_resolution(resolution)?;
        let resolution_probability = match resolution {
            Resolution::Mkt => {
                let p = probability.unwrap_or_else(|| self.probability());
                if !(0.0..=1.0).contains(&p) {
                    return Err(PricingError::InvalidProbability(p));
                }
                Some(p)
            }
            _ => None,
        };

        let mut payouts = Vec::new();
        for record in self.bets.iter().filter(|r| r.sale.is_none()) {
            let amount = self
                .mechanism
                .payout(&record.bet, resolution, resolution_probability)?;
            if !amount.is_finite() || amount < 0.0 {
                warn!(bet = %record.bet.id, amount, "Refusing degenerate payout");
                return Err(PricingError::Degenerate {
                    what: "payout",
                    value: amount,
                });
            }
            payouts.push((
                to_money(amount)?,
                Payout {
                    bet_id: record.bet.id.clone(),
                    user_id: record.user_id.clone(),
                    amount,
                },
            ));
        }

        for (money, payout) in &payouts {
            self.ledger.credit(&payout.user_id, *money);
            if let Some(record) = self.bets.iter_mut().find(|r| r.bet.id == payout.bet_id) {
                record.payout = Some(payout.amount);
            }
        }
        self.mechanism.resolve(resolution, resolution_probability);
        self.resolution = Some(resolution);
        self.resolution_probability = resolution_probability;

        let total: f64 = payouts.iter().map(|(_, p)| p.amount).sum();
        info!(
            ?resolution,
            payouts = payouts.len(),
            total,
            "Market resolved"
        );
        Ok(payouts.into_iter().map(|(_, p)| p).collect())
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            id: self.id.clone(),
            question: self.question.clone(),
            mechanism: self.mechanism.name(),
            probability: self.probability(),
            contract: self.mechanism.snapshot(),
            resolution: self.resolution,
            resolution_probability: self.resolution_probability,
            bets: self.bets.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::MechanismKind;

    fn market(kind: MechanismKind) -> Market {
        let mut cfg = AppCfg::default();
        cfg.market.mechanism = kind;
        Market::from_config(&cfg).unwrap()
    }

    #[test]
    fn test_place_bet_debits_and_moves_probability() {
        let mut m = market(MechanismKind::DpmPool);
        let before = m.probability();
        let bet = m.place_bet("alice", Outcome::Yes, 100.0).unwrap();
        assert!(m.probability() > before);
        assert!((bet.prob_before - before).abs() < 1e-12);
        assert_eq!(m.balance("alice"), Decimal::from(900));
    }

    #[test]
    fn test_bad_bets_are_rejected() {
        let mut m = market(MechanismKind::DpmPool);
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                m.place_bet("alice", Outcome::Yes, amount),
                Err(PricingError::InvalidAmount(_))
            ));
        }
        assert!(matches!(
            m.place_bet("alice", Outcome::Yes, 5000.0),
            Err(PricingError::InsufficientBalance { .. })
        ));
        assert!(m.bets().is_empty());
        assert!((m.probability() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sell_owner_only_and_once() {
        let mut m = market(MechanismKind::DpmPool);
        let bet = m.place_bet("alice", Outcome::No, 50.0).unwrap();
        assert!(matches!(
            m.sell_bet("bob", &bet.id),
            Err(PricingError::NotOwner { .. })
        ));
        let sale = m.sell_bet("alice", &bet.id).unwrap();
        assert!(sale.amount > 0.0 && sale.amount <= 50.0);
        assert!(matches!(
            m.sell_bet("alice", &bet.id),
            Err(PricingError::AlreadySold(_))
        ));
        assert_eq!(m.current_value(&bet.id).unwrap(), 0.0);
        assert!(matches!(
            m.sell_bet("alice", "missing"),
            Err(PricingError::UnknownBet(_))
        ));
    }

    #[test]
    fn test_resolve_is_terminal() {
        let mut m = market(MechanismKind::DpmPool);
        let yes = m.place_bet("alice", Outcome::Yes, 100.0).unwrap();
        let no = m.place_bet("bob", Outcome::No, 100.0).unwrap();

        let payouts = m.resolve(Resolution::Yes, None).unwrap();
        assert_eq!(payouts.len(), 2);
        let paid: f64 = payouts.iter().map(|p| p.amount).sum();
        // Winners split the real pool: both stakes plus the creator's ante, less fees.
        assert!(paid <= 300.0 + 1e-9);
        assert!(m.current_value(&yes.id).unwrap() > 100.0);
        assert_eq!(m.current_value(&no.id).unwrap(), 0.0);

        assert!(matches!(
            m.resolve(Resolution::No, None),
            Err(PricingError::AlreadyResolved)
        ));
        assert!(matches!(
            m.place_bet("alice", Outcome::Yes, 1.0),
            Err(PricingError::AlreadyResolved)
        ));
        assert!(matches!(
            m.sell_bet("alice", &yes.id),
            Err(PricingError::AlreadyResolved)
        ));
    }

    #[test]
    fn test_cancel_refunds_every_stake() {
        let mut m = market(MechanismKind::DpmPool);
        m.place_bet("alice", Outcome::Yes, 70.0).unwrap();
        m.place_bet("bob", Outcome::No, 30.0).unwrap();
        m.resolve(Resolution::Cancel, None).unwrap();
        assert_eq!(m.balance("alice"), Decimal::from(1000));
        assert_eq!(m.balance("bob"), Decimal::from(1000));
    }

    #[test]
    fn test_unsupported_mkt_leaves_market_open() {
        let mut m = market(MechanismKind::DpmPool);
        m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
        assert!(matches!(
            m.resolve(Resolution::Mkt, Some(0.4)),
            Err(PricingError::Unsupported { .. })
        ));
        assert!(m.resolution().is_none());
        assert_eq!(m.balance("alice"), Decimal::from(990));
    }

    #[test]
    fn test_unsupported_mkt_is_refused_without_open_bets() {
        for kind in [MechanismKind::DpmPool, MechanismKind::DpmWeight] {
            let mut m = market(kind);
            assert!(matches!(
                m.resolve(Resolution::Mkt, Some(0.4)),
                Err(PricingError::Unsupported { .. })
            ));
            assert!(m.resolution().is_none(), "{kind:?}");
        }

        // Only sold bets left.
        let mut m = market(MechanismKind::DpmPool);
        let bet = m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
        m.sell_bet("alice", &bet.id).unwrap();
        assert!(matches!(
            m.resolve(Resolution::Mkt, None),
            Err(PricingError::Unsupported { .. })
        ));
        assert!(m.resolve(Resolution::Yes, None).unwrap().is_empty());
    }

    #[test]
    fn test_cpmm_mkt_resolution_pays_probability_per_share() {
        let mut m = market(MechanismKind::Cpmm1);
        let bet = m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
        let payouts = m.resolve(Resolution::Mkt, Some(0.25)).unwrap();
        assert!((payouts[0].amount - 0.25 * bet.shares).abs() < 1e-9);
        assert!(matches!(
            market(MechanismKind::Cpmm1).resolve(Resolution::Mkt, Some(1.5)),
            Err(PricingError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_liquidity_only_where_supported() {
        let mut m = market(MechanismKind::Cpmm1);
        assert!(m.add_liquidity("lp", 100.0).unwrap() > 0.0);
        assert_eq!(m.balance("lp"), Decimal::from(900));

        let mut m = market(MechanismKind::DpmPool);
        assert!(matches!(
            m.add_liquidity("lp", 100.0),
            Err(PricingError::Unsupported { .. })
        ));
        assert_eq!(m.balance("lp"), Decimal::from(1000));
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut m = market(MechanismKind::Dpm2);
        m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["mechanism"], "dpm-2");
        assert_eq!(json["bets"].as_array().map(|b| b.len()), Some(1));
        assert!(json["contract"]["totalShares"]["YES"].is_number());
    }
}
