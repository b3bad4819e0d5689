//! Replays a scripted sequence of market actions and reports what happened.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::types::{Outcome, Payout, Resolution, Sale};
use crate::error::PricingError;
use crate::market::book::{Market, MarketSnapshot};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub actions: Vec<Action>,
}

/// Bets are referred to by the order they were placed in, starting at 0.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Bet {
        user: String,
        outcome: Outcome,
        amount: f64,
    },
    Sell {
        user: String,
        bet: usize,
    },
    Liquidity {
        user: String,
        amount: f64,
    },
    Resolve {
        resolution: Resolution,
        #[serde(default)]
        probability: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepOutcome {
    Bet {
        #[serde(rename = "betId")]
        bet_id: String,
        shares: f64,
    },
    Sale(Sale),
    Liquidity {
        liquidity: f64,
    },
    Resolved {
        payouts: Vec<Payout>,
    },
    Rejected {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub index: usize,
    #[serde(rename = "probAfter")]
    pub prob_after: f64,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub scenario: Option<String>,
    pub steps: Vec<Step>,
    pub market: MarketSnapshot,
}

fn apply(
    market: &mut Market,
    action: &Action,
    bet_ids: &mut Vec<String>,
) -> Result<StepOutcome, PricingError> {
    match action {
        Action::Bet {
            user,
            outcome,
            amount,
        } => {
            let bet = market.place_bet(user, *outcome, *amount)?;
            bet_ids.push(bet.id.clone());
            Ok(StepOutcome::Bet {
                bet_id: bet.id,
                shares: bet.shares,
            })
        }
        Action::Sell { user, bet } => {
            let bet_id = bet_ids
                .get(*bet)
                .ok_or_else(|| PricingError::UnknownBet(format!("#{bet}")))?;
            Ok(StepOutcome::Sale(market.sell_bet(user, bet_id)?))
        }
        Action::Liquidity { user, amount } => Ok(StepOutcome::Liquidity {
            liquidity: market.add_liquidity(user, *amount)?,
        }),
        Action::Resolve {
            resolution,
            probability,
        } => Ok(StepOutcome::Resolved {
            payouts: market.resolve(*resolution, *probability)?,
        }),
    }
}

/// Runs every action in order. A rejected action is recorded and the replay carries on.
pub fn replay(market: &mut Market, scenario: &Scenario) -> Report {
    info!(
        actions = scenario.actions.len(),
        mechanism = market.mechanism_name(),
        "Replaying scenario"
    );
    let mut bet_ids = Vec::new();
    let mut steps = Vec::with_capacity(scenario.actions.len());

    for (index, action) in scenario.actions.iter().enumerate() {
        let outcome = match apply(market, action, &mut bet_ids) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(index, error = %e, "Action rejected");
                // Keep bet indexes aligned with the script even when a bet fails.
                if matches!(action, Action::Bet { .. }) {
                    bet_ids.push(String::new());
                }
                StepOutcome::Rejected {
                    error: e.to_string(),
                }
            }
        };
        steps.push(Step {
            index,
            prob_after: market.probability(),
            outcome,
        });
    }

    Report {
        scenario: scenario.name.clone(),
        steps,
        market: market.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::AppCfg;

    #[test]
    fn test_parse_and_replay() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "name": "smoke",
                "actions": [
                    {"type": "bet", "user": "alice", "outcome": "YES", "amount": 50},
                    {"type": "bet", "user": "bob", "outcome": "NO", "amount": -1},
                    {"type": "bet", "user": "bob", "outcome": "NO", "amount": 20},
                    {"type": "sell", "user": "bob", "bet": 2},
                    {"type": "sell", "user": "bob", "bet": 1},
                    {"type": "resolve", "resolution": "YES"}
                ]
            }"#,
        )
        .unwrap();

        let mut market = Market::from_config(&AppCfg::default()).unwrap();
        let report = replay(&mut market, &scenario);

        assert_eq!(report.steps.len(), 6);
        assert!(matches!(report.steps[0].outcome, StepOutcome::Bet { .. }));
        assert!(matches!(report.steps[1].outcome, StepOutcome::Rejected { .. }));
        assert!(matches!(report.steps[3].outcome, StepOutcome::Sale(_)));
        // Index 1 is the failed bet.
        assert!(matches!(report.steps[4].outcome, StepOutcome::Rejected { .. }));
        match &report.steps[5].outcome {
            StepOutcome::Resolved { payouts } => assert_eq!(payouts.len(), 1),
            other => panic!("expected resolution, got {other:?}"),
        }
        assert_eq!(report.market.resolution, Some(Resolution::Yes));
    }

    #[test]
    fn test_report_is_json() {
        let scenario = Scenario {
            name: None,
            actions: vec![Action::Liquidity {
                user: "lp".into(),
                amount: 10.0,
            }],
        };
        let mut market = Market::from_config(&AppCfg::default()).unwrap();
        let report = replay(&mut market, &scenario);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["outcome"]["kind"], "rejected");
    }
}
