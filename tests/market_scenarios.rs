use manapool::config::config::{AppCfg, MechanismKind};
use manapool::core::types::{Outcome, Resolution};
use manapool::error::PricingError;
use manapool::market::book::Market;
use manapool::scenario::{Scenario, StepOutcome, replay};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

const ALL: [MechanismKind; 4] = [
    MechanismKind::DpmPool,
    MechanismKind::DpmWeight,
    MechanismKind::Dpm2,
    MechanismKind::Cpmm1,
];

fn market(kind: MechanismKind, initial_probability: f64) -> Market {
    let mut cfg = AppCfg::default();
    cfg.market.mechanism = kind;
    cfg.market.initial_probability = initial_probability;
    cfg.validate().unwrap();
    Market::from_config(&cfg).unwrap()
}

fn balance(m: &Market, user: &str) -> f64 {
    m.balance(user).to_f64().unwrap()
}

#[test]
fn test_cancel_refunds_every_stake_on_every_mechanism() {
    for kind in ALL {
        let mut m = market(kind, 0.5);
        m.place_bet("alice", Outcome::Yes, 120.0).unwrap();
        m.place_bet("bob", Outcome::No, 45.5).unwrap();
        m.place_bet("alice", Outcome::No, 10.0).unwrap();

        let payouts = m.resolve(Resolution::Cancel, None).unwrap();
        assert_eq!(payouts.len(), 3);
        assert!((balance(&m, "alice") - 1000.0).abs() < 1e-6, "{kind:?}");
        assert!((balance(&m, "bob") - 1000.0).abs() < 1e-6, "{kind:?}");
    }
}

#[test]
fn test_losers_get_nothing_and_winners_profit() {
    for kind in ALL {
        let mut m = market(kind, 0.5);
        let yes = m.place_bet("alice", Outcome::Yes, 100.0).unwrap();
        let no = m.place_bet("bob", Outcome::No, 20.0).unwrap();
        m.resolve(Resolution::Yes, None).unwrap();

        assert_eq!(m.current_value(&no.id).unwrap(), 0.0, "{kind:?}");
        assert!(m.current_value(&yes.id).unwrap() > 100.0, "{kind:?}");
        assert!((balance(&m, "bob") - 980.0).abs() < 1e-9, "{kind:?}");
        assert!(balance(&m, "alice") > 1000.0, "{kind:?}");
    }
}

#[test]
fn test_dpm_pays_out_no_more_than_real_money() {
    for kind in [MechanismKind::DpmPool, MechanismKind::DpmWeight] {
        let mut m = market(kind, 0.5);
        let mut staked = 0.0;
        for (user, outcome, amount) in [
            ("alice", Outcome::Yes, 80.0),
            ("bob", Outcome::No, 150.0),
            ("carol", Outcome::Yes, 35.0),
            ("dave", Outcome::No, 5.0),
        ] {
            m.place_bet(user, outcome, amount).unwrap();
            staked += amount;
        }
        let payouts = m.resolve(Resolution::No, None).unwrap();
        let paid: f64 = payouts.iter().map(|p| p.amount).sum();
        // Real money is the stakes plus the creator's ante; the phantom seed is never paid.
        assert!(paid <= staked + 100.0 + 1e-9, "{kind:?}: {paid}");
        assert!(paid > staked, "{kind:?}: {paid}");
    }
}

#[test]
fn test_lone_weight_bettor_cannot_win_the_phantom_seed() {
    let mut m = market(MechanismKind::DpmWeight, 0.5);
    m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
    let paid = m.resolve(Resolution::Yes, None).unwrap()[0].amount;
    assert!(paid <= 10.0 + 100.0, "{paid}");
    assert!(balance(&m, "alice") <= 1100.0);
}

#[test]
fn test_mirrored_markets_mirror_prices_and_payouts() {
    for kind in ALL {
        let mut a = market(kind, 0.3);
        let mut b = market(kind, 0.7);
        assert!((a.probability() - (1.0 - b.probability())).abs() < 1e-9);

        let bet_a = a.place_bet("alice", Outcome::Yes, 40.0).unwrap();
        let bet_b = b.place_bet("alice", Outcome::No, 40.0).unwrap();
        assert!((bet_a.shares - bet_b.shares).abs() < 1e-6, "{kind:?}");
        assert!((a.probability() - (1.0 - b.probability())).abs() < 1e-9, "{kind:?}");

        let pa = a.resolve(Resolution::Yes, None).unwrap();
        let pb = b.resolve(Resolution::No, None).unwrap();
        assert!((pa[0].amount - pb[0].amount).abs() < 1e-6, "{kind:?}");
    }
}

#[test]
fn test_sale_after_adverse_move_returns_less_than_stake() {
    for kind in [MechanismKind::DpmPool, MechanismKind::Dpm2, MechanismKind::Cpmm1] {
        let mut m = market(kind, 0.5);
        let bet = m.place_bet("alice", Outcome::Yes, 60.0).unwrap();
        m.place_bet("bob", Outcome::No, 200.0).unwrap();
        let sale = m.sell_bet("alice", &bet.id).unwrap();
        assert!(sale.amount >= 0.0, "{kind:?}");
        assert!(sale.amount <= 60.0 + 1e-9, "{kind:?}: {}", sale.amount);
    }
}

#[test]
fn test_weight_market_refuses_sales_but_keeps_bet() {
    let mut m = market(MechanismKind::DpmWeight, 0.5);
    let bet = m.place_bet("alice", Outcome::Yes, 10.0).unwrap();
    assert!(matches!(
        m.sell_bet("alice", &bet.id),
        Err(PricingError::Unsupported { .. })
    ));
    assert!(m.bet(&bet.id).unwrap().sale.is_none());
    assert_eq!(m.balance("alice"), Decimal::from(990));
}

#[test]
fn test_demo_scenario_replays() {
    let scenario: Scenario =
        serde_json::from_str(include_str!("../demos/scenario.json")).unwrap();
    let mut m = market(MechanismKind::DpmPool, 0.5);
    let report = replay(&mut m, &scenario);

    assert_eq!(report.steps.len(), scenario.actions.len());
    assert!(
        report
            .steps
            .iter()
            .all(|s| !matches!(s.outcome, StepOutcome::Rejected { .. }))
    );
    assert_eq!(m.resolution(), Some(Resolution::Yes));
    assert!(balance(&m, "alice") > 1000.0);
}
