use std::env;
use std::fs;

use anyhow::{Context, Result};
use manapool::config::config::AppCfg;
use manapool::market::book::Market;
use manapool::scenario::{Scenario, replay};
use tracing::{info, info_span};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    let scenario_path = args
        .next()
        .context("usage: manapool <scenario.json> [config.yml]")?;
    let config_path = args.next().unwrap_or_else(|| "config.yml".to_string());

    let cfg = AppCfg::load(&config_path)?;

    let span = info_span!(
        "Replay",
        pid = %std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
    );
    let _enter = span.enter();

    info!(scenario = %scenario_path, config = %config_path, "Starting up");

    let raw = fs::read_to_string(&scenario_path)
        .with_context(|| format!("reading scenario {scenario_path}"))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("parsing scenario")?;

    let mut market = Market::from_config(&cfg).context("creating market")?;
    let report = replay(&mut market, &scenario);

    let out = if cfg.report.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");

    info!(
        prob = market.probability(),
        resolution = ?market.resolution(),
        "Done"
    );
    Ok(())
}
