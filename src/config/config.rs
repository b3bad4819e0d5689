use anyhow::{Context, Result};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::pricing::fees::Fees;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub fees: Fees,
    #[serde(default)]
    pub market: MarketCfg,
    #[serde(default)]
    pub report: ReportCfg,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum MechanismKind {
    #[default]
    #[serde(rename = "dpm-pool")]
    DpmPool,
    #[serde(rename = "dpm-weight")]
    DpmWeight,
    #[serde(rename = "dpm-2")]
    Dpm2,
    #[serde(rename = "cpmm-1")]
    Cpmm1,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketCfg {
    #[serde(default)]
    pub mechanism: MechanismKind,
    #[serde(default = "default_question")]
    pub question: String,
    /// Creator's real subsidy.
    #[serde(default = "default_ante")]
    pub ante: f64,
    /// Seed that prices the market but is never paid out.
    #[serde(rename = "phantomAnte", default = "default_phantom_ante")]
    pub phantom_ante: f64,
    #[serde(rename = "initialProbability", default = "default_initial_probability")]
    pub initial_probability: f64,
    #[serde(rename = "startingBalance", default = "default_starting_balance")]
    pub starting_balance: f64,
}

impl Default for MarketCfg {
    fn default() -> Self {
        Self {
            mechanism: MechanismKind::default(),
            question: default_question(),
            ante: default_ante(),
            phantom_ante: default_phantom_ante(),
            initial_probability: default_initial_probability(),
            starting_balance: default_starting_balance(),
        }
    }
}
fn default_question() -> String {
    "Will this market resolve YES?".into()
}
fn default_ante() -> f64 {
    100.0
}
fn default_phantom_ante() -> f64 {
    200.0
}
fn default_initial_probability() -> f64 {
    0.5
}
fn default_starting_balance() -> f64 {
    1000.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportCfg {
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for ReportCfg {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
        }
    }
}
fn default_pretty() -> bool {
    true
}

/// Keys renamed to camelCase. Environment keys arrive lowercased (`MARKET__INITIALPROBABILITY`
/// becomes `market.initialprobability`), so these are mapped back explicitly.
const CAMEL_CASE_KEYS: &[&str] = &[
    "fees.dpmFee",
    "fees.takerFeeConstant",
    "fees.creatorFraction",
    "fees.platformFraction",
    "fees.liquidityFraction",
    "market.phantomAnte",
    "market.initialProbability",
    "market.startingBalance",
];

fn env_source() -> Environment {
    Environment::default().separator("__").try_parsing(true)
}

fn camel_case_env_overrides(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>> {
    let env = Config::builder()
        .add_source(env_source())
        .build()
        .context("reading environment")?;
    for key in CAMEL_CASE_KEYS {
        if let Ok(value) = env.get::<config::Value>(&key.to_lowercase()) {
            builder = builder
                .set_override(*key, value)
                .with_context(|| format!("overriding {key}"))?;
        }
    }
    Ok(builder)
}

impl AppCfg {
    pub fn load(path: &str) -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env_source());
        let cfg = camel_case_env_overrides(builder)?
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        let fees = &self.fees;
        anyhow::ensure!(
            (0.0..1.0).contains(&fees.dpm_fee),
            "fees.dpmFee must be in [0, 1)"
        );
        anyhow::ensure!(
            fees.taker_fee_constant >= 0.0,
            "fees.takerFeeConstant must be >= 0"
        );
        let split = fees.creator_fraction + fees.platform_fraction + fees.liquidity_fraction;
        anyhow::ensure!(
            (split - 1.0).abs() < 1e-9,
            "fees fractions must sum to 1, got {split}"
        );

        let market = &self.market;
        anyhow::ensure!(
            market.initial_probability > 0.0 && market.initial_probability < 1.0,
            "market.initialProbability must be in (0, 1)"
        );
        anyhow::ensure!(market.ante >= 0.0, "market.ante must be >= 0");
        anyhow::ensure!(
            market.phantom_ante >= 0.0,
            "market.phantomAnte must be >= 0"
        );
        anyhow::ensure!(
            market.ante + market.phantom_ante > 0.0,
            "market needs a non-empty seed"
        );
        anyhow::ensure!(
            market.starting_balance >= 0.0,
            "market.startingBalance must be >= 0"
        );
        if market.mechanism == MechanismKind::Cpmm1 {
            anyhow::ensure!(market.ante > 0.0, "cpmm-1 markets need market.ante > 0");
        }
        Ok(())
    }
}
