use serde::{Deserialize, Serialize};

/// Fee schedule handed to every pricing function that charges one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    /// Cut of net winnings and sale proceeds on the parimutuel mechanisms.
    #[serde(rename = "dpmFee", default = "default_dpm_fee")]
    pub dpm_fee: f64,
    /// c in `c * prob * (1 - prob) * shares` on CPMM purchases.
    #[serde(rename = "takerFeeConstant", default = "default_taker_fee")]
    pub taker_fee_constant: f64,
    #[serde(rename = "creatorFraction", default = "default_half")]
    pub creator_fraction: f64,
    #[serde(rename = "platformFraction", default = "default_half")]
    pub platform_fraction: f64,
    #[serde(rename = "liquidityFraction", default)]
    pub liquidity_fraction: f64,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            dpm_fee: default_dpm_fee(),
            taker_fee_constant: default_taker_fee(),
            creator_fraction: default_half(),
            platform_fraction: default_half(),
            liquidity_fraction: 0.0,
        }
    }
}

fn default_dpm_fee() -> f64 {
    0.02
}
fn default_taker_fee() -> f64 {
    0.07
}
fn default_half() -> f64 {
    0.5
}

impl Fees {
    pub fn none() -> Self {
        Self {
            dpm_fee: 0.0,
            taker_fee_constant: 0.0,
            ..Self::default()
        }
    }

    /// Multiplier applied to the part of a payout that is subject to the DPM fee.
    pub fn dpm_keep(&self) -> f64 {
        1.0 - self.dpm_fee
    }

    pub fn taker_fee(&self, shares: f64, prob: f64) -> f64 {
        self.taker_fee_constant * prob * (1.0 - prob) * shares
    }

    pub fn split(&self, total: f64) -> FeeSplit {
        FeeSplit {
            creator_fee: total * self.creator_fraction,
            platform_fee: total * self.platform_fraction,
            liquidity_fee: total * self.liquidity_fraction,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeSplit {
    #[serde(rename = "creatorFee")]
    pub creator_fee: f64,
    #[serde(rename = "platformFee")]
    pub platform_fee: f64,
    #[serde(rename = "liquidityFee")]
    pub liquidity_fee: f64,
}

impl FeeSplit {
    pub fn total(&self) -> f64 {
        self.creator_fee + self.platform_fee + self.liquidity_fee
    }

    pub fn add(&self, other: &FeeSplit) -> FeeSplit {
        FeeSplit {
            creator_fee: self.creator_fee + other.creator_fee,
            platform_fee: self.platform_fee + other.platform_fee,
            liquidity_fee: self.liquidity_fee + other.liquidity_fee,
        }
    }
}
