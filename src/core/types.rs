use serde::{Deserialize, Serialize};

use crate::error::PricingError;

// ----------- Outcomes -----------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Outcome {
    pub fn opposite(self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// Terminal state of a contract. `Mkt` resolves to a probability instead of a side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "CANCEL")]
    Cancel,
    #[serde(rename = "MKT")]
    Mkt,
}

impl Resolution {
    /// The winning side, if the resolution names one.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Resolution::Yes => Some(Outcome::Yes),
            Resolution::No => Some(Outcome::No),
            Resolution::Cancel | Resolution::Mkt => None,
        }
    }
}

impl From<Outcome> for Resolution {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Yes => Resolution::Yes,
            Outcome::No => Resolution::No,
        }
    }
}

// ----------- Pools -----------------

/// A per-outcome pair of amounts. Used for stakes, shares, weights and bet totals alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    #[serde(rename = "YES")]
    pub yes: f64,
    #[serde(rename = "NO")]
    pub no: f64,
}

impl Pool {
    /// Validated constructor: both sides must be finite and non-negative.
    pub fn new(yes: f64, no: f64) -> Result<Self, PricingError> {
        if !yes.is_finite() || !no.is_finite() || yes < 0.0 || no < 0.0 {
            return Err(PricingError::InvalidPool { yes, no });
        }
        Ok(Self { yes, no })
    }

    pub const fn zero() -> Self {
        Self { yes: 0.0, no: 0.0 }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Yes => self.yes,
            Outcome::No => self.no,
        }
    }

    /// (own side, other side) from the point of view of `outcome`.
    pub fn sides(&self, outcome: Outcome) -> (f64, f64) {
        (self.get(outcome), self.get(outcome.opposite()))
    }

    pub fn with_added(&self, outcome: Outcome, amount: f64) -> Self {
        match outcome {
            Outcome::Yes => Self {
                yes: self.yes + amount,
                no: self.no,
            },
            Outcome::No => Self {
                yes: self.yes,
                no: self.no + amount,
            },
        }
    }

    pub fn total(&self) -> f64 {
        self.yes + self.no
    }

    pub fn mirrored(&self) -> Self {
        Self {
            yes: self.no,
            no: self.yes,
        }
    }
}

// ----------- Bets -----------------

/// A bet as placed. Never edited after creation; sales are recorded separately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub outcome: Outcome,
    pub amount: f64,
    /// Claim fixed at bet time. Pool shares, DPM weight or CPMM shares depending on mechanism.
    pub shares: f64,
    #[serde(rename = "probBefore")]
    pub prob_before: f64,
    #[serde(rename = "probAfter")]
    pub prob_after: f64,
    #[serde(rename = "createdTime")]
    pub created_time: i64,
}

impl Bet {
    /// Bare bet, mostly for quoting against a contract the bet was never placed on.
    pub fn quote(outcome: Outcome, amount: f64, shares: f64) -> Self {
        Self {
            id: String::new(),
            outcome,
            amount,
            shares,
            prob_before: 0.0,
            prob_after: 0.0,
            created_time: 0,
        }
    }

    pub fn mirrored(&self) -> Self {
        Self {
            outcome: self.outcome.opposite(),
            prob_before: 1.0 - self.prob_before,
            prob_after: 1.0 - self.prob_after,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    #[serde(rename = "betId")]
    pub bet_id: String,
    pub amount: f64,
    pub fee: f64,
    #[serde(rename = "probBefore")]
    pub prob_before: f64,
    #[serde(rename = "probAfter")]
    pub prob_after: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    #[serde(rename = "betId")]
    pub bet_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub amount: f64,
}
