use thiserror::Error;

use crate::core::types::Outcome;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    #[error("invalid pool: YES={yes}, NO={no}")]
    InvalidPool { yes: f64, no: f64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("{operation} is not supported by the {mechanism} mechanism")]
    Unsupported {
        mechanism: &'static str,
        operation: &'static str,
    },

    #[error("{what} is not finite or negative: {value}")]
    Degenerate { what: &'static str, value: f64 },

    #[error("contract already resolved")]
    AlreadyResolved,

    #[error("contract not resolved")]
    NotResolved,

    #[error("unknown bet: {0}")]
    UnknownBet(String),

    #[error("bet {0} was already sold")]
    AlreadySold(String),

    #[error("bet {bet_id} does not belong to {user_id}")]
    NotOwner { bet_id: String, user_id: String },

    #[error("insufficient balance for {user_id}: needs {needed}, has {available}")]
    InsufficientBalance {
        user_id: String,
        needed: String,
        available: String,
    },

    #[error("pool would drop below minimum liquidity on {0}")]
    InsufficientLiquidity(Outcome),
}
