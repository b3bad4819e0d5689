use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Serialize;

use crate::error::PricingError;

/// Decimal places kept on balances.
const BALANCE_DP: u32 = 8;

/// Converts a mechanism amount into ledger money.
pub fn to_money(value: f64) -> Result<Decimal, PricingError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(BALANCE_DP))
        .ok_or(PricingError::Degenerate {
            what: "amount",
            value,
        })
}

/// Play-money balances. Accounts open lazily at the starting balance.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    #[serde(rename = "startingBalance")]
    starting_balance: Decimal,
    balances: HashMap<String, Decimal>,
}

impl Ledger {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            starting_balance,
            balances: HashMap::new(),
        }
    }

    pub fn balance(&self, user_id: &str) -> Decimal {
        self.balances
            .get(user_id)
            .copied()
            .unwrap_or(self.starting_balance)
    }

    pub fn ensure(&self, user_id: &str, amount: Decimal) -> Result<(), PricingError> {
        let available = self.balance(user_id);
        if available < amount {
            return Err(PricingError::InsufficientBalance {
                user_id: user_id.to_string(),
                needed: amount.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, user_id: &str, amount: Decimal) -> Result<Decimal, PricingError> {
        self.ensure(user_id, amount)?;
        let balance = self.balance(user_id) - amount;
        self.balances.insert(user_id.to_string(), balance);
        Ok(balance)
    }

    pub fn credit(&mut self, user_id: &str, amount: Decimal) -> Decimal {
        let balance = self.balance(user_id) + amount;
        self.balances.insert(user_id.to_string(), balance);
        balance
    }
}
