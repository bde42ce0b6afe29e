use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::payments::error::PaymentError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    /// Fixed amount in the order currency.
    Nominal,
    /// Percentage of the order total, e.g. `2.5`.
    Percent,
}

impl FromStr for FeeType {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "nominal" | "fixed" => Ok(FeeType::Nominal),
            "percent" | "percentage" => Ok(FeeType::Percent),
            other => Err(PaymentError::validation(
                format!("unsupported fee type: {}", other),
                Some("fee_type"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeePolicy {
    pub fee_type: FeeType,
    pub fee_value: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_type: FeeType::Nominal,
            fee_value: Decimal::ZERO,
        }
    }
}

impl FeePolicy {
    pub fn apply(&self, amount: Decimal) -> Decimal {
        compute_fee(amount, self.fee_type, self.fee_value)
    }
}

/// Fee in the order currency, rounded half away from zero to two decimals.
pub fn compute_fee(amount: Decimal, fee_type: FeeType, fee_value: Decimal) -> Decimal {
    let fee = match fee_type {
        FeeType::Percent => amount * fee_value / Decimal::ONE_HUNDRED,
        FeeType::Nominal => fee_value,
    };
    fee.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
