pub mod decimal_serde;

use log::error;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::constants::{MONEY_DECIMAL_PRECISION, RATE_DECIMAL_PRECISION};

/// Rounds a monetary amount to its display precision, half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        MONEY_DECIMAL_PRECISION,
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Rounds an exchange rate to its storage precision, half-up.
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        RATE_DECIMAL_PRECISION,
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Parses a decimal stored as TEXT, accepting scientific notation.
/// Unparseable values are logged and read as zero.
pub fn parse_decimal(value: &str, field: &str) -> Decimal {
    match Decimal::from_str(value) {
        Ok(d) => d,
        Err(_) => match Decimal::from_scientific(value) {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to parse {} '{}' as decimal: {}", field, value, e);
                Decimal::ZERO
            }
        },
    }
}

/// Parses an optional decimal TEXT column.
pub fn parse_decimal_opt(value: Option<&str>, field: &str) -> Option<Decimal> {
    value.map(|s| parse_decimal(s, field))
}
