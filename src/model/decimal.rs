//! Exact wei <-> decimal conversions. Token amounts, balances and price
//! multipliers are never represented as `f64` anywhere in this crate.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Number of decimals most ERC-20s on these chains use (JEWEL, CRYSTAL,
/// governance tokens). Individual callers that need a different scale pass
/// it explicitly.
pub const WEI_DECIMALS: u32 = 18;

/// Converts a raw on-chain integer amount (as a decimal string, since
/// values can exceed `u128`) into a human-scale `Decimal` with the given
/// number of token decimals.
pub fn from_wei_str(raw: &str, decimals: u32) -> anyhow::Result<Decimal> {
    let value: Decimal = raw
        .parse()
        .map_err(|e| anyhow::anyhow!("not a valid integer amount '{raw}': {e}"))?;
    Ok(value / scale(decimals))
}

/// Converts a human-scale `Decimal` amount back into a raw integer string
/// at the given number of token decimals, truncating any precision beyond
/// that scale (never rounds up, to avoid over-crediting).
pub fn to_wei_str(amount: Decimal, decimals: u32) -> String {
    let scaled = (amount * scale(decimals)).trunc();
    scaled.to_string()
}

fn scale(decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(decimals.min(28)), 0)
}

/// Best-effort lossy conversion, only for contexts that are already
/// display-only (logging, rough comparisons in tests) -- never used for
/// ledger or on-chain math.
pub fn to_f64_lossy(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_18_decimal_amount() {
        let raw = "25000000000000000000"; // 25.0 JEWEL
        let dec = from_wei_str(raw, WEI_DECIMALS).unwrap();
        assert_eq!(dec, Decimal::from_str("25").unwrap());
        assert_eq!(to_wei_str(dec, WEI_DECIMALS), raw);
    }

    #[test]
    fn truncates_rather_than_rounds_up() {
        let dec = Decimal::from_str("1.23456789").unwrap();
        let raw = to_wei_str(dec, 6);
        assert_eq!(raw, "1234567");
    }
}
