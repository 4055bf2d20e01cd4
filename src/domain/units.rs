//! Fixed-point helpers.
//!
//! All balances and USD values are raw `U256` integers. USD carries 18
//! decimals. Division always floors, and every intermediate product is
//! checked so an overflow becomes `VaultError::Arithmetic` instead of a
//! wrapped value.
//!
//! `Decimal` is used only to render values for logs and metrics.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::error::{VaultError, VaultResult};
use super::strategy::BASIS;

/// Decimals of every USD figure in the engine.
pub const USD_DECIMALS: u8 = 18;

/// `10^exp` as a U256.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// One USD in engine units.
pub fn one_usd() -> U256 {
    pow10(USD_DECIMALS)
}

/// `a * b / denominator`, floored, with overflow and zero-divisor checks.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> VaultResult<U256> {
    if denominator.is_zero() {
        return Err(VaultError::Arithmetic("division by zero"));
    }
    let product = a
        .checked_mul(b)
        .ok_or(VaultError::Arithmetic("multiplication overflow"))?;
    Ok(product / denominator)
}

/// `a * b / denominator`, rounded up.
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> VaultResult<U256> {
    let floored = mul_div(a, b, denominator)?;
    if (a * b) % denominator == U256::ZERO {
        Ok(floored)
    } else {
        checked_add(floored, U256::from(1u64))
    }
}

/// `amount` reduced by `bps` basis points, floored.
pub fn apply_bps_floor(amount: U256, bps: u32) -> VaultResult<U256> {
    let keep = BASIS.saturating_sub(bps);
    mul_div(amount, U256::from(keep), U256::from(BASIS))
}

pub fn checked_add(a: U256, b: U256) -> VaultResult<U256> {
    a.checked_add(b)
        .ok_or(VaultError::Arithmetic("addition overflow"))
}

pub fn checked_sub(a: U256, b: U256) -> VaultResult<U256> {
    a.checked_sub(b)
        .ok_or(VaultError::Arithmetic("subtraction underflow"))
}

/// Renders a raw fixed-point value as a `Decimal`.
///
/// Saturates at `Decimal::MAX` when the value does not fit.
pub fn to_decimal(value: U256, decimals: u8) -> Decimal {
    u128::try_from(value)
        .ok()
        .and_then(|raw| i128::try_from(raw).ok())
        .and_then(|raw| Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).ok())
        .map_or(Decimal::MAX, |rendered| rendered.normalize())
}

/// Lossy float view for gauges.
pub fn to_f64(value: U256, decimals: u8) -> f64 {
    to_decimal(value, decimals).to_f64().unwrap_or(f64::MAX)
}

/// Parses a human-readable amount ("1.5") into raw units.
pub fn parse_units(text: &str, decimals: u8) -> Option<U256> {
    let parsed = Decimal::from_str(text.trim()).ok()?;
    if parsed.is_sign_negative() {
        return None;
    }
    let scale = parsed.scale();
    if scale > u32::from(decimals) {
        return None;
    }
    let mantissa = u128::try_from(parsed.mantissa()).ok()?;
    let shift = u8::try_from(u32::from(decimals) - scale).ok()?;
    U256::from(mantissa).checked_mul(pow10(shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mul_div_floors() {
        let result = mul_div(U256::from(10u64), U256::from(10u64), U256::from(3u64)).unwrap();
        assert_eq!(result, U256::from(33u64));
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        let result = mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO);
        assert!(matches!(result, Err(VaultError::Arithmetic(_))));
    }

    #[test]
    fn test_mul_div_overflow() {
        let result = mul_div(U256::MAX, U256::from(2u64), U256::from(1u64));
        assert!(matches!(result, Err(VaultError::Arithmetic(_))));
    }

    #[test]
    fn test_mul_div_up_rounds_remainder() {
        let up = mul_div_up(U256::from(10u64), U256::from(10u64), U256::from(3u64)).unwrap();
        assert_eq!(up, U256::from(34u64));
        let exact = mul_div_up(U256::from(9u64), U256::from(10u64), U256::from(3u64)).unwrap();
        assert_eq!(exact, U256::from(30u64));
    }

    #[test]
    fn test_bps_floor() {
        let result = apply_bps_floor(U256::from(1_000u64), 50).unwrap();
        assert_eq!(result, U256::from(995u64));
    }

    #[test]
    fn test_to_decimal_renders_usd() {
        let value = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(to_decimal(value, USD_DECIMALS), dec!(1.5));
    }

    #[test]
    fn test_to_decimal_saturates() {
        assert_eq!(to_decimal(U256::MAX, USD_DECIMALS), Decimal::MAX);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 6), Some(U256::from(1_500_000u64)));
        assert_eq!(parse_units("2", 18), Some(pow10(18) * U256::from(2u64)));
        assert_eq!(parse_units("0.0000001", 6), None);
        assert_eq!(parse_units("-1", 6), None);
    }
}
