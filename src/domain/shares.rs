//! Share accounting math.
//!
//! Shares are a pure claim on the pool. The first deposit into an empty
//! pool mints one share per USD (18 decimals); every later deposit mints
//! in proportion to the pool's USD value at deposit time, so existing
//! holders are never diluted by an entrant. All division floors, which
//! rounds in the pool's favour.

use alloy::primitives::U256;

use super::error::{ValidationError, VaultResult};
use super::units::{mul_div, one_usd};

/// Shares minted for a deposit worth `deposit_usd`.
///
/// `pool_usd` is the pool value before the deposit. A pool with shares
/// outstanding but no USD value is rejected rather than minting at an
/// infinite price.
pub fn shares_for_deposit(
    deposit_usd: U256,
    total_shares: U256,
    pool_usd: U256,
) -> VaultResult<U256> {
    if total_shares.is_zero() {
        return Ok(deposit_usd);
    }
    if pool_usd.is_zero() {
        return Err(ValidationError::PoolHasNoValue.into());
    }
    mul_div(deposit_usd, total_shares, pool_usd)
}

/// Each balance scaled by `shares / total_shares`, floored.
pub fn pro_rata(balances: &[U256], shares: U256, total_shares: U256) -> VaultResult<Vec<U256>> {
    balances
        .iter()
        .map(|&balance| mul_div(balance, shares, total_shares))
        .collect()
}

/// USD value of one whole share (18 decimals).
///
/// Defined as one USD for an empty pool.
pub fn price_per_share(pool_usd: U256, total_shares: U256) -> VaultResult<U256> {
    if total_shares.is_zero() {
        return Ok(one_usd());
    }
    mul_div(pool_usd, one_usd(), total_shares)
}
