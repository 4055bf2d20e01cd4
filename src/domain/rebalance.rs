//! Swap planning for governed rebalancing.
//!
//! Plans are computed in USD space and translated back into token amounts
//! using each token's own balance/value ratio, so a plan never asks to sell
//! more of a token than the pool holds. Surplus and deficit tokens are
//! matched in index order, which keeps the plan deterministic.

use alloy::primitives::U256;

use super::error::VaultResult;
use super::strategy::BASIS;
use super::units::{checked_add, mul_div};

/// One planned swap between two pool tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapLeg {
    /// Index of the token sold.
    pub from: usize,
    /// Index of the token bought.
    pub to: usize,
    /// Raw amount of `from` sold.
    pub amount_in: U256,
    /// USD value (18 decimals) moved by this leg.
    pub value_usd: U256,
}

/// Legs that move the pool from its current USD distribution towards
/// `ratio`.
///
/// `balances`, `values_usd` and `ratio` are index-aligned with the token
/// list. Legs worth zero token units are dropped.
pub fn plan(balances: &[U256], values_usd: &[U256], ratio: &[u32]) -> VaultResult<Vec<SwapLeg>> {
    let total = values_usd
        .iter()
        .try_fold(U256::ZERO, |acc, &value| checked_add(acc, value))?;
    if total.is_zero() {
        return Ok(Vec::new());
    }

    let mut surplus = Vec::new();
    let mut deficit = Vec::new();
    for (index, (&value, &weight)) in values_usd.iter().zip(ratio).enumerate() {
        let target = mul_div(total, U256::from(weight), U256::from(BASIS))?;
        if value > target {
            surplus.push((index, value - target));
        } else if target > value {
            deficit.push((index, target - value));
        }
    }

    let mut legs = Vec::new();
    let (mut s, mut d) = (0, 0);
    while s < surplus.len() && d < deficit.len() {
        let (from, excess) = surplus[s];
        let (to, need) = deficit[d];
        let moved = excess.min(need);

        let amount_in = mul_div(balances[from], moved, values_usd[from])?;
        if !amount_in.is_zero() {
            legs.push(SwapLeg {
                from,
                to,
                amount_in,
                value_usd: moved,
            });
        }

        surplus[s].1 = excess - moved;
        deficit[d].1 = need - moved;
        if surplus[s].1.is_zero() {
            s += 1;
        }
        if deficit[d].1.is_zero() {
            d += 1;
        }
    }

    Ok(legs)
}

/// Legs that sell every non-target balance into `target`.
pub fn plan_collapse(balances: &[U256], values_usd: &[U256], target: usize) -> Vec<SwapLeg> {
    balances
        .iter()
        .zip(values_usd)
        .enumerate()
        .filter(|&(index, (balance, _))| index != target && !balance.is_zero())
        .map(|(index, (&amount_in, &value_usd))| SwapLeg {
            from: index,
            to: target,
            amount_in,
            value_usd,
        })
        .collect()
}
