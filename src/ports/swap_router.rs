//! Swap Router Port - Exact-Input Token Swaps
//!
//! The router moves tokens held in custody by `account`: it debits
//! `amount_in` of `token_in` and credits the output of `token_out` to the
//! same account. Orders are submitted as a batch that settles as a unit.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

/// A single exact-input swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOrder {
  /// Custody account whose balances are swapped.
  pub account: Address,
  pub token_in: Address,
  pub token_out: Address,
  /// Raw amount of `token_in` sold.
  pub amount_in: U256,
  /// Minimum raw amount of `token_out` accepted.
  pub min_amount_out: U256,
}

/// Trait for swap execution venues.
#[async_trait]
pub trait SwapRouter: Send + Sync + 'static {
  /// Execute every order and return the amounts received, index-aligned
  /// with `orders`.
  ///
  /// The batch settles entirely or not at all. An order that would
  /// deliver less than its `min_amount_out` fails the whole batch before
  /// any custody moves.
  async fn swap_exact_in(&self, orders: &[SwapOrder]) -> anyhow::Result<Vec<U256>>;
}
