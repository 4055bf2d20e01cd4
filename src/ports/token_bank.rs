//! Token Bank Port - Custody Transfers
//!
//! Abstracts ERC-20 `transfer`/`transferFrom` and native value moves.
//! The native asset is addressed with the `NATIVE_TOKEN` sentinel.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

/// One leg of a batched custody move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
  pub token: Address,
  pub from: Address,
  pub to: Address,
  pub amount: U256,
}

/// Trait for token custody.
#[async_trait]
pub trait TokenBank: Send + Sync + 'static {
  /// Move `amount` of `token` from `from` to `to`.
  ///
  /// Either the whole amount moves or the call fails with no effect.
  async fn transfer(
    &self,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
  ) -> anyhow::Result<()>;

  /// Move every leg or none of them.
  ///
  /// A failure leaves all balances exactly as they were before the call.
  async fn transfer_batch(&self, transfers: &[Transfer]) -> anyhow::Result<()>;

  /// Raw balance of `holder`.
  async fn balance_of(&self, token: Address, holder: Address) -> anyhow::Result<U256>;
}
