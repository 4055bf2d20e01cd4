//! Agent Authority Port - Role Lookups for Governed Actions
//!
//! Answers whether an address holds the agent role for a strategy.
//! Role management itself lives outside the engine.

use alloy::primitives::Address;
use async_trait::async_trait;

#[async_trait]
pub trait AgentAuthority: Send + Sync + 'static {
  /// Whether `caller` may execute actions on `strategy`.
  async fn is_agent(&self, strategy: Address, caller: Address) -> anyhow::Result<bool>;
}
