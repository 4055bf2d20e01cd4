//! Price Feed Port - Per-Token USD Price Rounds
//!
//! Defines the trait the price oracle reads raw feed rounds from.
//! A round is the feed's latest answer plus the decimals needed to
//! scale it; the oracle applies freshness rules on top.

use alloy::primitives::Address;
use async_trait::async_trait;

/// Latest answer of a token's USD price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRound {
  /// Signed price answer as reported by the feed.
  pub answer: i128,
  /// Decimals of `answer`.
  pub feed_decimals: u8,
  /// Decimals of the token being priced.
  pub token_decimals: u8,
  /// Unix seconds of the last update.
  pub updated_at: u64,
}

/// Source of per-token price rounds.
#[async_trait]
pub trait PriceFeed: Send + Sync + 'static {
  /// Latest round for `token`, or `None` when no feed is registered.
  async fn latest_round(&self, token: Address) -> anyhow::Result<Option<FeedRound>>;

  /// Check if the feed source is reachable.
  async fn is_healthy(&self) -> bool;
}
