//! Price Oracle - USD Valuation and Cross-Token Quotes
//!
//! Converts raw token amounts into 18-decimal USD using the latest feed
//! round for each token:
//!
//!   usd = amount * answer * 10^18 / (10^feed_decimals * 10^token_decimals)
//!
//! A round is rejected when its answer is not positive or when it is older
//! than the configured freshness bound. Cross-token quotes go through USD.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::domain::error::{OracleError, VaultError, VaultResult};
use crate::domain::units::{checked_add, mul_div, one_usd, pow10};
use crate::ports::clock::Clock;
use crate::ports::price_feed::{FeedRound, PriceFeed};

/// Validated price of one token.
#[derive(Debug, Clone, Copy)]
struct Quote {
  price: U256,
  feed_decimals: u8,
  token_decimals: u8,
}

impl Quote {
  fn scale(&self) -> VaultResult<U256> {
    pow10(self.feed_decimals)
      .checked_mul(pow10(self.token_decimals))
      .ok_or(VaultError::Arithmetic("price scale overflow"))
  }

  fn to_usd(&self, amount: U256) -> VaultResult<U256> {
    let priced = amount
      .checked_mul(self.price)
      .ok_or(VaultError::Arithmetic("amount times price overflow"))?;
    mul_div(priced, one_usd(), self.scale()?)
  }

  fn from_usd(&self, usd: U256) -> VaultResult<U256> {
    let denominator = self
      .price
      .checked_mul(one_usd())
      .ok_or(VaultError::Arithmetic("price scale overflow"))?;
    mul_div(usd, self.scale()?, denominator)
  }
}

/// USD valuation service shared by every strategy.
pub struct PriceOracle {
  feed: Arc<dyn PriceFeed>,
  clock: Arc<dyn Clock>,
  /// Rounds older than this are stale.
  max_feed_age_secs: u64,
}

impl PriceOracle {
  pub fn new(feed: Arc<dyn PriceFeed>, clock: Arc<dyn Clock>, max_feed_age_secs: u64) -> Self {
    Self {
      feed,
      clock,
      max_feed_age_secs,
    }
  }

  async fn quote(&self, token: Address) -> VaultResult<Quote> {
    let round: FeedRound = self
      .feed
      .latest_round(token)
      .await
      .map_err(|e| VaultError::external("price_feed.latest_round", &e))?
      .ok_or(OracleError::UnknownFeed(token))?;

    let age_secs = self.clock.now_secs().saturating_sub(round.updated_at);
    if round.answer <= 0 || age_secs > self.max_feed_age_secs {
      return Err(
        OracleError::StaleFeed {
          token,
          answer: round.answer,
          age_secs,
        }
        .into(),
      );
    }

    Ok(Quote {
      price: U256::from(round.answer.unsigned_abs()),
      feed_decimals: round.feed_decimals,
      token_decimals: round.token_decimals,
    })
  }

  /// USD value of `amount_in` of `token_in`.
  ///
  /// A zero amount is worth zero without consulting the feed.
  pub async fn amount_out_in_usd(&self, amount_in: U256, token_in: Address) -> VaultResult<U256> {
    if amount_in.is_zero() {
      return Ok(U256::ZERO);
    }
    self.quote(token_in).await?.to_usd(amount_in)
  }

  /// Sum of the USD values of index-aligned `amounts` and `tokens`.
  pub async fn amounts_out_in_usd(&self, amounts: &[U256], tokens: &[Address]) -> VaultResult<U256> {
    ensure_aligned(amounts, tokens)?;
    let mut total = U256::ZERO;
    for (&amount, &token) in amounts.iter().zip(tokens) {
      total = checked_add(total, self.amount_out_in_usd(amount, token).await?)?;
    }
    Ok(total)
  }

  /// Per-token USD values, index-aligned with the input.
  pub async fn values_in_usd(&self, amounts: &[U256], tokens: &[Address]) -> VaultResult<Vec<U256>> {
    ensure_aligned(amounts, tokens)?;
    let mut values = Vec::with_capacity(amounts.len());
    for (&amount, &token) in amounts.iter().zip(tokens) {
      values.push(self.amount_out_in_usd(amount, token).await?);
    }
    Ok(values)
  }

  /// Amount of `token` worth `usd`.
  pub async fn usd_to_amount(&self, usd: U256, token: Address) -> VaultResult<U256> {
    if usd.is_zero() {
      return Ok(U256::ZERO);
    }
    self.quote(token).await?.from_usd(usd)
  }

  /// Amount of `token_out` equivalent to `amount_in` of `token_in`.
  pub async fn amount_out(
    &self,
    amount_in: U256,
    token_in: Address,
    token_out: Address,
  ) -> VaultResult<U256> {
    if token_in == token_out {
      return Ok(amount_in);
    }
    let usd = self.amount_out_in_usd(amount_in, token_in).await?;
    let out = self.usd_to_amount(usd, token_out).await?;
    debug!(%token_in, %token_out, %amount_in, %out, "Cross-token quote");
    Ok(out)
  }

  /// Amount of `token_out` equivalent to the whole basket.
  ///
  /// Entries already denominated in `token_out` are added as-is.
  pub async fn amounts_out(
    &self,
    amounts: &[U256],
    tokens: &[Address],
    token_out: Address,
  ) -> VaultResult<U256> {
    ensure_aligned(amounts, tokens)?;
    let mut direct = U256::ZERO;
    let mut usd = U256::ZERO;
    for (&amount, &token) in amounts.iter().zip(tokens) {
      if token == token_out {
        direct = checked_add(direct, amount)?;
      } else {
        usd = checked_add(usd, self.amount_out_in_usd(amount, token).await?)?;
      }
    }
    checked_add(direct, self.usd_to_amount(usd, token_out).await?)
  }

  pub async fn is_healthy(&self) -> bool {
    self.feed.is_healthy().await
  }
}

fn ensure_aligned(amounts: &[U256], tokens: &[Address]) -> VaultResult<()> {
  if amounts.len() != tokens.len() {
    return Err(
      OracleError::LengthMismatch {
        amounts: amounts.len(),
        tokens: tokens.len(),
      }
      .into(),
    );
  }
  Ok(())
}
