//! Chainlink Price Feed - Aggregator Reads over JSON-RPC
//!
//! Implements the `PriceFeed` port by calling `latestRoundData()` on each
//! configured aggregator. Aggregator decimals are read once at startup,
//! together with a code-existence check so a misconfigured address fails
//! fast instead of at the first valuation.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, U256};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument};

use super::provider::ChainProvider;
use crate::ports::price_feed::{FeedRound, PriceFeed};

/// One token's aggregator binding.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorBinding {
    pub token: Address,
    pub aggregator: Address,
    pub token_decimals: u8,
}

#[derive(Debug, Clone, Copy)]
struct Aggregator {
    address: Address,
    feed_decimals: u8,
    token_decimals: u8,
}

pub struct ChainlinkFeed {
    provider: Arc<ChainProvider>,
    aggregators: HashMap<Address, Aggregator>,
}

impl ChainlinkFeed {
    /// Validate every aggregator and read its decimals.
    #[instrument(skip_all, fields(feeds = bindings.len()))]
    pub async fn connect(provider: Arc<ChainProvider>, bindings: &[AggregatorBinding]) -> Result<Self> {
        let mut aggregators = HashMap::with_capacity(bindings.len());
        for binding in bindings {
            provider
                .ensure_contract("aggregator", binding.aggregator)
                .await?;
            let word = provider
                .call(binding.aggregator, selector("decimals()").to_vec())
                .await
                .context("decimals() call failed")?;
            let feed_decimals = decode_u8(&word)?;

            info!(
                token = %binding.token,
                aggregator = %binding.aggregator,
                feed_decimals,
                "Aggregator validated"
            );
            aggregators.insert(
                binding.token,
                Aggregator {
                    address: binding.aggregator,
                    feed_decimals,
                    token_decimals: binding.token_decimals,
                },
            );
        }
        Ok(Self {
            provider,
            aggregators,
        })
    }
}

#[async_trait]
impl PriceFeed for ChainlinkFeed {
    async fn latest_round(&self, token: Address) -> Result<Option<FeedRound>> {
        let Some(aggregator) = self.aggregators.get(&token) else {
            return Ok(None);
        };
        let data = self
            .provider
            .call(aggregator.address, selector("latestRoundData()").to_vec())
            .await
            .context("latestRoundData() call failed")?;
        let (answer, updated_at) = decode_round(&data)?;
        Ok(Some(FeedRound {
            answer,
            feed_decimals: aggregator.feed_decimals,
            token_decimals: aggregator.token_decimals,
            updated_at,
        }))
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn decode_u8(data: &[u8]) -> Result<u8> {
    if data.len() < 32 {
        bail!("short return data: {} bytes", data.len());
    }
    let value = U256::from_be_slice(&data[..32]);
    u8::try_from(value).context("decimals out of range")
}

/// Extract `(answer, updatedAt)` from the five-word `latestRoundData` tuple.
fn decode_round(data: &[u8]) -> Result<(i128, u64)> {
    if data.len() < 160 {
        bail!("short latestRoundData return: {} bytes", data.len());
    }
    let answer = decode_int256_as_i128(&data[32..64])?;
    let updated_at = u64::try_from(U256::from_be_slice(&data[96..128]))
        .context("updatedAt out of range")?;
    Ok((answer, updated_at))
}

/// Two's-complement int256 narrowed to i128, rejecting values that do not fit.
fn decode_int256_as_i128(word: &[u8]) -> Result<i128> {
    let (high, low) = word.split_at(16);
    let mut low_bytes = [0u8; 16];
    low_bytes.copy_from_slice(low);
    let value = i128::from_be_bytes(low_bytes);
    let sign_fill = if value < 0 { 0xFF } else { 0x00 };
    if high.iter().any(|&byte| byte != sign_fill) {
        bail!("int256 answer does not fit in i128");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: i128) -> [u8; 32] {
        let mut out = if value < 0 { [0xFF; 32] } else { [0u8; 32] };
        out[16..].copy_from_slice(&value.to_be_bytes());
        out
    }

    #[test]
    fn test_selectors_match_abi() {
        assert_eq!(selector("latestRoundData()"), [0xfe, 0xaf, 0x96, 0x8c]);
        assert_eq!(selector("decimals()"), [0x31, 0x3c, 0xe5, 0x67]);
    }

    #[test]
    fn test_decode_round() {
        let mut data = Vec::new();
        data.extend_from_slice(&word(7)); // roundId
        data.extend_from_slice(&word(300_000_000_000)); // answer
        data.extend_from_slice(&word(1_700_000_000)); // startedAt
        data.extend_from_slice(&word(1_700_000_100)); // updatedAt
        data.extend_from_slice(&word(7)); // answeredInRound

        let (answer, updated_at) = decode_round(&data).unwrap();
        assert_eq!(answer, 300_000_000_000);
        assert_eq!(updated_at, 1_700_000_100);
    }

    #[test]
    fn test_negative_answer_survives() {
        assert_eq!(decode_int256_as_i128(&word(-5)).unwrap(), -5);
    }

    #[test]
    fn test_oversized_answer_rejected() {
        let mut data = [0u8; 32];
        data[0] = 0x01;
        assert!(decode_int256_as_i128(&data).is_err());
    }

    #[test]
    fn test_short_return_rejected() {
        assert!(decode_round(&[0u8; 64]).is_err());
        assert!(decode_u8(&[0u8; 4]).is_err());
    }
}
