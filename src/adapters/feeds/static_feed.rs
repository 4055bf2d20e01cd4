//! Static Price Feed - Configured and Manually Updated Rounds
//!
//! Holds one round per token. Prices come from `[[tokens]]` in the config
//! or from replayed price updates; each update is stamped with the clock's
//! current time.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::ports::clock::Clock;
use crate::ports::price_feed::{FeedRound, PriceFeed};

pub struct StaticPriceFeed {
    rounds: RwLock<HashMap<Address, FeedRound>>,
    clock: Arc<dyn Clock>,
}

impl StaticPriceFeed {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rounds: RwLock::default(),
            clock,
        }
    }

    /// Register (or replace) a token's feed with a fresh round.
    pub fn register(&self, token: Address, answer: i128, feed_decimals: u8, token_decimals: u8) {
        let round = FeedRound {
            answer,
            feed_decimals,
            token_decimals,
            updated_at: self.clock.now_secs(),
        };
        self.set_round(token, round);
    }

    /// Publish a new answer for an already registered token.
    ///
    /// Returns false when the token has no feed.
    pub fn set_price(&self, token: Address, answer: i128) -> bool {
        let now = self.clock.now_secs();
        let mut rounds = self.rounds.write().unwrap_or_else(PoisonError::into_inner);
        match rounds.get_mut(&token) {
            Some(round) => {
                round.answer = answer;
                round.updated_at = now;
                debug!(%token, answer, "Price updated");
                true
            }
            None => false,
        }
    }

    /// Store a round verbatim, timestamp included.
    pub fn set_round(&self, token: Address, round: FeedRound) {
        self.rounds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, round);
    }

    pub fn remove(&self, token: Address) {
        self.rounds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token);
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn latest_round(&self, token: Address) -> Result<Option<FeedRound>> {
        Ok(self
            .rounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token)
            .copied())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
