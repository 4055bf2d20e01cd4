//! Oracle-priced swap router.
//!
//! Settles every swap at the oracle's cross rate minus a fixed slippage,
//! against unlimited synthetic liquidity: the inputs are burned from the
//! custody account and the outputs minted into it in one settlement.
//! Stands in for a DEX router when the engine runs off-chain.

use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use super::bank::{CustodyEntry, MemoryBank};
use crate::domain::units::apply_bps_floor;
use crate::ports::swap_router::{SwapOrder, SwapRouter};
use crate::usecases::price_oracle::PriceOracle;

pub struct OracleSwapRouter {
    bank: Arc<MemoryBank>,
    oracle: Arc<PriceOracle>,
    /// Execution discount against the oracle rate.
    slippage_bps: u32,
}

impl OracleSwapRouter {
    pub fn new(bank: Arc<MemoryBank>, oracle: Arc<PriceOracle>, slippage_bps: u32) -> Self {
        Self {
            bank,
            oracle,
            slippage_bps,
        }
    }
}

#[async_trait]
impl SwapRouter for OracleSwapRouter {
    async fn swap_exact_in(&self, orders: &[SwapOrder]) -> Result<Vec<U256>> {
        let mut fills = Vec::with_capacity(orders.len());
        for order in orders {
            let quoted = self
                .oracle
                .amount_out(order.amount_in, order.token_in, order.token_out)
                .await?;
            let amount_out = apply_bps_floor(quoted, self.slippage_bps)?;
            if amount_out < order.min_amount_out {
                bail!(
                    "insufficient output amount: {amount_out} < {}",
                    order.min_amount_out
                );
            }
            fills.push(amount_out);
        }

        let debits: Vec<CustodyEntry> = orders
            .iter()
            .map(|order| CustodyEntry {
                token: order.token_in,
                holder: order.account,
                amount: order.amount_in,
            })
            .collect();
        let credits: Vec<CustodyEntry> = orders
            .iter()
            .zip(&fills)
            .map(|(order, &amount)| CustodyEntry {
                token: order.token_out,
                holder: order.account,
                amount,
            })
            .collect();
        self.bank.settle(&debits, &credits)?;

        for (order, amount_out) in orders.iter().zip(&fills) {
            debug!(
                account = %order.account,
                token_in = %order.token_in,
                token_out = %order.token_out,
                amount_in = %order.amount_in,
                %amount_out,
                "Swap settled"
            );
        }
        Ok(fills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::feeds::StaticPriceFeed;
    use crate::adapters::memory::ManualClock;
    use crate::domain::units::pow10;
    use alloy::primitives::Address;

    fn token_a() -> Address {
        Address::repeat_byte(0xA1)
    }

    fn token_b() -> Address {
        Address::repeat_byte(0xB2)
    }

    fn pool() -> Address {
        Address::repeat_byte(0x50)
    }

    fn setup(slippage_bps: u32) -> (OracleSwapRouter, Arc<MemoryBank>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let feed = Arc::new(StaticPriceFeed::new(clock.clone()));
        feed.register(token_a(), 100_000_000, 8, 18);
        feed.register(token_b(), 200_000_000, 8, 6);
        let oracle = Arc::new(PriceOracle::new(feed, clock, 3_600));
        let bank = Arc::new(MemoryBank::new());
        bank.mint(token_a(), pool(), U256::from(100u64) * pow10(18)).unwrap();
        (OracleSwapRouter::new(bank.clone(), oracle, slippage_bps), bank)
    }

    fn order(amount_in: U256, min_amount_out: U256) -> SwapOrder {
        SwapOrder {
            account: pool(),
            token_in: token_a(),
            token_out: token_b(),
            amount_in,
            min_amount_out,
        }
    }

    #[tokio::test]
    async fn test_fills_at_discounted_oracle_rate() {
        let (router, bank) = setup(30);
        let ten_a = U256::from(10u64) * pow10(18);

        let fills = router.swap_exact_in(&[order(ten_a, U256::ZERO)]).await.unwrap();

        // 10 A at $1 is 5 B at $2, less 0.3%.
        assert_eq!(fills, vec![U256::from(4_985_000u64)]);
        assert_eq!(bank.balance(token_b(), pool()), U256::from(4_985_000u64));
    }

    #[tokio::test]
    async fn test_one_order_below_floor_settles_nothing() {
        let (router, bank) = setup(30);
        let ten_a = U256::from(10u64) * pow10(18);
        let before = bank.entries();

        let result = router
            .swap_exact_in(&[
                order(ten_a, U256::ZERO),
                order(ten_a, U256::from(5_000_000u64)),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(bank.entries(), before);
    }

    #[tokio::test]
    async fn test_oversold_batch_settles_nothing() {
        let (router, bank) = setup(30);
        let sixty_a = U256::from(60u64) * pow10(18);
        let before = bank.entries();

        let result = router
            .swap_exact_in(&[order(sixty_a, U256::ZERO), order(sixty_a, U256::ZERO)])
            .await;

        assert!(result.is_err());
        assert_eq!(bank.entries(), before);
    }
}
