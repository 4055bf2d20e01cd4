//! Per-account revenue bookkeeping.
//!
//! `unclaimed` grows when someone funds the account and shrinks by exactly
//! the amount moved into `claimed` on withdrawal. Nothing else touches
//! either counter.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::error::{VaultError, VaultResult};
use super::units::checked_add;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueAccount {
    pub claimed: U256,
    pub unclaimed: U256,
}

impl RevenueAccount {
    pub fn credit(&mut self, amount: U256) -> VaultResult<()> {
        self.unclaimed = checked_add(self.unclaimed, amount)?;
        Ok(())
    }

    pub fn claim(&mut self, amount: U256) -> VaultResult<()> {
        if amount > self.unclaimed {
            return Err(VaultError::InsufficientFunds {
                requested: amount,
                available: self.unclaimed,
            });
        }
        self.unclaimed -= amount;
        self.claimed = checked_add(self.claimed, amount)?;
        Ok(())
    }

    /// Lifetime earnings.
    pub fn total(&self) -> U256 {
        self.claimed.saturating_add(self.unclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_then_claim() {
        let mut account = RevenueAccount::default();
        account.credit(U256::from(10u64)).unwrap();
        account.claim(U256::from(4u64)).unwrap();
        assert_eq!(account.unclaimed, U256::from(6u64));
        assert_eq!(account.claimed, U256::from(4u64));
        assert_eq!(account.total(), U256::from(10u64));
    }

    #[test]
    fn test_overclaim_leaves_account_untouched() {
        let mut account = RevenueAccount::default();
        account.credit(U256::from(3u64)).unwrap();
        let result = account.claim(U256::from(4u64));
        assert!(matches!(result, Err(VaultError::InsufficientFunds { .. })));
        assert_eq!(account.unclaimed, U256::from(3u64));
        assert_eq!(account.claimed, U256::ZERO);
    }
}
