//! In-memory token custody.
//!
//! Balances are keyed by `(token, holder)`. Transfers and settlements are
//! all-or-nothing: an insufficient source balance fails before anything
//! moves, however many legs the batch has. The native
//! asset is just another token keyed by the sentinel address.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ports::token_bank::{TokenBank, Transfer};

/// One persisted custody balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub token: Address,
    pub holder: Address,
    pub amount: U256,
}

#[derive(Debug, Default)]
pub struct MemoryBank {
    balances: RwLock<BTreeMap<(Address, Address), U256>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild custody from a snapshot.
    pub fn from_entries(entries: &[CustodyEntry]) -> Self {
        let balances = entries
            .iter()
            .filter(|entry| !entry.amount.is_zero())
            .map(|entry| ((entry.token, entry.holder), entry.amount))
            .collect();
        Self {
            balances: RwLock::new(balances),
        }
    }

    /// Credit `amount` out of thin air (wallet seeding, synthetic liquidity).
    pub fn mint(&self, token: Address, holder: Address, amount: U256) -> Result<()> {
        let mut balances = self.write();
        let slot = balances.entry((token, holder)).or_default();
        let Some(next) = slot.checked_add(amount) else {
            bail!("balance overflow minting {amount} of {token} to {holder}");
        };
        *slot = next;
        Ok(())
    }

    /// Apply every debit, then every credit, under one lock.
    ///
    /// Balances are staged first, so an insufficient debit or an
    /// overflowing credit fails with nothing applied.
    pub fn settle(&self, debits: &[CustodyEntry], credits: &[CustodyEntry]) -> Result<()> {
        let mut balances = self.write();
        let mut staged: BTreeMap<(Address, Address), U256> = BTreeMap::new();

        for debit in debits {
            let key = (debit.token, debit.holder);
            let held = staged
                .get(&key)
                .or_else(|| balances.get(&key))
                .copied()
                .unwrap_or_default();
            let Some(rest) = held.checked_sub(debit.amount) else {
                bail!(
                    "insufficient {} balance for {}: have {held}, need {}",
                    debit.token,
                    debit.holder,
                    debit.amount
                );
            };
            staged.insert(key, rest);
        }
        for credit in credits {
            let key = (credit.token, credit.holder);
            let held = staged
                .get(&key)
                .or_else(|| balances.get(&key))
                .copied()
                .unwrap_or_default();
            let Some(next) = held.checked_add(credit.amount) else {
                bail!("balance overflow crediting {}", credit.holder);
            };
            staged.insert(key, next);
        }

        balances.extend(staged);
        Ok(())
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.read()
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Non-zero balances in key order.
    pub fn entries(&self) -> Vec<CustodyEntry> {
        self.read()
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(&(token, holder), &amount)| CustodyEntry {
                token,
                holder,
                amount,
            })
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<(Address, Address), U256>> {
        self.balances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<(Address, Address), U256>> {
        self.balances.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenBank for MemoryBank {
    async fn transfer(&self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        self.transfer_batch(&[Transfer {
            token,
            from,
            to,
            amount,
        }])
        .await
    }

    async fn transfer_batch(&self, transfers: &[Transfer]) -> Result<()> {
        let (debits, credits): (Vec<_>, Vec<_>) = transfers
            .iter()
            .map(|leg| {
                (
                    CustodyEntry {
                        token: leg.token,
                        holder: leg.from,
                        amount: leg.amount,
                    },
                    CustodyEntry {
                        token: leg.token,
                        holder: leg.to,
                        amount: leg.amount,
                    },
                )
            })
            .unzip();
        self.settle(&debits, &credits)?;
        for leg in transfers {
            trace!(token = %leg.token, from = %leg.from, to = %leg.to, amount = %leg.amount, "Custody transfer");
        }
        Ok(())
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        Ok(self.balance(token, holder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let bank = MemoryBank::new();
        bank.mint(addr(1), addr(2), U256::from(10u64)).unwrap();
        bank.transfer(addr(1), addr(2), addr(3), U256::from(4u64)).await.unwrap();
        assert_eq!(bank.balance(addr(1), addr(2)), U256::from(6u64));
        assert_eq!(bank.balance(addr(1), addr(3)), U256::from(4u64));
    }

    #[tokio::test]
    async fn test_overdraw_fails_without_effect() {
        let bank = MemoryBank::new();
        bank.mint(addr(1), addr(2), U256::from(3u64)).unwrap();
        let result = bank.transfer(addr(1), addr(2), addr(3), U256::from(4u64)).await;
        assert!(result.is_err());
        assert_eq!(bank.balance(addr(1), addr(2)), U256::from(3u64));
        assert_eq!(bank.balance(addr(1), addr(3)), U256::ZERO);
    }

    #[tokio::test]
    async fn test_batch_with_one_short_leg_moves_nothing() {
        let bank = MemoryBank::new();
        bank.mint(addr(1), addr(2), U256::from(10u64)).unwrap();
        bank.mint(addr(4), addr(2), U256::from(1u64)).unwrap();

        let result = bank
            .transfer_batch(&[
                Transfer {
                    token: addr(1),
                    from: addr(2),
                    to: addr(3),
                    amount: U256::from(6u64),
                },
                Transfer {
                    token: addr(4),
                    from: addr(2),
                    to: addr(3),
                    amount: U256::from(2u64),
                },
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(bank.balance(addr(1), addr(2)), U256::from(10u64));
        assert_eq!(bank.balance(addr(1), addr(3)), U256::ZERO);
        assert_eq!(bank.balance(addr(4), addr(2)), U256::from(1u64));
    }

    #[test]
    fn test_settle_stages_repeated_debits() {
        let bank = MemoryBank::new();
        bank.mint(addr(1), addr(2), U256::from(5u64)).unwrap();
        let debit = CustodyEntry {
            token: addr(1),
            holder: addr(2),
            amount: U256::from(3u64),
        };

        // Two debits of 3 exceed the balance of 5 even though each fits alone.
        assert!(bank.settle(&[debit, debit], &[]).is_err());
        assert_eq!(bank.balance(addr(1), addr(2)), U256::from(5u64));

        let credit = CustodyEntry {
            token: addr(4),
            holder: addr(2),
            amount: U256::from(7u64),
        };
        bank.settle(&[debit], &[credit]).unwrap();
        assert_eq!(bank.balance(addr(1), addr(2)), U256::from(2u64));
        assert_eq!(bank.balance(addr(4), addr(2)), U256::from(7u64));
    }

    #[test]
    fn test_entries_round_trip() {
        let bank = MemoryBank::new();
        bank.mint(addr(1), addr(2), U256::from(3u64)).unwrap();
        bank.mint(addr(4), addr(2), U256::from(5u64)).unwrap();
        let restored = MemoryBank::from_entries(&bank.entries());
        assert_eq!(restored.balance(addr(4), addr(2)), U256::from(5u64));
        assert_eq!(restored.entries(), bank.entries());
    }
}
