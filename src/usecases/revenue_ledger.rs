//! Revenue Ledger - Protocol Funds Owed to Addresses
//!
//! Fork fees and direct funding accumulate here as unclaimed native
//! balance per account. A withdrawal moves the amount into `claimed` and
//! pays it out of the ledger's custody address; if the payout fails the
//! account is restored.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, instrument, warn};

use super::event_log::EventLog;
use crate::domain::error::{ValidationError, VaultError, VaultResult};
use crate::domain::events::VaultEvent;
use crate::domain::revenue::RevenueAccount;
use crate::domain::strategy::NATIVE_TOKEN;
use crate::ports::token_bank::TokenBank;

pub struct RevenueLedger {
  /// Custody address holding all unclaimed revenue.
  address: Address,
  accounts: RwLock<BTreeMap<Address, RevenueAccount>>,
  in_flight: Mutex<()>,
  bank: Arc<dyn TokenBank>,
  events: Arc<EventLog>,
}

impl RevenueLedger {
  pub fn new(address: Address, bank: Arc<dyn TokenBank>, events: Arc<EventLog>) -> Self {
    Self::restore(address, Vec::new(), bank, events)
  }

  /// Rebuild from persisted accounts.
  pub fn restore(
    address: Address,
    accounts: Vec<(Address, RevenueAccount)>,
    bank: Arc<dyn TokenBank>,
    events: Arc<EventLog>,
  ) -> Self {
    Self {
      address,
      accounts: RwLock::new(accounts.into_iter().collect()),
      in_flight: Mutex::new(()),
      bank,
      events,
    }
  }

  /// Pull `amount` of native value from `payer` and credit it to `to`.
  #[instrument(skip(self))]
  pub async fn fund(&self, payer: Address, to: Address, amount: U256) -> VaultResult<()> {
    let _guard = self.enter()?;
    if amount.is_zero() {
      return Err(ValidationError::ZeroAmount.into());
    }

    let before = self.balance_of(to).await;
    let mut next = before;
    next.credit(amount)?;
    self.accounts.write().await.insert(to, next);

    if let Err(e) = self.bank.transfer(NATIVE_TOKEN, payer, self.address, amount).await {
      warn!(%to, "Revenue funding transfer failed, restoring account");
      self.accounts.write().await.insert(to, before);
      return Err(VaultError::external("native.transfer", &e));
    }

    self.events.emit(VaultEvent::RevenueFunded { payer, to, amount });
    info!(%payer, %to, %amount, "Revenue funded");
    Ok(())
  }

  /// Claim `amount` of the caller's unclaimed revenue.
  #[instrument(skip(self))]
  pub async fn withdraw(&self, caller: Address, amount: U256) -> VaultResult<()> {
    let _guard = self.enter()?;
    if amount.is_zero() {
      return Err(ValidationError::ZeroAmount.into());
    }

    let before = self.balance_of(caller).await;
    let mut next = before;
    next.claim(amount)?;
    self.accounts.write().await.insert(caller, next);

    if let Err(e) = self.bank.transfer(NATIVE_TOKEN, self.address, caller, amount).await {
      warn!(%caller, "Revenue payout failed, restoring account");
      self.accounts.write().await.insert(caller, before);
      return Err(VaultError::external("native.transfer", &e));
    }

    self.events.emit(VaultEvent::RevenueClaimed {
      account: caller,
      amount,
    });
    info!(account = %caller, %amount, "Revenue claimed");
    Ok(())
  }

  /// `{claimed, unclaimed}` for `user`; zero for unknown addresses.
  pub async fn balance_of(&self, user: Address) -> RevenueAccount {
    self
      .accounts
      .read()
      .await
      .get(&user)
      .copied()
      .unwrap_or_default()
  }

  pub const fn address(&self) -> Address {
    self.address
  }

  /// All known accounts in address order.
  pub async fn accounts(&self) -> Vec<(Address, RevenueAccount)> {
    self
      .accounts
      .read()
      .await
      .iter()
      .map(|(&address, &account)| (address, account))
      .collect()
  }

  fn enter(&self) -> VaultResult<MutexGuard<'_, ()>> {
    self
      .in_flight
      .try_lock()
      .map_err(|_| VaultError::Reentrancy(self.address))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::memory::MemoryBank;

  fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
  }

  fn setup() -> (RevenueLedger, Arc<MemoryBank>) {
    let bank = Arc::new(MemoryBank::new());
    bank.mint(NATIVE_TOKEN, addr(1), U256::from(100u64)).unwrap();
    let ledger = RevenueLedger::new(addr(0xFE), bank.clone(), Arc::new(EventLog::new()));
    (ledger, bank)
  }

  #[tokio::test]
  async fn test_unknown_account_is_zero() {
    let (ledger, _) = setup();
    assert_eq!(ledger.balance_of(addr(7)).await, RevenueAccount::default());
  }

  #[tokio::test]
  async fn test_fund_then_withdraw() {
    let (ledger, bank) = setup();
    ledger.fund(addr(1), addr(2), U256::from(40u64)).await.unwrap();
    assert_eq!(ledger.balance_of(addr(2)).await.unclaimed, U256::from(40u64));

    ledger.withdraw(addr(2), U256::from(15u64)).await.unwrap();
    let account = ledger.balance_of(addr(2)).await;
    assert_eq!(account.unclaimed, U256::from(25u64));
    assert_eq!(account.claimed, U256::from(15u64));
    assert_eq!(bank.balance(NATIVE_TOKEN, addr(2)), U256::from(15u64));
    assert_eq!(bank.balance(NATIVE_TOKEN, addr(0xFE)), U256::from(25u64));
  }

  #[tokio::test]
  async fn test_unfunded_payer_leaves_account_untouched() {
    let (ledger, _) = setup();
    let result = ledger.fund(addr(3), addr(2), U256::from(1u64)).await;
    assert!(matches!(result, Err(VaultError::ExternalCallFailure { .. })));
    assert_eq!(ledger.balance_of(addr(2)).await, RevenueAccount::default());
  }

  #[tokio::test]
  async fn test_overdraw_rejected() {
    let (ledger, _) = setup();
    ledger.fund(addr(1), addr(2), U256::from(5u64)).await.unwrap();
    let result = ledger.withdraw(addr(2), U256::from(6u64)).await;
    assert!(matches!(result, Err(VaultError::InsufficientFunds { .. })));
    assert_eq!(ledger.balance_of(addr(2)).await.unclaimed, U256::from(5u64));
  }
}
