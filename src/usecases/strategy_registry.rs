//! Strategy Registry - Creation, Forking and Lineage
//!
//! The registry is the only way a `ValueLedger` comes into existence. It
//! validates creation parameters, derives each strategy's address from the
//! factory address and a creation nonce, binds every ledger to the same
//! oracle, router and bank, and records fork lineage. Fork fees are routed
//! to the revenue ledger as unclaimed revenue of the base creator.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use super::event_log::EventLog;
use super::revenue_ledger::RevenueLedger;
use super::value_ledger::{LedgerPorts, LedgerSettings, LedgerSnapshot, ValueLedger};
use crate::domain::error::{AuthorizationError, ValidationError, VaultError, VaultResult};
use crate::domain::events::VaultEvent;
use crate::domain::revenue::RevenueAccount;
use crate::domain::strategy::{CreateStrategyRequest, StrategyId, StrategyParams};
use crate::ports::token_bank::TokenBank;

/// Fixed collaborator addresses injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAddresses {
  /// Deployer address strategy ids are derived from.
  pub factory: Address,
  pub revenue: Address,
  pub swap_router: Address,
  pub price_oracle: Address,
}

/// Persisted image of the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
  pub addresses: RegistryAddresses,
  pub nonce: u64,
  /// Ledgers in creation order.
  pub strategies: Vec<LedgerSnapshot>,
  pub revenue: Vec<(Address, RevenueAccount)>,
  pub next_event_sequence: u64,
}

#[derive(Default)]
struct RegistryState {
  ledgers: HashMap<StrategyId, Arc<ValueLedger>>,
  /// Creation order.
  order: Vec<StrategyId>,
  nonce: u64,
}

pub struct StrategyRegistry {
  addresses: RegistryAddresses,
  inner: RwLock<RegistryState>,
  ports: LedgerPorts,
  settings: LedgerSettings,
  revenue: Arc<RevenueLedger>,
  events: Arc<EventLog>,
}

impl StrategyRegistry {
  pub fn new(
    addresses: RegistryAddresses,
    ports: LedgerPorts,
    settings: LedgerSettings,
    bank: Arc<dyn TokenBank>,
  ) -> Self {
    let events = Arc::new(EventLog::new());
    let revenue = Arc::new(RevenueLedger::new(addresses.revenue, bank, events.clone()));
    Self {
      addresses,
      inner: RwLock::new(RegistryState::default()),
      ports,
      settings,
      revenue,
      events,
    }
  }

  /// Rebuild the registry, its ledgers and the revenue ledger.
  pub fn restore(
    snapshot: RegistrySnapshot,
    ports: LedgerPorts,
    settings: LedgerSettings,
    bank: Arc<dyn TokenBank>,
  ) -> Self {
    let events = Arc::new(EventLog::starting_at(snapshot.next_event_sequence));
    let revenue = Arc::new(RevenueLedger::restore(
      snapshot.addresses.revenue,
      snapshot.revenue,
      bank,
      events.clone(),
    ));

    let mut state = RegistryState {
      nonce: snapshot.nonce,
      ..RegistryState::default()
    };
    for ledger in snapshot.strategies {
      let id = ledger.id;
      let ledger = ValueLedger::restore(ledger, ports.clone(), settings, events.clone());
      state.order.push(id);
      state.ledgers.insert(id, Arc::new(ledger));
    }
    info!(strategies = state.order.len(), "Registry restored");

    Self {
      addresses: snapshot.addresses,
      inner: RwLock::new(state),
      ports,
      settings,
      revenue,
      events,
    }
  }

  pub async fn snapshot(&self) -> RegistrySnapshot {
    let ledgers: Vec<Arc<ValueLedger>> = {
      let inner = self.inner.read().await;
      inner
        .order
        .iter()
        .filter_map(|id| inner.ledgers.get(id).cloned())
        .collect()
    };
    let nonce = self.inner.read().await.nonce;

    let mut strategies = Vec::with_capacity(ledgers.len());
    for ledger in ledgers {
      strategies.push(ledger.snapshot().await);
    }

    RegistrySnapshot {
      addresses: self.addresses,
      nonce,
      strategies,
      revenue: self.revenue.accounts().await,
      next_event_sequence: self.events.next_sequence(),
    }
  }

  /// Validate and instantiate a root strategy.
  #[instrument(skip(self, request), fields(tokens = request.tokens.len()))]
  pub async fn create_strategy(
    &self,
    creator: Address,
    request: CreateStrategyRequest,
  ) -> VaultResult<StrategyId> {
    let params = StrategyParams::from_request(&request, creator)?;
    let id = self.insert(params).await;

    self.events.emit(VaultEvent::StrategyCreated {
      strategy: id,
      creator,
      tokens: request.tokens,
      split_ratio: request.split_ratio,
      visibility: request.visibility,
      deposit_usd_min: request.deposit_usd_min,
      fork_cost: request.fork_cost,
      allowed_actions: request.allowed_actions,
    });
    info!(strategy = %id, %creator, "Strategy created");
    Ok(id)
  }

  /// Clone a public strategy for exactly its fork cost.
  ///
  /// The payment is credited to the base creator only; royalties do not
  /// walk further up the lineage.
  #[instrument(skip(self))]
  pub async fn fork_strategy(
    &self,
    forker: Address,
    base: StrategyId,
    payment: U256,
  ) -> VaultResult<StrategyId> {
    let base_ledger = self.ledger(base).await?;
    if !base_ledger.visibility().is_forkable() {
      return Err(AuthorizationError::NotForkable(base).into());
    }
    let expected = base_ledger.fork_cost();
    if payment != expected {
      return Err(VaultError::InsufficientForkPayment {
        expected,
        paid: payment,
      });
    }

    let params = base_ledger
      .params()
      .fork(base, base_ledger.current_ratio().await, forker);

    if !payment.is_zero() {
      self
        .revenue
        .fund(forker, base_ledger.creator(), payment)
        .await?;
    }

    let fork = self.insert(params).await;
    self.events.emit(VaultEvent::StrategyForked { base, fork, forker });
    info!(%base, %fork, %forker, %payment, "Strategy forked");
    Ok(fork)
  }

  async fn insert(&self, params: StrategyParams) -> StrategyId {
    let mut inner = self.inner.write().await;
    let id = self.addresses.factory.create(inner.nonce);
    inner.nonce += 1;

    let ledger = ValueLedger::new(
      id,
      params,
      self.ports.clone(),
      self.settings,
      self.events.clone(),
    );
    inner.order.push(id);
    inner.ledgers.insert(id, Arc::new(ledger));
    id
  }

  // ── Read accessors ────────────────────────

  pub const fn revenue_address(&self) -> Address {
    self.addresses.revenue
  }

  pub const fn swap_router_address(&self) -> Address {
    self.addresses.swap_router
  }

  pub const fn price_oracle_address(&self) -> Address {
    self.addresses.price_oracle
  }

  pub const fn factory_address(&self) -> Address {
    self.addresses.factory
  }

  pub fn revenue(&self) -> &Arc<RevenueLedger> {
    &self.revenue
  }

  pub fn events(&self) -> &Arc<EventLog> {
    &self.events
  }

  pub async fn strategy(&self, id: StrategyId) -> Option<Arc<ValueLedger>> {
    self.inner.read().await.ledgers.get(&id).cloned()
  }

  /// Like `strategy`, failing with `UnknownStrategy`.
  pub async fn ledger(&self, id: StrategyId) -> VaultResult<Arc<ValueLedger>> {
    self
      .strategy(id)
      .await
      .ok_or_else(|| ValidationError::UnknownStrategy(id).into())
  }

  /// All strategy ids in creation order.
  pub async fn strategies(&self) -> Vec<StrategyId> {
    self.inner.read().await.order.clone()
  }

  /// `id` followed by each ancestor up to its root.
  pub async fn lineage(&self, id: StrategyId) -> VaultResult<Vec<StrategyId>> {
    let inner = self.inner.read().await;
    let mut chain = Vec::new();
    let mut cursor = Some(id);
    while let Some(current) = cursor {
      let ledger = inner
        .ledgers
        .get(&current)
        .ok_or(ValidationError::UnknownStrategy(current))?;
      chain.push(current);
      cursor = ledger.base_strategy();
    }
    Ok(chain)
  }
}
