//! Value Ledger - Per-Strategy Token Pool and Share Ownership
//!
//! One ledger per strategy. It custodies the strategy's token balances,
//! mints and burns LP shares against USD value, and runs the agent's
//! governed rebalancing actions.
//!
//! Every mutating operation follows the same discipline:
//! 1. Take the in-flight guard (a nested call fails with `Reentrancy`)
//! 2. Validate against a copy of the current state
//! 3. Commit the new balances and shares
//! 4. Call out to the bank and router, each call settling as a unit
//! 5. Restore the copy if any external call fails
//! 6. Emit the event once everything succeeded
//!
//! Floors are checked against oracle quotes before any swap is submitted,
//! so a rejected batch never leaves custody and ledger apart.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use super::event_log::EventLog;
use super::price_oracle::PriceOracle;
use crate::domain::error::{AuthorizationError, ValidationError, VaultError, VaultResult};
use crate::domain::events::VaultEvent;
use crate::domain::rebalance::{self, SwapLeg};
use crate::domain::shares;
use crate::domain::strategy::{
  ActionCall, ActionKind, SplitRatio, StrategyId, StrategyParams, Visibility, NATIVE_TOKEN,
};
use crate::domain::units::{
  apply_bps_floor, checked_add, checked_sub, mul_div, mul_div_up, to_decimal, USD_DECIMALS,
};
use crate::ports::agent_authority::AgentAuthority;
use crate::ports::swap_router::{SwapOrder, SwapRouter};
use crate::ports::token_bank::{TokenBank, Transfer};

/// Collaborators shared by every ledger of a registry.
#[derive(Clone)]
pub struct LedgerPorts {
  pub oracle: Arc<PriceOracle>,
  pub router: Arc<dyn SwapRouter>,
  pub bank: Arc<dyn TokenBank>,
  pub authority: Arc<dyn AgentAuthority>,
}

/// Tunables applied to every ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
  /// Discount from the oracle quote accepted on rebalance swaps.
  pub rebalance_slippage_bps: u32,
}

impl Default for LedgerSettings {
  fn default() -> Self {
    Self {
      rebalance_slippage_bps: 100,
    }
  }
}

/// Mutable per-strategy state.
///
/// `total_shares` always equals the sum of `holders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
  /// Raw balances, index-aligned with the strategy's tokens.
  pub balances: Vec<U256>,
  /// Live split ratio. Only `AdjustSplitRatio` replaces it.
  pub split_ratio: SplitRatio,
  pub total_shares: U256,
  pub holders: BTreeMap<Address, U256>,
}

impl LedgerState {
  fn empty(params: &StrategyParams) -> Self {
    Self {
      balances: vec![U256::ZERO; params.tokens.len()],
      split_ratio: params.split_ratio.clone(),
      total_shares: U256::ZERO,
      holders: BTreeMap::new(),
    }
  }

  pub fn shares_of(&self, holder: Address) -> U256 {
    self.holders.get(&holder).copied().unwrap_or_default()
  }

  fn mint(&mut self, holder: Address, amount: U256) -> VaultResult<()> {
    self.total_shares = checked_add(self.total_shares, amount)?;
    let held = self.shares_of(holder);
    self.holders.insert(holder, checked_add(held, amount)?);
    Ok(())
  }

  fn burn(&mut self, holder: Address, amount: U256) -> VaultResult<()> {
    let held = self.shares_of(holder);
    if held < amount {
      return Err(VaultError::InsufficientShares {
        requested: amount,
        held,
      });
    }
    self.total_shares = checked_sub(self.total_shares, amount)?;
    if held == amount {
      self.holders.remove(&holder);
    } else {
      self.holders.insert(holder, held - amount);
    }
    Ok(())
  }
}

/// Serializable image of one ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
  pub id: StrategyId,
  pub params: StrategyParams,
  pub state: LedgerState,
}

/// Token pool and share book of a single strategy.
pub struct ValueLedger {
  id: StrategyId,
  params: StrategyParams,
  state: RwLock<LedgerState>,
  /// Held for the whole duration of a mutating operation.
  in_flight: Mutex<()>,
  ports: LedgerPorts,
  settings: LedgerSettings,
  events: Arc<EventLog>,
}

impl ValueLedger {
  pub fn new(
    id: StrategyId,
    params: StrategyParams,
    ports: LedgerPorts,
    settings: LedgerSettings,
    events: Arc<EventLog>,
  ) -> Self {
    let state = LedgerState::empty(&params);
    Self {
      id,
      params,
      state: RwLock::new(state),
      in_flight: Mutex::new(()),
      ports,
      settings,
      events,
    }
  }

  /// Rebuild a ledger from a snapshot.
  pub fn restore(
    snapshot: LedgerSnapshot,
    ports: LedgerPorts,
    settings: LedgerSettings,
    events: Arc<EventLog>,
  ) -> Self {
    Self {
      id: snapshot.id,
      params: snapshot.params,
      state: RwLock::new(snapshot.state),
      in_flight: Mutex::new(()),
      ports,
      settings,
      events,
    }
  }

  pub async fn snapshot(&self) -> LedgerSnapshot {
    LedgerSnapshot {
      id: self.id,
      params: self.params.clone(),
      state: self.state.read().await.clone(),
    }
  }

  // ── Deposits ──────────────────────────────

  /// Pull `amount` of `token` from `caller` and mint shares for its USD value.
  #[instrument(skip(self), fields(strategy = %self.id))]
  pub async fn deposit(&self, caller: Address, token: Address, amount: U256) -> VaultResult<U256> {
    let _guard = self.enter()?;
    let index = self.token_index(token)?;
    ensure_positive(amount)?;

    let deposit_usd = self.ports.oracle.amount_out_in_usd(amount, token).await?;
    if deposit_usd < self.params.deposit_usd_min {
      return Err(VaultError::BelowMinimumDeposit {
        deposit_usd,
        minimum_usd: self.params.deposit_usd_min,
      });
    }

    let before = self.state.read().await.clone();
    let pool_usd = if before.total_shares.is_zero() {
      U256::ZERO
    } else {
      self
        .ports
        .oracle
        .amounts_out_in_usd(&before.balances, &self.params.tokens)
        .await?
    };
    let minted = shares::shares_for_deposit(deposit_usd, before.total_shares, pool_usd)?;
    if minted.is_zero() {
      return Err(ValidationError::ZeroShares.into());
    }

    let mut next = before.clone();
    next.balances[index] = checked_add(next.balances[index], amount)?;
    next.mint(caller, minted)?;
    self.commit(next).await;

    if let Err(e) = self.ports.bank.transfer(token, caller, self.id, amount).await {
      self.rollback(before, "deposit").await;
      return Err(VaultError::external("token.transfer_from", &e));
    }

    self.events.emit(VaultEvent::TokensDeposited {
      strategy: self.id,
      lp: caller,
      token,
      amount,
      shares: minted,
    });
    info!(
      lp = %caller,
      %token,
      %amount,
      usd = %to_decimal(deposit_usd, USD_DECIMALS),
      %minted,
      "Deposit committed"
    );
    Ok(minted)
  }

  pub async fn deposit_native(&self, caller: Address, amount: U256) -> VaultResult<U256> {
    self.deposit(caller, NATIVE_TOKEN, amount).await
  }

  // ── Withdrawals ───────────────────────────

  /// Burn `lp_amount` shares and pay out the same slice of every balance.
  #[instrument(skip(self), fields(strategy = %self.id))]
  pub async fn withdraw(&self, caller: Address, lp_amount: U256) -> VaultResult<Vec<U256>> {
    let _guard = self.enter()?;
    ensure_positive(lp_amount)?;

    let before = self.state.read().await.clone();
    let mut next = before.clone();
    next.burn(caller, lp_amount)?;
    let amounts = shares::pro_rata(&before.balances, lp_amount, before.total_shares)?;
    for (balance, &amount) in next.balances.iter_mut().zip(&amounts) {
      *balance = checked_sub(*balance, amount)?;
    }
    self.commit(next).await;

    let payouts: Vec<Transfer> = self
      .params
      .tokens
      .iter()
      .zip(&amounts)
      .filter(|(_, amount)| !amount.is_zero())
      .map(|(&token, &amount)| Transfer {
        token,
        from: self.id,
        to: caller,
        amount,
      })
      .collect();
    if let Err(e) = self.ports.bank.transfer_batch(&payouts).await {
      self.rollback(before, "withdraw").await;
      return Err(VaultError::external("token.transfer_batch", &e));
    }

    self.events.emit(VaultEvent::TokensWithdrawn {
      strategy: self.id,
      lp: caller,
      tokens: self.params.tokens.clone(),
      amounts: amounts.clone(),
      shares: lp_amount,
    });
    info!(lp = %caller, shares = %lp_amount, "Withdrawal committed");
    Ok(amounts)
  }

  /// Burn `lp_amount` shares, swap every other slice into `token_out` and
  /// pay one combined amount.
  ///
  /// With `min_amount_out` set, the oracle value of the slice is checked
  /// against the floor before anything moves, and each swap carries its
  /// share of the floor so the router rejects a short fill.
  #[instrument(skip(self), fields(strategy = %self.id))]
  pub async fn withdraw_single(
    &self,
    caller: Address,
    token_out: Address,
    lp_amount: U256,
    min_amount_out: Option<U256>,
  ) -> VaultResult<U256> {
    let _guard = self.enter()?;
    let out_index = self.token_index(token_out)?;
    ensure_positive(lp_amount)?;

    let before = self.state.read().await.clone();
    let mut next = before.clone();
    next.burn(caller, lp_amount)?;
    let amounts = shares::pro_rata(&before.balances, lp_amount, before.total_shares)?;
    let quoted = self
      .ports
      .oracle
      .amounts_out(&amounts, &self.params.tokens, token_out)
      .await?;
    if let Some(minimum) = min_amount_out {
      if quoted < minimum {
        return Err(VaultError::SlippageExceeded {
          minimum,
          received: quoted,
        });
      }
    }
    let orders = self
      .collapse_orders(&amounts, out_index, min_amount_out)
      .await?;
    for (balance, &amount) in next.balances.iter_mut().zip(&amounts) {
      *balance = checked_sub(*balance, amount)?;
    }
    self.commit(next).await;

    let fills = match self.settle_swaps(&orders).await {
      Ok(fills) => fills,
      Err(err) => {
        self.rollback(before, "withdraw_single").await;
        return Err(err);
      }
    };
    let swapped = fills
      .iter()
      .try_fold(U256::ZERO, |total, &fill| checked_add(total, fill))?;
    let payout = checked_add(amounts[out_index], swapped)?;

    if let Err(e) = self.ports.bank.transfer(token_out, self.id, caller, payout).await {
      // The swaps already settled in custody: the shares come back and the
      // proceeds stay in the pool as `token_out`.
      let mut kept = before;
      for (index, &amount) in amounts.iter().enumerate() {
        if index != out_index {
          kept.balances[index] = checked_sub(kept.balances[index], amount)?;
        }
      }
      kept.balances[out_index] = checked_add(kept.balances[out_index], swapped)?;
      self.rollback(kept, "withdraw_single").await;
      return Err(VaultError::external("token.transfer", &e));
    }

    self.events.emit(VaultEvent::TokensWithdrawn {
      strategy: self.id,
      lp: caller,
      tokens: vec![token_out],
      amounts: vec![payout],
      shares: lp_amount,
    });
    info!(lp = %caller, %token_out, %payout, %quoted, "Single-token withdrawal committed");
    Ok(payout)
  }

  pub async fn withdraw_single_native(
    &self,
    caller: Address,
    lp_amount: U256,
    min_amount_out: Option<U256>,
  ) -> VaultResult<U256> {
    self
      .withdraw_single(caller, NATIVE_TOKEN, lp_amount, min_amount_out)
      .await
  }

  /// Orders selling every non-zero slice except `out_index` into that token.
  ///
  /// The part of the floor not covered by the `token_out` slice is spread
  /// over the orders by USD value, rounded up.
  async fn collapse_orders(
    &self,
    amounts: &[U256],
    out_index: usize,
    min_amount_out: Option<U256>,
  ) -> VaultResult<Vec<SwapOrder>> {
    let token_out = self.params.tokens[out_index];
    let shortfall = min_amount_out
      .unwrap_or_default()
      .saturating_sub(amounts[out_index]);
    let values = if shortfall.is_zero() {
      vec![U256::ZERO; amounts.len()]
    } else {
      self
        .ports
        .oracle
        .values_in_usd(amounts, &self.params.tokens)
        .await?
    };
    let swapped_usd = values
      .iter()
      .enumerate()
      .filter(|&(index, _)| index != out_index)
      .try_fold(U256::ZERO, |total, (_, &value)| checked_add(total, value))?;

    let mut orders = Vec::new();
    for (index, (&token_in, &amount_in)) in self.params.tokens.iter().zip(amounts).enumerate() {
      if index == out_index || amount_in.is_zero() {
        continue;
      }
      let min_amount_out = if swapped_usd.is_zero() {
        U256::ZERO
      } else {
        mul_div_up(shortfall, values[index], swapped_usd)?
      };
      orders.push(SwapOrder {
        account: self.id,
        token_in,
        token_out,
        amount_in,
        min_amount_out,
      });
    }
    Ok(orders)
  }

  // ── Donations ─────────────────────────────

  /// Add tokens to the pool without minting shares.
  #[instrument(skip(self), fields(strategy = %self.id))]
  pub async fn donate(&self, caller: Address, token: Address, amount: U256) -> VaultResult<()> {
    let _guard = self.enter()?;
    let index = self.token_index(token)?;
    ensure_positive(amount)?;

    let before = self.state.read().await.clone();
    let mut next = before.clone();
    next.balances[index] = checked_add(next.balances[index], amount)?;
    self.commit(next).await;

    if let Err(e) = self.ports.bank.transfer(token, caller, self.id, amount).await {
      self.rollback(before, "donate").await;
      return Err(VaultError::external("token.transfer_from", &e));
    }

    self.events.emit(VaultEvent::TokensDonated {
      strategy: self.id,
      donor: caller,
      token,
      amount,
    });
    info!(donor = %caller, %token, %amount, "Donation committed");
    Ok(())
  }

  pub async fn donate_native(&self, caller: Address, amount: U256) -> VaultResult<()> {
    self.donate(caller, NATIVE_TOKEN, amount).await
  }

  // ── Share transfers ───────────────────────

  /// Move LP shares between holders. No tokens move.
  #[instrument(skip(self), fields(strategy = %self.id))]
  pub async fn transfer_shares(&self, caller: Address, to: Address, amount: U256) -> VaultResult<()> {
    let _guard = self.enter()?;
    ensure_positive(amount)?;
    if to == Address::ZERO {
      return Err(ValidationError::ZeroAddressRecipient.into());
    }

    let mut next = self.state.read().await.clone();
    next.burn(caller, amount)?;
    next.mint(to, amount)?;
    self.commit(next).await;

    self.events.emit(VaultEvent::SharesTransferred {
      strategy: self.id,
      from: caller,
      to,
      shares: amount,
    });
    debug!(from = %caller, %to, shares = %amount, "Shares transferred");
    Ok(())
  }

  // ── Governed actions ──────────────────────

  /// Run one of the strategy's allowed rebalancing actions.
  ///
  /// Only an agent of this strategy may call it. A failed swap restores
  /// balances and ratio as they were before the call.
  #[instrument(skip(self), fields(strategy = %self.id, kind = %call.kind()))]
  pub async fn execute_action(&self, caller: Address, call: ActionCall) -> VaultResult<()> {
    let _guard = self.enter()?;

    let is_agent = self
      .ports
      .authority
      .is_agent(self.id, caller)
      .await
      .map_err(|e| VaultError::external("authority.is_agent", &e))?;
    if !is_agent {
      return Err(
        AuthorizationError::NotAgent {
          strategy: self.id,
          caller,
        }
        .into(),
      );
    }
    let kind = call.kind();
    if !self.params.allows(kind) {
      return Err(
        AuthorizationError::ActionNotAllowed {
          strategy: self.id,
          kind,
        }
        .into(),
      );
    }

    let before = self.state.read().await.clone();
    let values = self
      .ports
      .oracle
      .values_in_usd(&before.balances, &self.params.tokens)
      .await?;

    let (ratio, legs) = match &call {
      ActionCall::AdjustSplitRatio { ratio } => {
        let ratio = SplitRatio::for_tokens(ratio.clone(), self.params.tokens.len())?;
        let legs = rebalance::plan(&before.balances, &values, ratio.entries())?;
        (ratio, legs)
      }
      ActionCall::SwapToSingle { target } => {
        let target = self.token_index(*target)?;
        let legs = rebalance::plan_collapse(&before.balances, &values, target);
        (before.split_ratio.clone(), legs)
      }
      ActionCall::SwapToMany => {
        let legs = rebalance::plan(&before.balances, &values, before.split_ratio.entries())?;
        (before.split_ratio.clone(), legs)
      }
    };
    let orders = self.rebalance_orders(&legs).await?;

    let mut next = before.clone();
    next.split_ratio = ratio;
    for leg in &legs {
      next.balances[leg.from] = checked_sub(next.balances[leg.from], leg.amount_in)?;
    }
    self.commit(next).await;

    let fills = match self.settle_swaps(&orders).await {
      Ok(fills) => fills,
      Err(err) => {
        self.rollback(before, "execute_action").await;
        return Err(err);
      }
    };
    {
      let mut state = self.state.write().await;
      for (order, (leg, &received)) in orders.iter().zip(legs.iter().zip(&fills)) {
        state.balances[leg.to] = checked_add(state.balances[leg.to], received)?;
        debug!(
          from = %order.token_in,
          to = %order.token_out,
          amount_in = %leg.amount_in,
          %received,
          "Rebalance leg settled"
        );
      }
    }

    self.events.emit(VaultEvent::ActionExecuted {
      strategy: self.id,
      agent: caller,
      call: call.clone(),
    });
    info!(agent = %caller, %kind, swaps = orders.len(), "Action executed");
    Ok(())
  }

  /// One order per leg. Each destination's incoming basket is priced in a
  /// single quote; its slippage floor is spread over the feeding legs by
  /// USD value.
  async fn rebalance_orders(&self, legs: &[SwapLeg]) -> VaultResult<Vec<SwapOrder>> {
    let tokens = &self.params.tokens;
    let mut floors = vec![U256::ZERO; tokens.len()];
    let mut inflow_usd = vec![U256::ZERO; tokens.len()];

    let mut destinations: Vec<usize> = legs.iter().map(|leg| leg.to).collect();
    destinations.sort_unstable();
    destinations.dedup();
    for to in destinations {
      let mut basket = vec![U256::ZERO; tokens.len()];
      for leg in legs.iter().filter(|leg| leg.to == to) {
        basket[leg.from] = checked_add(basket[leg.from], leg.amount_in)?;
        inflow_usd[to] = checked_add(inflow_usd[to], leg.value_usd)?;
      }
      let expected = self.ports.oracle.amounts_out(&basket, tokens, tokens[to]).await?;
      floors[to] = apply_bps_floor(expected, self.settings.rebalance_slippage_bps)?;
    }

    legs
      .iter()
      .map(|leg| {
        let min_amount_out = if inflow_usd[leg.to].is_zero() {
          U256::ZERO
        } else {
          mul_div(floors[leg.to], leg.value_usd, inflow_usd[leg.to])?
        };
        Ok(SwapOrder {
          account: self.id,
          token_in: tokens[leg.from],
          token_out: tokens[leg.to],
          amount_in: leg.amount_in,
          min_amount_out,
        })
      })
      .collect()
  }

  /// Submit `orders` as one batch. Nothing is submitted for an empty batch.
  async fn settle_swaps(&self, orders: &[SwapOrder]) -> VaultResult<Vec<U256>> {
    if orders.is_empty() {
      return Ok(Vec::new());
    }
    let fills = self
      .ports
      .router
      .swap_exact_in(orders)
      .await
      .map_err(|e| VaultError::external("router.swap_exact_in", &e))?;
    if fills.len() != orders.len() {
      return Err(VaultError::ExternalCallFailure {
        call: "router.swap_exact_in",
        reason: format!("{} fills for {} orders", fills.len(), orders.len()),
      });
    }
    Ok(fills)
  }

  // ── Read accessors ────────────────────────

  pub const fn id(&self) -> StrategyId {
    self.id
  }

  pub const fn params(&self) -> &StrategyParams {
    &self.params
  }

  pub fn tokens(&self) -> &[Address] {
    &self.params.tokens
  }

  pub async fn balances(&self) -> Vec<U256> {
    self.state.read().await.balances.clone()
  }

  /// Live split ratio.
  pub async fn split_ratio(&self) -> Vec<u32> {
    self.state.read().await.split_ratio.entries().to_vec()
  }

  pub(crate) async fn current_ratio(&self) -> SplitRatio {
    self.state.read().await.split_ratio.clone()
  }

  pub const fn deposit_usd_min(&self) -> U256 {
    self.params.deposit_usd_min
  }

  pub const fn fork_cost(&self) -> U256 {
    self.params.fork_cost
  }

  pub fn allowed_actions(&self) -> &[ActionKind] {
    &self.params.allowed_actions
  }

  pub const fn creator(&self) -> Address {
    self.params.creator
  }

  pub const fn base_strategy(&self) -> Option<StrategyId> {
    self.params.base_strategy
  }

  pub const fn visibility(&self) -> Visibility {
    self.params.visibility
  }

  pub async fn total_shares(&self) -> U256 {
    self.state.read().await.total_shares
  }

  pub async fn shares_of(&self, holder: Address) -> U256 {
    self.state.read().await.shares_of(holder)
  }

  /// USD value of every balance at current feed prices.
  pub async fn pool_value_usd(&self) -> VaultResult<U256> {
    let balances = self.balances().await;
    self
      .ports
      .oracle
      .amounts_out_in_usd(&balances, &self.params.tokens)
      .await
  }

  /// USD value of one whole share; one USD for an empty pool.
  pub async fn price_per_share(&self) -> VaultResult<U256> {
    let total = self.total_shares().await;
    let pool = if total.is_zero() {
      U256::ZERO
    } else {
      self.pool_value_usd().await?
    };
    shares::price_per_share(pool, total)
  }

  // ── Internals ─────────────────────────────

  fn enter(&self) -> VaultResult<MutexGuard<'_, ()>> {
    self
      .in_flight
      .try_lock()
      .map_err(|_| VaultError::Reentrancy(self.id))
  }

  fn token_index(&self, token: Address) -> VaultResult<usize> {
    self
      .params
      .token_index(token)
      .ok_or_else(|| ValidationError::TokenNotInStrategy(token).into())
  }

  async fn commit(&self, next: LedgerState) {
    *self.state.write().await = next;
  }

  async fn rollback(&self, before: LedgerState, operation: &'static str) {
    warn!(strategy = %self.id, operation, "External call failed, restoring state");
    *self.state.write().await = before;
  }
}

fn ensure_positive(amount: U256) -> VaultResult<()> {
  if amount.is_zero() {
    return Err(ValidationError::ZeroAmount.into());
  }
  Ok(())
}
