//! Sequencer - Total Ordering of Caller Operations
//!
//! Callers submit `Envelope`s; the sequencer applies them one at a time in
//! submission order against the registry, its ledgers and the revenue
//! ledger. Each outcome is a typed `Receipt` or the operation's
//! `VaultError`, never collapsed.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::strategy_registry::StrategyRegistry;
use crate::domain::error::{VaultError, VaultResult};
use crate::domain::strategy::{ActionCall, CreateStrategyRequest, StrategyId, Visibility};

/// One operation, tagged by `op` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
  CreateStrategy {
    tokens: Vec<Address>,
    split_ratio: Vec<u32>,
    visibility: Visibility,
    #[serde(default)]
    deposit_usd_min: U256,
    #[serde(default)]
    fork_cost: U256,
    #[serde(default)]
    allowed_actions: Vec<u8>,
  },
  ForkStrategy {
    base: StrategyId,
    #[serde(default)]
    payment: U256,
  },
  Deposit {
    strategy: StrategyId,
    token: Address,
    amount: U256,
  },
  DepositNative {
    strategy: StrategyId,
    amount: U256,
  },
  Withdraw {
    strategy: StrategyId,
    lp_amount: U256,
  },
  WithdrawSingle {
    strategy: StrategyId,
    token_out: Address,
    lp_amount: U256,
    #[serde(default)]
    min_amount_out: Option<U256>,
  },
  WithdrawSingleNative {
    strategy: StrategyId,
    lp_amount: U256,
    #[serde(default)]
    min_amount_out: Option<U256>,
  },
  Donate {
    strategy: StrategyId,
    token: Address,
    amount: U256,
  },
  DonateNative {
    strategy: StrategyId,
    amount: U256,
  },
  TransferShares {
    strategy: StrategyId,
    to: Address,
    amount: U256,
  },
  ExecuteAction {
    strategy: StrategyId,
    call: ActionCall,
  },
  FundRevenue {
    to: Address,
    amount: U256,
  },
  WithdrawRevenue {
    amount: U256,
  },
}

impl Command {
  pub const fn name(&self) -> &'static str {
    match self {
      Self::CreateStrategy { .. } => "create_strategy",
      Self::ForkStrategy { .. } => "fork_strategy",
      Self::Deposit { .. } => "deposit",
      Self::DepositNative { .. } => "deposit_native",
      Self::Withdraw { .. } => "withdraw",
      Self::WithdrawSingle { .. } => "withdraw_single",
      Self::WithdrawSingleNative { .. } => "withdraw_single_native",
      Self::Donate { .. } => "donate",
      Self::DonateNative { .. } => "donate_native",
      Self::TransferShares { .. } => "transfer_shares",
      Self::ExecuteAction { .. } => "execute_action",
      Self::FundRevenue { .. } => "fund_revenue",
      Self::WithdrawRevenue { .. } => "withdraw_revenue",
    }
  }
}

/// A command with its caller and a correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
  #[serde(default = "Uuid::new_v4")]
  pub id: Uuid,
  pub caller: Address,
  #[serde(flatten)]
  pub command: Command,
}

impl Envelope {
  pub fn new(caller: Address, command: Command) -> Self {
    Self {
      id: Uuid::new_v4(),
      caller,
      command,
    }
  }
}

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "receipt", rename_all = "snake_case")]
pub enum Receipt {
  /// Created or forked strategy.
  Strategy { id: StrategyId },
  /// Shares minted by a deposit.
  Shares { minted: U256 },
  /// Per-token payout of a proportional withdrawal.
  Amounts { amounts: Vec<U256> },
  /// Single-token payout.
  Amount { value: U256 },
  Done,
}

/// Outcome counts of a replayed session.
#[derive(Debug, Default)]
pub struct SessionReport {
  pub applied: usize,
  pub rejected: Vec<(Uuid, VaultError)>,
}

pub struct Sequencer {
  registry: Arc<StrategyRegistry>,
  /// Serializes submissions.
  turn: Mutex<()>,
}

impl Sequencer {
  pub fn new(registry: Arc<StrategyRegistry>) -> Self {
    Self {
      registry,
      turn: Mutex::new(()),
    }
  }

  pub const fn registry(&self) -> &Arc<StrategyRegistry> {
    &self.registry
  }

  /// Apply one envelope after every previously submitted one.
  pub async fn submit(&self, envelope: &Envelope) -> VaultResult<Receipt> {
    let _turn = self.turn.lock().await;
    let outcome = self.dispatch(envelope.caller, &envelope.command).await;
    match &outcome {
      Ok(receipt) => info!(
        id = %envelope.id,
        caller = %envelope.caller,
        op = envelope.command.name(),
        ?receipt,
        "Command applied"
      ),
      Err(err) => warn!(
        id = %envelope.id,
        caller = %envelope.caller,
        op = envelope.command.name(),
        kind = err.kind(),
        error = %err,
        "Command rejected"
      ),
    }
    outcome
  }

  /// Apply envelopes in order; a rejection does not stop the session.
  pub async fn replay(&self, envelopes: &[Envelope]) -> SessionReport {
    let mut report = SessionReport::default();
    for envelope in envelopes {
      match self.submit(envelope).await {
        Ok(_) => report.applied += 1,
        Err(err) => report.rejected.push((envelope.id, err)),
      }
    }
    report
  }

  async fn dispatch(&self, caller: Address, command: &Command) -> VaultResult<Receipt> {
    let registry = &self.registry;
    match command.clone() {
      Command::CreateStrategy {
        tokens,
        split_ratio,
        visibility,
        deposit_usd_min,
        fork_cost,
        allowed_actions,
      } => {
        let request = CreateStrategyRequest {
          tokens,
          split_ratio,
          visibility,
          deposit_usd_min,
          fork_cost,
          allowed_actions,
        };
        let id = registry.create_strategy(caller, request).await?;
        Ok(Receipt::Strategy { id })
      }
      Command::ForkStrategy { base, payment } => {
        let id = registry.fork_strategy(caller, base, payment).await?;
        Ok(Receipt::Strategy { id })
      }
      Command::Deposit {
        strategy,
        token,
        amount,
      } => {
        let minted = registry.ledger(strategy).await?.deposit(caller, token, amount).await?;
        Ok(Receipt::Shares { minted })
      }
      Command::DepositNative { strategy, amount } => {
        let minted = registry.ledger(strategy).await?.deposit_native(caller, amount).await?;
        Ok(Receipt::Shares { minted })
      }
      Command::Withdraw {
        strategy,
        lp_amount,
      } => {
        let amounts = registry.ledger(strategy).await?.withdraw(caller, lp_amount).await?;
        Ok(Receipt::Amounts { amounts })
      }
      Command::WithdrawSingle {
        strategy,
        token_out,
        lp_amount,
        min_amount_out,
      } => {
        let value = registry
          .ledger(strategy)
          .await?
          .withdraw_single(caller, token_out, lp_amount, min_amount_out)
          .await?;
        Ok(Receipt::Amount { value })
      }
      Command::WithdrawSingleNative {
        strategy,
        lp_amount,
        min_amount_out,
      } => {
        let value = registry
          .ledger(strategy)
          .await?
          .withdraw_single_native(caller, lp_amount, min_amount_out)
          .await?;
        Ok(Receipt::Amount { value })
      }
      Command::Donate {
        strategy,
        token,
        amount,
      } => {
        registry.ledger(strategy).await?.donate(caller, token, amount).await?;
        Ok(Receipt::Done)
      }
      Command::DonateNative { strategy, amount } => {
        registry.ledger(strategy).await?.donate_native(caller, amount).await?;
        Ok(Receipt::Done)
      }
      Command::TransferShares {
        strategy,
        to,
        amount,
      } => {
        registry
          .ledger(strategy)
          .await?
          .transfer_shares(caller, to, amount)
          .await?;
        Ok(Receipt::Done)
      }
      Command::ExecuteAction { strategy, call } => {
        registry.ledger(strategy).await?.execute_action(caller, call).await?;
        Ok(Receipt::Done)
      }
      Command::FundRevenue { to, amount } => {
        registry.revenue().fund(caller, to, amount).await?;
        Ok(Receipt::Done)
      }
      Command::WithdrawRevenue { amount } => {
        registry.revenue().withdraw(caller, amount).await?;
        Ok(Receipt::Done)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_envelope_parses_flat_json() {
    let line = r#"{"caller":"0x1111111111111111111111111111111111111111","op":"deposit","strategy":"0x2222222222222222222222222222222222222222","token":"0x3333333333333333333333333333333333333333","amount":"0x3e8"}"#;
    let envelope: Envelope = serde_json::from_str(line).unwrap();
    assert_eq!(envelope.caller, Address::repeat_byte(0x11));
    assert_eq!(
      envelope.command,
      Command::Deposit {
        strategy: Address::repeat_byte(0x22),
        token: Address::repeat_byte(0x33),
        amount: U256::from(1_000u64),
      }
    );
  }

  #[test]
  fn test_action_call_parses_nested_tag() {
    let line = r#"{"caller":"0x1111111111111111111111111111111111111111","op":"execute_action","strategy":"0x2222222222222222222222222222222222222222","call":{"kind":"adjust_split_ratio","ratio":[8000,2000]}}"#;
    let envelope: Envelope = serde_json::from_str(line).unwrap();
    assert_eq!(envelope.command.name(), "execute_action");
    match envelope.command {
      Command::ExecuteAction { call, .. } => {
        assert_eq!(call, ActionCall::AdjustSplitRatio { ratio: vec![8_000, 2_000] });
      }
      other => panic!("unexpected command {other:?}"),
    }
  }
}
