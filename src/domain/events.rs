//! Observable engine events.
//!
//! Events are emitted only after an operation has committed, so an
//! indexer replaying the log never sees an effect that was rolled back.
//! Each record carries a gap-free sequence number.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::{ActionCall, StrategyId, Visibility};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum VaultEvent {
    /// Echoes the creation parameters verbatim, including the raw action codes.
    StrategyCreated {
        strategy: StrategyId,
        creator: Address,
        tokens: Vec<Address>,
        split_ratio: Vec<u32>,
        visibility: Visibility,
        deposit_usd_min: U256,
        fork_cost: U256,
        allowed_actions: Vec<u8>,
    },
    StrategyForked {
        base: StrategyId,
        fork: StrategyId,
        forker: Address,
    },
    TokensDeposited {
        strategy: StrategyId,
        lp: Address,
        token: Address,
        amount: U256,
        shares: U256,
    },
    TokensWithdrawn {
        strategy: StrategyId,
        lp: Address,
        tokens: Vec<Address>,
        amounts: Vec<U256>,
        shares: U256,
    },
    TokensDonated {
        strategy: StrategyId,
        donor: Address,
        token: Address,
        amount: U256,
    },
    ActionExecuted {
        strategy: StrategyId,
        agent: Address,
        call: ActionCall,
    },
    SharesTransferred {
        strategy: StrategyId,
        from: Address,
        to: Address,
        shares: U256,
    },
    RevenueFunded {
        payer: Address,
        to: Address,
        amount: U256,
    },
    RevenueClaimed {
        account: Address,
        amount: U256,
    },
}

impl VaultEvent {
    /// Event name used as a metric label.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StrategyCreated { .. } => "strategy_created",
            Self::StrategyForked { .. } => "strategy_forked",
            Self::TokensDeposited { .. } => "tokens_deposited",
            Self::TokensWithdrawn { .. } => "tokens_withdrawn",
            Self::TokensDonated { .. } => "tokens_donated",
            Self::ActionExecuted { .. } => "action_executed",
            Self::SharesTransferred { .. } => "shares_transferred",
            Self::RevenueFunded { .. } => "revenue_funded",
            Self::RevenueClaimed { .. } => "revenue_claimed",
        }
    }

    /// Strategy the event belongs to, if any.
    pub const fn strategy(&self) -> Option<StrategyId> {
        match self {
            Self::StrategyCreated { strategy, .. }
            | Self::TokensDeposited { strategy, .. }
            | Self::TokensWithdrawn { strategy, .. }
            | Self::TokensDonated { strategy, .. }
            | Self::ActionExecuted { strategy, .. }
            | Self::SharesTransferred { strategy, .. } => Some(*strategy),
            Self::StrategyForked { fork, .. } => Some(*fork),
            Self::RevenueFunded { .. } | Self::RevenueClaimed { .. } => None,
        }
    }
}

/// A committed event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: VaultEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_flat() {
        let record = EventRecord {
            sequence: 4,
            emitted_at: Utc::now(),
            event: VaultEvent::RevenueClaimed {
                account: Address::repeat_byte(1),
                amount: U256::from(5u64),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "RevenueClaimed");
        assert_eq!(json["sequence"], 4);

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_fork_event_belongs_to_fork() {
        let event = VaultEvent::StrategyForked {
            base: Address::repeat_byte(1),
            fork: Address::repeat_byte(2),
            forker: Address::repeat_byte(3),
        };
        assert_eq!(event.strategy(), Some(Address::repeat_byte(2)));
        assert_eq!(event.name(), "strategy_forked");
    }
}
