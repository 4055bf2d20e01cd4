//! Error taxonomy for the vault engine.
//!
//! Every rejected operation surfaces exactly one `VaultError`. The kind is
//! preserved all the way to the caller; wrappers outside the engine may
//! collapse it, the engine never does.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use super::strategy::ActionKind;

/// Result alias used across domain and use cases.
pub type VaultResult<T> = Result<T, VaultError>;

/// Malformed creation, action or call parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("strategy must hold at least one token")]
    EmptyTokens,
    #[error("token {0} is listed more than once")]
    DuplicateToken(Address),
    #[error("token list contains the zero address")]
    ZeroAddressToken,
    #[error("split ratio has {ratio} entries but the strategy has {tokens} tokens")]
    RatioLengthMismatch { tokens: usize, ratio: usize },
    #[error("split ratio entry {index} must be positive")]
    NonPositiveRatio { index: usize },
    #[error("split ratio sums to {sum}, expected {basis}")]
    RatioSum { sum: u64, basis: u32 },
    #[error("unrecognized action code {0}")]
    UnknownAction(u8),
    #[error("unrecognized visibility code {0}")]
    UnknownVisibility(u8),
    #[error("token {0} is not part of this strategy")]
    TokenNotInStrategy(Address),
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("recipient must not be the zero address")]
    ZeroAddressRecipient,
    #[error("deposit would mint zero shares")]
    ZeroShares,
    #[error("pool has outstanding shares but no USD value")]
    PoolHasNoValue,
    #[error("unknown strategy {0}")]
    UnknownStrategy(Address),
}

/// Caller lacks a role, or the strategy's governance forbids the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("{caller} does not hold the agent role for {strategy}")]
    NotAgent { strategy: Address, caller: Address },
    #[error("action {kind} is not allowed by strategy {strategy}")]
    ActionNotAllowed { strategy: Address, kind: ActionKind },
    #[error("strategy {0} is private and cannot be forked")]
    NotForkable(Address),
}

/// Price oracle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("no price feed registered for {0}")]
    UnknownFeed(Address),
    #[error("feed for {token} is unusable (answer={answer}, age={age_secs}s)")]
    StaleFeed {
        token: Address,
        answer: i128,
        age_secs: u64,
    },
    #[error("{amounts} amounts supplied for {tokens} tokens")]
    LengthMismatch { amounts: usize, tokens: usize },
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unauthorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: U256, held: U256 },

    #[error("insufficient funds: requested {requested}, unclaimed {available}")]
    InsufficientFunds { requested: U256, available: U256 },

    #[error("deposit worth {deposit_usd} is below the minimum {minimum_usd}")]
    BelowMinimumDeposit { deposit_usd: U256, minimum_usd: U256 },

    #[error("fork requires exactly {expected}, received {paid}")]
    InsufficientForkPayment { expected: U256, paid: U256 },

    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("external call {call} failed: {reason}")]
    ExternalCallFailure { call: &'static str, reason: String },

    #[error("swap output {received} is below the floor {minimum}")]
    SlippageExceeded { minimum: U256, received: U256 },

    #[error("an operation is already in flight on {0}")]
    Reentrancy(Address),

    #[error("arithmetic failure: {0}")]
    Arithmetic(&'static str),
}

impl VaultError {
    /// Wraps a collaborator failure, keeping the full anyhow chain as text.
    pub fn external(call: &'static str, err: &anyhow::Error) -> Self {
        Self::ExternalCallFailure {
            call,
            reason: format!("{err:#}"),
        }
    }

    /// Stable snake_case label for logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authorization(_) => "authorization_error",
            Self::InsufficientShares { .. } => "insufficient_shares",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::BelowMinimumDeposit { .. } => "below_minimum_deposit",
            Self::InsufficientForkPayment { .. } => "insufficient_fork_payment",
            Self::Oracle(OracleError::UnknownFeed(_)) => "unknown_feed",
            Self::Oracle(OracleError::StaleFeed { .. }) => "stale_feed",
            Self::Oracle(OracleError::LengthMismatch { .. }) => "length_mismatch",
            Self::ExternalCallFailure { .. } => "external_call_failure",
            Self::SlippageExceeded { .. } => "slippage_exceeded",
            Self::Reentrancy(_) => "reentrancy",
            Self::Arithmetic(_) => "arithmetic",
        }
    }
}
