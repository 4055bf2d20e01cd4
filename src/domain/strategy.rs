//! Strategy parameters and their structural validation.
//!
//! A strategy is an ordered set of distinct tokens, a split ratio aligned
//! 1:1 with those tokens, a visibility flag, a per-deposit USD floor, a
//! fork price and the closed set of rebalancing actions its agent may call.
//! Everything here is pure: the registry validates a request once and the
//! resulting `StrategyParams` never change for the life of the strategy.

use std::collections::HashSet;
use std::fmt;

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Strategies are identified by their own address.
pub type StrategyId = Address;

/// Split-ratio entries must sum to this constant.
pub const BASIS: u32 = 10_000;

/// Sentinel identifying the chain's native asset in token lists.
pub const NATIVE_TOKEN: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

// ────────────────────────────────────────────
// Visibility
// ────────────────────────────────────────────

/// Whether a strategy is open to outside depositors and to forking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Only public strategies can be cloned.
    pub const fn is_forkable(self) -> bool {
        matches!(self, Self::Public)
    }
}

impl TryFrom<u8> for Visibility {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Public),
            1 => Ok(Self::Private),
            other => Err(ValidationError::UnknownVisibility(other)),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

// ────────────────────────────────────────────
// Actions
// ────────────────────────────────────────────

/// The closed set of governed rebalancing actions.
///
/// Wire codes follow the on-chain enum ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AdjustSplitRatio,
    SwapToSingle,
    SwapToMany,
}

impl ActionKind {
    pub const ALL: [Self; 3] = [Self::AdjustSplitRatio, Self::SwapToSingle, Self::SwapToMany];

    /// ABI code of this action.
    pub const fn code(self) -> u8 {
        match self {
            Self::AdjustSplitRatio => 0,
            Self::SwapToSingle => 1,
            Self::SwapToMany => 2,
        }
    }
}

impl TryFrom<u8> for ActionKind {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(ValidationError::UnknownAction(code))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdjustSplitRatio => write!(f, "AdjustSplitRatio"),
            Self::SwapToSingle => write!(f, "SwapToSingle"),
            Self::SwapToMany => write!(f, "SwapToMany"),
        }
    }
}

/// A concrete action invocation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionCall {
    /// Replace the split ratio and swap towards it.
    AdjustSplitRatio { ratio: Vec<u32> },
    /// Swap every other balance into `target`.
    SwapToSingle { target: Address },
    /// Spread holdings across all tokens per the current split ratio.
    SwapToMany,
}

impl ActionCall {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::AdjustSplitRatio { .. } => ActionKind::AdjustSplitRatio,
            Self::SwapToSingle { .. } => ActionKind::SwapToSingle,
            Self::SwapToMany => ActionKind::SwapToMany,
        }
    }
}

// ────────────────────────────────────────────
// Split ratio
// ────────────────────────────────────────────

/// Positive weights summing to [`BASIS`].
///
/// Construction is the only place the sum rule is checked, so holding a
/// `SplitRatio` is proof of validity. Alignment with a token list is checked
/// separately by [`SplitRatio::for_tokens`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct SplitRatio(Vec<u32>);

impl SplitRatio {
    /// Validates positivity and the basis sum.
    pub fn parse(entries: Vec<u32>) -> Result<Self, ValidationError> {
        if let Some(index) = entries.iter().position(|&weight| weight == 0) {
            return Err(ValidationError::NonPositiveRatio { index });
        }
        let sum: u64 = entries.iter().map(|&weight| u64::from(weight)).sum();
        if sum != u64::from(BASIS) {
            return Err(ValidationError::RatioSum { sum, basis: BASIS });
        }
        Ok(Self(entries))
    }

    /// Validates against a token count, then positivity and sum.
    pub fn for_tokens(entries: Vec<u32>, token_count: usize) -> Result<Self, ValidationError> {
        if entries.len() != token_count {
            return Err(ValidationError::RatioLengthMismatch {
                tokens: token_count,
                ratio: entries.len(),
            });
        }
        Self::parse(entries)
    }

    pub fn entries(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<u32>> for SplitRatio {
    type Error = ValidationError;

    fn try_from(entries: Vec<u32>) -> Result<Self, Self::Error> {
        Self::parse(entries)
    }
}

impl From<SplitRatio> for Vec<u32> {
    fn from(ratio: SplitRatio) -> Self {
        ratio.0
    }
}

// ────────────────────────────────────────────
// Creation request and validated parameters
// ────────────────────────────────────────────

/// Raw creation input, exactly as a caller submits it.
///
/// Kept verbatim so the creation record can echo it back to indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStrategyRequest {
    pub tokens: Vec<Address>,
    pub split_ratio: Vec<u32>,
    pub visibility: Visibility,
    pub deposit_usd_min: U256,
    pub fork_cost: U256,
    pub allowed_actions: Vec<u8>,
}

/// Validated, immutable strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub tokens: Vec<Address>,
    /// Ratio the strategy was created (or forked) with.
    pub split_ratio: SplitRatio,
    pub visibility: Visibility,
    /// Minimum USD value (18 decimals) of a single deposit.
    pub deposit_usd_min: U256,
    /// Exact native amount a forker must pay.
    pub fork_cost: U256,
    pub allowed_actions: Vec<ActionKind>,
    pub creator: Address,
    pub base_strategy: Option<StrategyId>,
}

impl StrategyParams {
    /// Validates a creation request for a root strategy.
    pub fn from_request(
        request: &CreateStrategyRequest,
        creator: Address,
    ) -> Result<Self, ValidationError> {
        validate_tokens(&request.tokens)?;
        let split_ratio =
            SplitRatio::for_tokens(request.split_ratio.clone(), request.tokens.len())?;

        let mut allowed_actions = Vec::with_capacity(request.allowed_actions.len());
        for &code in &request.allowed_actions {
            let kind = ActionKind::try_from(code)?;
            if !allowed_actions.contains(&kind) {
                allowed_actions.push(kind);
            }
        }

        Ok(Self {
            tokens: request.tokens.clone(),
            split_ratio,
            visibility: request.visibility,
            deposit_usd_min: request.deposit_usd_min,
            fork_cost: request.fork_cost,
            allowed_actions,
            creator,
            base_strategy: None,
        })
    }

    /// Parameters of a clone of `self`, taken with the base's live ratio.
    pub fn fork(&self, base: StrategyId, current_ratio: SplitRatio, forker: Address) -> Self {
        Self {
            tokens: self.tokens.clone(),
            split_ratio: current_ratio,
            visibility: self.visibility,
            deposit_usd_min: self.deposit_usd_min,
            fork_cost: self.fork_cost,
            allowed_actions: self.allowed_actions.clone(),
            creator: forker,
            base_strategy: Some(base),
        }
    }

    pub fn token_index(&self, token: Address) -> Option<usize> {
        self.tokens.iter().position(|&candidate| candidate == token)
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        self.allowed_actions.contains(&kind)
    }

    /// ABI codes of the allowed actions, in stored order.
    pub fn allowed_action_codes(&self) -> Vec<u8> {
        self.allowed_actions.iter().map(|kind| kind.code()).collect()
    }
}

fn validate_tokens(tokens: &[Address]) -> Result<(), ValidationError> {
    if tokens.is_empty() {
        return Err(ValidationError::EmptyTokens);
    }
    let mut seen = HashSet::with_capacity(tokens.len());
    for &token in tokens {
        if token == Address::ZERO {
            return Err(ValidationError::ZeroAddressToken);
        }
        if !seen.insert(token) {
            return Err(ValidationError::DuplicateToken(token));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn request() -> CreateStrategyRequest {
        CreateStrategyRequest {
            tokens: vec![token(1), token(2)],
            split_ratio: vec![5_000, 5_000],
            visibility: Visibility::Public,
            deposit_usd_min: U256::ZERO,
            fork_cost: U256::from(10u64),
            allowed_actions: vec![0, 2],
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let params = StrategyParams::from_request(&request(), token(9)).unwrap();
        assert_eq!(params.tokens.len(), 2);
        assert!(params.allows(ActionKind::AdjustSplitRatio));
        assert!(!params.allows(ActionKind::SwapToSingle));
        assert!(params.base_strategy.is_none());
        assert_eq!(params.creator, token(9));
    }

    #[test]
    fn test_empty_tokens_rejected() {
        let mut req = request();
        req.tokens.clear();
        req.split_ratio.clear();
        assert_eq!(
            StrategyParams::from_request(&req, token(9)),
            Err(ValidationError::EmptyTokens)
        );
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let mut req = request();
        req.tokens = vec![token(1), token(1)];
        assert_eq!(
            StrategyParams::from_request(&req, token(9)),
            Err(ValidationError::DuplicateToken(token(1)))
        );
    }

    #[test]
    fn test_ratio_rules() {
        assert!(matches!(
            SplitRatio::for_tokens(vec![10_000], 2),
            Err(ValidationError::RatioLengthMismatch { tokens: 2, ratio: 1 })
        ));
        assert_eq!(
            SplitRatio::parse(vec![10_000, 0]),
            Err(ValidationError::NonPositiveRatio { index: 1 })
        );
        assert_eq!(
            SplitRatio::parse(vec![5_000, 4_999]),
            Err(ValidationError::RatioSum { sum: 9_999, basis: BASIS })
        );
        assert!(SplitRatio::parse(vec![8_000, 2_000]).is_ok());
    }

    #[test]
    fn test_ratio_sum_does_not_overflow() {
        let result = SplitRatio::parse(vec![u32::MAX, u32::MAX]);
        assert!(matches!(result, Err(ValidationError::RatioSum { .. })));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut req = request();
        req.allowed_actions = vec![0, 7];
        assert_eq!(
            StrategyParams::from_request(&req, token(9)),
            Err(ValidationError::UnknownAction(7))
        );
    }

    #[test]
    fn test_action_codes_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::try_from(kind.code()), Ok(kind));
        }
    }

    #[test]
    fn test_fork_copies_and_relinks() {
        let base = StrategyParams::from_request(&request(), token(9)).unwrap();
        let live = SplitRatio::parse(vec![8_000, 2_000]).unwrap();
        let fork = base.fork(token(0xAA), live.clone(), token(7));

        assert_eq!(fork.tokens, base.tokens);
        assert_eq!(fork.split_ratio, live);
        assert_eq!(fork.fork_cost, base.fork_cost);
        assert_eq!(fork.allowed_actions, base.allowed_actions);
        assert_eq!(fork.creator, token(7));
        assert_eq!(fork.base_strategy, Some(token(0xAA)));
    }

    #[test]
    fn test_native_sentinel_matches_abi_constant() {
        let parsed: Address = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".parse().unwrap();
        assert_eq!(parsed, NATIVE_TOKEN);
    }
}
