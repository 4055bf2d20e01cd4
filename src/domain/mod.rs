//! Domain layer - Core vault models and pure math.
//!
//! Strategy parameters, share math, rebalance planning and the error
//! taxonomy. Nothing in here performs I/O or holds a lock (hexagonal
//! architecture inner ring). All types are serializable and testable in
//! isolation.

pub mod error;
pub mod events;
pub mod rebalance;
pub mod revenue;
pub mod shares;
pub mod strategy;
pub mod units;

// Re-export core types for convenience
pub use error::{AuthorizationError, OracleError, ValidationError, VaultError, VaultResult};
pub use events::{EventRecord, VaultEvent};
pub use revenue::RevenueAccount;
pub use strategy::{
    ActionCall, ActionKind, CreateStrategyRequest, SplitRatio, StrategyId, StrategyParams,
    Visibility, BASIS, NATIVE_TOKEN,
};
