//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! engine's operations. Each use case owns its state and its own
//! atomicity guarantees.
//!
//! Use cases:
//! - `PriceOracle`: USD valuation and cross-token quotes
//! - `RevenueLedger`: Claimed/unclaimed protocol revenue per account
//! - `ValueLedger`: Per-strategy pool, shares and governed actions
//! - `StrategyRegistry`: Creation, forking and lineage
//! - `EventLog`: Sequenced record of committed effects
//! - `Sequencer`: Total ordering of submitted commands

pub mod event_log;
pub mod price_oracle;
pub mod revenue_ledger;
pub mod sequencer;
pub mod strategy_registry;
pub mod value_ledger;

pub use event_log::EventLog;
pub use price_oracle::PriceOracle;
pub use revenue_ledger::RevenueLedger;
pub use sequencer::{Command, Envelope, Receipt, Sequencer, SessionReport};
pub use strategy_registry::{RegistryAddresses, RegistrySnapshot, StrategyRegistry};
pub use value_ledger::{LedgerPorts, LedgerSettings, LedgerSnapshot, LedgerState, ValueLedger};
