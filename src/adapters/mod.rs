//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! infrastructure. Each sub-module groups adapters by concern.
//!
//! Adapter categories:
//! - `chain`: Chainlink price feeds via alloy-rs JSON-RPC
//! - `feeds`: Static, configured price feeds
//! - `memory`: In-memory custody, swap router, agent roles and clocks
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSONL event journal, state snapshots, command sessions

pub mod chain;
pub mod feeds;
pub mod memory;
pub mod metrics;
pub mod persistence;
