//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Every address the
//! engine depends on (factory, revenue custody, router, oracle, tokens,
//! feeds) is externalized here, nothing is hardcoded in the domain layer.

pub mod loader;

use alloy::primitives::Address;
use serde::Deserialize;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Engine identity and logging.
  pub engine: EngineConfig,
  /// Fixed registry collaborator addresses.
  pub registry: RegistryConfig,
  /// Ledger and oracle tunables.
  #[serde(default)]
  pub ledger: LedgerConfig,
  /// In-memory swap router behaviour.
  #[serde(default)]
  pub router: RouterConfig,
  /// Priced tokens.
  pub tokens: Vec<TokenConfig>,
  /// Initial in-memory custody balances.
  #[serde(default)]
  pub wallets: Vec<WalletConfig>,
  /// Addresses holding the agent role on every strategy.
  #[serde(default)]
  pub agents: Vec<Address>,
  /// Command session replayed at startup.
  #[serde(default)]
  pub session: SessionConfig,
  /// Persistence configuration.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Optional JSON-RPC connection for Chainlink feeds.
  pub chain: Option<ChainConfig>,
}

/// Engine identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Addresses injected into the registry at construction.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegistryConfig {
  pub factory: Address,
  pub revenue: Address,
  pub swap_router: Address,
  pub price_oracle: Address,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LedgerConfig {
  /// Feed rounds older than this are stale.
  #[serde(default = "default_max_feed_age")]
  pub max_feed_age_secs: u64,
  /// Slippage accepted on agent rebalance swaps (basis points).
  #[serde(default = "default_rebalance_slippage")]
  pub rebalance_slippage_bps: u32,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      max_feed_age_secs: default_max_feed_age(),
      rebalance_slippage_bps: default_rebalance_slippage(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RouterConfig {
  /// Execution discount of the in-memory router (basis points).
  #[serde(default = "default_router_slippage")]
  pub slippage_bps: u32,
}

impl Default for RouterConfig {
  fn default() -> Self {
    Self {
      slippage_bps: default_router_slippage(),
    }
  }
}

/// A priced token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
  pub symbol: String,
  pub address: Address,
  pub decimals: u8,
  /// Initial USD price as a decimal string ("3000.25").
  pub price_usd: String,
  #[serde(default = "default_feed_decimals")]
  pub feed_decimals: u8,
  /// Chainlink aggregator; used when `[chain]` is configured.
  pub aggregator: Option<Address>,
}

/// An initial custody balance.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
  pub holder: Address,
  /// Token symbol from `[[tokens]]`.
  pub token: String,
  /// Human-readable amount ("1.5").
  pub amount: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
  /// JSONL file of command envelopes.
  pub commands: Option<String>,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for event journals and snapshots.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Snapshot file name inside `data_dir`.
  #[serde(default = "default_snapshot_file")]
  pub snapshot_file: String,
  /// Resume from the snapshot when one exists.
  #[serde(default = "default_true")]
  pub restore_on_start: bool,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      snapshot_file: default_snapshot_file(),
      restore_on_start: true,
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// JSON-RPC endpoint for on-chain price feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  pub rpc_url: String,
  pub chain_id: u64,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_max_feed_age() -> u64 {
  3_600
}

fn default_rebalance_slippage() -> u32 {
  100
}

fn default_router_slippage() -> u32 {
  30
}

fn default_feed_decimals() -> u8 {
  8
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_snapshot_file() -> String {
  "state.json".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
