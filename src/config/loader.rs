//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters, and providing
//! clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, TokenConfig};
use crate::domain::strategy::BASIS;
use crate::domain::units::parse_units;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    name = %config.engine.name,
    tokens = config.tokens.len(),
    wallets = config.wallets.len(),
    agents = config.agents.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

impl AppConfig {
  pub fn token_by_symbol(&self, symbol: &str) -> Option<&TokenConfig> {
    self.tokens.iter().find(|token| token.symbol == symbol)
  }
}

impl TokenConfig {
  /// Initial feed answer scaled to `feed_decimals`.
  pub fn feed_answer(&self) -> Result<i128> {
    let raw = parse_units(&self.price_usd, self.feed_decimals)
      .with_context(|| format!("Invalid price_usd for {}: {}", self.symbol, self.price_usd))?;
    i128::try_from(raw).with_context(|| format!("price_usd for {} is too large", self.symbol))
  }
}

/// Raw amount of a wallet entry, in the token's own decimals.
pub fn wallet_amount(config: &AppConfig, symbol: &str, amount: &str) -> Result<(Address, U256)> {
  let token = config
    .token_by_symbol(symbol)
    .with_context(|| format!("Wallet references unknown token {symbol}"))?;
  let raw = parse_units(amount, token.decimals)
    .with_context(|| format!("Invalid wallet amount {amount} for {symbol}"))?;
  Ok((token.address, raw))
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.engine.name.is_empty(),
    "Engine name must not be empty"
  );

  // Registry validation
  let registry = &config.registry;
  let fixed = [
    ("factory", registry.factory),
    ("revenue", registry.revenue),
    ("swap_router", registry.swap_router),
    ("price_oracle", registry.price_oracle),
  ];
  let mut seen = HashSet::new();
  for (name, address) in fixed {
    anyhow::ensure!(
      address != Address::ZERO,
      "registry.{name} must not be the zero address"
    );
    anyhow::ensure!(
      seen.insert(address),
      "registry.{name} duplicates another registry address"
    );
  }

  // Ledger validation
  anyhow::ensure!(
    config.ledger.max_feed_age_secs > 0,
    "ledger.max_feed_age_secs must be positive"
  );
  anyhow::ensure!(
    config.ledger.rebalance_slippage_bps < BASIS,
    "ledger.rebalance_slippage_bps must be below {BASIS}, got {}",
    config.ledger.rebalance_slippage_bps
  );
  anyhow::ensure!(
    config.router.slippage_bps < BASIS,
    "router.slippage_bps must be below {BASIS}, got {}",
    config.router.slippage_bps
  );

  // Token validation
  anyhow::ensure!(
    !config.tokens.is_empty(),
    "At least one token must be configured"
  );
  let mut symbols = HashSet::new();
  let mut addresses = HashSet::new();
  for token in &config.tokens {
    anyhow::ensure!(
      symbols.insert(token.symbol.as_str()),
      "Token symbol {} is configured twice",
      token.symbol
    );
    anyhow::ensure!(
      addresses.insert(token.address),
      "Token address {} is configured twice",
      token.address
    );
    anyhow::ensure!(
      token.decimals <= 36 && token.feed_decimals <= 36,
      "Token {} has unsupported decimals",
      token.symbol
    );
    let answer = token.feed_answer()?;
    anyhow::ensure!(answer > 0, "Token {} must have a positive price", token.symbol);
  }

  // Wallet validation
  for wallet in &config.wallets {
    wallet_amount(config, &wallet.token, &wallet.amount)?;
  }

  // Chain validation: on-chain pricing replaces the static feed entirely
  if let Some(chain) = &config.chain {
    anyhow::ensure!(!chain.rpc_url.is_empty(), "chain.rpc_url must not be empty");
    for token in &config.tokens {
      anyhow::ensure!(
        token.aggregator.is_some(),
        "Token {} needs an aggregator when [chain] is configured",
        token.symbol
      );
    }
  }

  Ok(())
}
