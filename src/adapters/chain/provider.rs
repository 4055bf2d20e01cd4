//! RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Manages the JSON-RPC connection used by on-chain price feeds. Validates
//! connectivity and the chain id at startup and exposes a shared provider
//! instance for all chain adapters.
//!
//! `on_builtin` picks the transport from the URL scheme and yields a
//! boxed-transport provider, stored as a type-erased `dyn Provider` to keep
//! the API clean across the adapter layer.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::ChainConfig;

/// Shared RPC provider backed by alloy-rs 0.9.
pub struct ChainProvider {
    provider: Arc<dyn Provider + Send + Sync>,
    chain_id: u64,
}

impl ChainProvider {
    /// Connect to the RPC endpoint and validate the chain id.
    #[instrument(skip_all, fields(expected_chain_id = config.chain_id))]
    pub async fn connect(config: &ChainConfig) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .on_builtin(&config.rpc_url)
            .await
            .context("Failed to connect to RPC endpoint")?;
        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if chain_id != config.chain_id {
            anyhow::bail!(
                "Expected chain_id={}, got {chain_id}",
                config.chain_id
            );
        }

        info!(chain_id, "Connected to RPC");
        Ok(Self { provider, chain_id })
    }

    /// Read-only `eth_call` with raw calldata.
    pub async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes> {
        let request = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(calldata).into());
        self.provider
            .call(&request)
            .await
            .with_context(|| format!("eth_call to {to} failed"))
    }

    /// Fail unless `address` has deployed code.
    pub async fn ensure_contract(&self, name: &str, address: Address) -> Result<()> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .with_context(|| format!("Failed to query code for {name}"))?;
        if code.is_empty() {
            anyhow::bail!("Contract {name} at {address} has no deployed code, check config.toml");
        }
        Ok(())
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
