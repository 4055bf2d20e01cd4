//! State Store - Atomic JSON Engine State Persistence
//!
//! Saves engine snapshots to `state.json` using atomic writes (write to a
//! tmp file, then rename). The file is always either the previous or the
//! new snapshot, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

use crate::adapters::memory::CustodyEntry;
use crate::usecases::strategy_registry::RegistrySnapshot;

/// Everything needed to resume the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub registry: RegistrySnapshot,
    /// In-memory custody balances; empty when custody is on-chain.
    #[serde(default)]
    pub custody: Vec<CustodyEntry>,
}

impl EngineSnapshot {
    pub fn new(registry: RegistrySnapshot, custody: Vec<CustodyEntry>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: Utc::now(),
            registry,
            custody,
        }
    }
}

pub struct StateStore {
    state_path: PathBuf,
    tmp_path: PathBuf,
}

impl StateStore {
    /// Create a store in `data_dir`, creating the directory if needed.
    pub async fn new(data_dir: &str, file_name: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            state_path: dir.join(file_name),
            tmp_path: dir.join(format!("{file_name}.tmp")),
        })
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot))]
    pub async fn save(&self, snapshot: &EngineSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize state")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp state file")?;
        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename state file")?;

        info!(
            path = %self.state_path.display(),
            strategies = snapshot.registry.strategies.len(),
            next_sequence = snapshot.registry.next_event_sequence,
            "State snapshot saved"
        );
        Ok(())
    }

    /// Load the latest snapshot, or `None` on first start.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<EngineSnapshot>> {
        if fs::metadata(&self.state_path).await.is_err() {
            info!("No state file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read state file")?;
        let snapshot: EngineSnapshot =
            serde_json::from_str(&json).context("Failed to parse state JSON")?;

        info!(
            version = %snapshot.version,
            strategies = snapshot.registry.strategies.len(),
            "State snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Healthy when the snapshot is absent (first run) or readable.
    pub async fn is_healthy(&self) -> bool {
        match fs::metadata(&self.state_path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::revenue::RevenueAccount;
    use crate::usecases::strategy_registry::RegistryAddresses;
    use alloy::primitives::{Address, U256};

    fn snapshot() -> EngineSnapshot {
        let registry = RegistrySnapshot {
            addresses: RegistryAddresses {
                factory: Address::repeat_byte(0xFA),
                revenue: Address::repeat_byte(0xFE),
                swap_router: Address::repeat_byte(0x5A),
                price_oracle: Address::repeat_byte(0x0C),
            },
            nonce: 3,
            strategies: Vec::new(),
            revenue: vec![(
                Address::repeat_byte(0x01),
                RevenueAccount {
                    claimed: U256::from(5u64),
                    unclaimed: U256::from(7u64),
                },
            )],
            next_event_sequence: 11,
        };
        let custody = vec![CustodyEntry {
            token: Address::repeat_byte(0xA1),
            holder: Address::repeat_byte(0x01),
            amount: U256::from(42u64),
        }];
        EngineSnapshot::new(registry, custody)
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = std::env::temp_dir().join(format!("vault-state-{}", uuid::Uuid::new_v4()));
        let dir = dir.to_string_lossy().to_string();
        let store = StateStore::new(&dir, "state.json").await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(store.is_healthy().await);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("vault-state-{}", uuid::Uuid::new_v4()));
        let dir = dir.to_string_lossy().to_string();
        let store = StateStore::new(&dir, "state.json").await.unwrap();

        store.save(&snapshot()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.registry.nonce, 3);
        assert_eq!(loaded.registry.next_event_sequence, 11);
        assert_eq!(loaded.registry.revenue[0].1.unclaimed, U256::from(7u64));
        assert_eq!(loaded.custody[0].amount, U256::from(42u64));
        assert!(!Path::new(&dir).join("state.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
