//! Static agent role table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

use crate::ports::agent_authority::AgentAuthority;

/// Agent grants held in memory.
///
/// Global agents may act on every strategy; per-strategy grants cover one.
#[derive(Debug, Default)]
pub struct StaticAgentAuthority {
    global: RwLock<BTreeSet<Address>>,
    grants: RwLock<BTreeMap<Address, BTreeSet<Address>>>,
}

impl StaticAgentAuthority {
    pub fn new(global_agents: impl IntoIterator<Item = Address>) -> Self {
        Self {
            global: RwLock::new(global_agents.into_iter().collect()),
            grants: RwLock::default(),
        }
    }

    pub fn grant(&self, strategy: Address, agent: Address) {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(strategy)
            .or_default()
            .insert(agent);
    }

    pub fn revoke(&self, strategy: Address, agent: Address) {
        if let Some(agents) = self
            .grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&strategy)
        {
            agents.remove(&agent);
        }
    }
}

#[async_trait]
impl AgentAuthority for StaticAgentAuthority {
    async fn is_agent(&self, strategy: Address, caller: Address) -> Result<bool> {
        if self
            .global
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&caller)
        {
            return Ok(true);
        }
        Ok(self
            .grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&strategy)
            .is_some_and(|agents| agents.contains(&caller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grants_are_scoped() {
        let authority = StaticAgentAuthority::new([Address::repeat_byte(9)]);
        let strategy = Address::repeat_byte(1);
        let agent = Address::repeat_byte(2);

        assert!(authority.is_agent(strategy, Address::repeat_byte(9)).await.unwrap());
        assert!(!authority.is_agent(strategy, agent).await.unwrap());

        authority.grant(strategy, agent);
        assert!(authority.is_agent(strategy, agent).await.unwrap());
        assert!(!authority.is_agent(Address::repeat_byte(3), agent).await.unwrap());

        authority.revoke(strategy, agent);
        assert!(!authority.is_agent(strategy, agent).await.unwrap());
    }
}
