use crate::models::{NetworkConfig, RawNetwork};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Validated set of supported chains, keyed by chain id.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkConfig>,
    order: Vec<u64>,
}

impl NetworkRegistry {
    /// Validate raw entries, dropping (and logging) any that are incomplete.
    pub fn from_raw(raw: Vec<RawNetwork>) -> Result<Self> {
        let mut networks = BTreeMap::new();
        let mut order = Vec::new();

        for (index, entry) in raw.into_iter().enumerate() {
            match NetworkConfig::try_from(entry) {
                Ok(network) => {
                    if networks.contains_key(&network.chain_id) {
                        tracing::warn!(
                            chain_id = network.chain_id,
                            "Duplicate network entry ignored"
                        );
                        continue;
                    }
                    tracing::info!(
                        chain_id = network.chain_id,
                        name = %network.name,
                        endpoints = network.rpc_endpoints.len(),
                        "Network configured"
                    );
                    order.push(network.chain_id);
                    networks.insert(network.chain_id, network);
                }
                Err(e) => tracing::warn!(entry = index, "Skipping network entry: {}", e),
            }
        }

        if networks.is_empty() {
            bail!("No valid network configured");
        }

        Ok(Self { networks, order })
    }

    pub fn get(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.get(&chain_id)
    }

    /// Networks in configuration order.
    pub fn all(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.order.iter().filter_map(|id| self.networks.get(id))
    }

    pub fn first(&self) -> Option<&NetworkConfig> {
        self.order.first().and_then(|id| self.networks.get(id))
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
