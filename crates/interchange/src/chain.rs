use serde::{Deserialize, Serialize};

/// A supported chain as shown in the chain selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: u32,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: String,
    #[serde(rename = "explorerUrl")]
    pub explorer_url: String,
}

impl Chain {
    fn new(id: u32, name: &str, symbol: &str, rpc_url: &str, explorer_url: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            symbol: symbol.to_string(),
            rpc_url: rpc_url.to_string(),
            explorer_url: explorer_url.to_string(),
        }
    }
}

/// Read-only registry of supported chains, in display order.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
}

impl ChainRegistry {
    /// Build a registry from an explicit chain list.
    pub fn new(chains: Vec<Chain>) -> Self {
        Self { chains }
    }

    /// The Cosmos ecosystem chains the interface ships with.
    pub fn builtin() -> Self {
        Self::new(vec![
            Chain::new(
                1,
                "Cosmos Hub",
                "ATOM",
                "https://rpc.cosmos.network",
                "https://www.mintscan.io/cosmos",
            ),
            Chain::new(
                2,
                "Osmosis",
                "OSMO",
                "https://rpc.osmosis.zone",
                "https://www.mintscan.io/osmosis",
            ),
            Chain::new(
                3,
                "Juno",
                "JUNO",
                "https://rpc.juno.omniflix.co",
                "https://www.mintscan.io/juno",
            ),
            Chain::new(
                4,
                "Secret Network",
                "SCRT",
                "https://rpc.secret.network",
                "https://www.mintscan.io/secret",
            ),
            Chain::new(
                5,
                "Akash",
                "AKT",
                "https://rpc.akash.network",
                "https://www.mintscan.io/akash",
            ),
            Chain::new(
                6,
                "Stargaze",
                "STARS",
                "https://rpc.stargaze.zone",
                "https://www.mintscan.io/stargaze",
            ),
        ])
    }

    pub fn all(&self) -> &[Chain] {
        &self.chains
    }

    pub fn get(&self, id: u32) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<&Chain> {
        self.chains.first()
    }

    /// Default (from, to) selection: the first two chains, or the only chain twice.
    pub fn default_pair(&self) -> Option<(&Chain, &Chain)> {
        let from = self.chains.first()?;
        let to = self.chains.get(1).unwrap_or(from);
        Some((from, to))
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.all().len(), 6);
        assert_eq!(registry.get(2).map(|c| c.name.as_str()), Some("Osmosis"));
        assert!(registry.get(99).is_none());
        assert!(registry.contains(6));
    }

    #[test]
    fn test_default_pair() {
        let registry = ChainRegistry::builtin();
        let (from, to) = registry.default_pair().unwrap();
        assert_eq!(from.id, 1);
        assert_eq!(to.id, 2);

        let single = ChainRegistry::new(vec![registry.get(3).unwrap().clone()]);
        let (from, to) = single.default_pair().unwrap();
        assert_eq!(from.id, 3);
        assert_eq!(to.id, 3);

        assert!(ChainRegistry::new(Vec::new()).default_pair().is_none());
    }
}
