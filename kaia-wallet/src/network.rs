//! Static network metadata keyed by chain id.
//!
//! [`NetworkRegistry`] is a pure lookup table. The built-in table covers
//! Kaia mainnet (8217) and the Kairos testnet (1001); further entries may be
//! added through [`NetworkRegistry::builder`].

use std::collections::BTreeMap;

use serde::Serialize;

/// Kaia mainnet chain id.
pub const KAIA_MAINNET: u64 = 8217;
/// Kairos public testnet chain id.
pub const KAIROS_TESTNET: u64 = 1001;

/// Native currency descriptor sent with `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    /// Currency name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Number of decimals of the smallest unit.
    pub decimals: u8,
}

/// Immutable metadata describing one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Numeric chain id.
    pub chain_id: u64,
    /// Display name.
    pub name: String,
    /// Public JSON-RPC endpoint.
    pub rpc_url: String,
    /// Block explorer base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    /// Native currency.
    pub native_currency: NativeCurrency,
}

impl NetworkInfo {
    /// Create a network entry with an 18-decimal native currency.
    #[must_use]
    pub fn new(
        chain_id: u64,
        name: impl Into<String>,
        rpc_url: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            chain_id,
            name: name.into(),
            rpc_url: rpc_url.into(),
            explorer_url: None,
            native_currency: NativeCurrency {
                name: symbol.clone(),
                symbol,
                decimals: 18,
            },
        }
    }

    /// Set the block explorer base URL.
    #[must_use]
    pub fn with_explorer(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    /// The chain id hex-encoded the way injected providers expect it.
    #[must_use]
    pub fn hex_chain_id(&self) -> String {
        to_hex_chain_id(self.chain_id)
    }

    /// Explorer link for a transaction hash, if an explorer is known.
    #[must_use]
    pub fn explorer_tx_url(&self, hash: &str) -> Option<String> {
        self.explorer_url
            .as_deref()
            .map(|base| format!("{}/tx/{hash}", base.trim_end_matches('/')))
    }

    /// Explorer link for an account address, if an explorer is known.
    #[must_use]
    pub fn explorer_address_url(&self, address: &str) -> Option<String> {
        self.explorer_url
            .as_deref()
            .map(|base| format!("{}/address/{address}", base.trim_end_matches('/')))
    }
}

/// Fixed mapping from chain id to [`NetworkInfo`].
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkInfo>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl NetworkRegistry {
    /// Create a builder seeded with the built-in Kaia networks.
    #[must_use]
    pub fn builder() -> NetworkRegistryBuilder {
        NetworkRegistryBuilder::default()
    }

    /// Look up a chain id. Returns `None` for unknown chains.
    #[must_use]
    pub fn resolve(&self, chain_id: u64) -> Option<NetworkInfo> {
        self.networks.get(&chain_id).cloned()
    }

    /// Returns `true` if the chain id is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, chain_id: u64) -> bool {
        self.networks.contains_key(&chain_id)
    }

    /// Registered chain ids in ascending order.
    #[must_use]
    pub fn chain_ids(&self) -> Vec<u64> {
        self.networks.keys().copied().collect()
    }
}

/// Builder for [`NetworkRegistry`].
#[derive(Debug)]
pub struct NetworkRegistryBuilder {
    networks: BTreeMap<u64, NetworkInfo>,
}

impl Default for NetworkRegistryBuilder {
    fn default() -> Self {
        let networks = [
            NetworkInfo::new(
                KAIA_MAINNET,
                "Kaia Mainnet",
                "https://public-en.node.kaia.io",
                "KAIA",
            )
            .with_explorer("https://kaiascan.io"),
            NetworkInfo::new(
                KAIROS_TESTNET,
                "Kairos Testnet",
                "https://public-en-kairos.node.kaia.io",
                "KAIA",
            )
            .with_explorer("https://kairos.kaiascan.io"),
        ]
        .into_iter()
        .map(|info| (info.chain_id, info))
        .collect();
        Self { networks }
    }
}

impl NetworkRegistryBuilder {
    /// Add or replace a network entry.
    #[must_use]
    pub fn with_network(mut self, info: NetworkInfo) -> Self {
        self.networks.insert(info.chain_id, info);
        self
    }

    /// Build the registry.
    #[must_use]
    pub fn build(self) -> NetworkRegistry {
        NetworkRegistry {
            networks: self.networks,
        }
    }
}

/// Encode a chain id as a `0x`-prefixed hex quantity.
#[must_use]
pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

/// Parse a chain id from a hex quantity (`0x3e9`) or a decimal string.
#[must_use]
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_builtin_networks() {
        let registry = NetworkRegistry::default();

        let mainnet = registry.resolve(KAIA_MAINNET).unwrap();
        assert_eq!(mainnet.name, "Kaia Mainnet");
        assert_eq!(mainnet.hex_chain_id(), "0x2019");

        let testnet = registry.resolve(KAIROS_TESTNET).unwrap();
        assert_eq!(testnet.hex_chain_id(), "0x3e9");
        assert_eq!(registry.chain_ids(), vec![KAIROS_TESTNET, KAIA_MAINNET]);
    }

    #[test]
    fn test_resolve_unknown_chain() {
        let registry = NetworkRegistry::default();
        assert!(registry.resolve(999_999).is_none());
        assert!(!registry.contains(1));
    }

    #[test]
    fn test_builder_adds_network() {
        let registry = NetworkRegistry::builder()
            .with_network(NetworkInfo::new(31337, "Local", "http://127.0.0.1:8545", "ETH"))
            .build();
        assert!(registry.contains(31337));
        assert!(registry.resolve(31337).unwrap().explorer_url.is_none());
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x2019"), Some(8217));
        assert_eq!(parse_chain_id("1001"), Some(1001));
        assert_eq!(parse_chain_id("0xzz"), None);
    }

    #[test]
    fn test_explorer_links() {
        let info = NetworkRegistry::default().resolve(KAIROS_TESTNET).unwrap();
        assert_eq!(
            info.explorer_tx_url("0xabc").as_deref(),
            Some("https://kairos.kaiascan.io/tx/0xabc")
        );
        assert_eq!(
            info.explorer_address_url("0xdef").as_deref(),
            Some("https://kairos.kaiascan.io/address/0xdef")
        );
    }
}
