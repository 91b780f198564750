//! Shared data types observed by wallet consumers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::network::NetworkInfo;

/// Identifier of a wallet brand.
///
/// Variant order is the registration order used by the default registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Kaikas, the Kaia-native browser wallet (`window.klaytn`).
    Kaikas,
    /// MetaMask, the Ethereum-compatible browser wallet (`window.ethereum`).
    MetaMask,
}

impl ProviderKind {
    /// Every known provider kind, in registration order.
    pub const ALL: [Self; 2] = [Self::Kaikas, Self::MetaMask];

    /// Lowercase identifier used in logs and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kaikas => "kaikas",
            Self::MetaMask => "metamask",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kaikas" => Ok(Self::Kaikas),
            "metamask" => Ok(Self::MetaMask),
            _ => Err(WalletError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Connection lifecycle status of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No session.
    #[default]
    Disconnected,
    /// Waiting for the provider to approve account access.
    Connecting,
    /// Session established.
    Connected,
    /// The last connection attempt failed.
    Error,
}

/// The connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Account address as reported by the provider.
    pub address: String,
    /// Balance in the smallest unit, as a decimal integer string.
    pub balance: String,
}

impl Account {
    /// Create an account record.
    #[must_use]
    pub fn new(address: impl Into<String>, balance: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: balance.into(),
        }
    }
}

/// Externally observable snapshot of one backend.
///
/// Invariants: `account.is_some()` implies `Connected`; `Disconnected`
/// implies no account and no network; `Error` implies an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// Connected account.
    pub account: Option<Account>,
    /// Active network, if recognized.
    pub network: Option<NetworkInfo>,
    /// Which backend this snapshot belongs to.
    pub provider_kind: ProviderKind,
    /// Last error message.
    pub error: Option<String>,
}

impl WalletState {
    /// Returns `true` if the backend has an active session.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Parameters of a transaction to submit through the wallet.
///
/// Amounts are decimal integer strings in the smallest unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Recipient address.
    pub to: String,
    /// Value to transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Hex-encoded calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Gas limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Gas price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
}

impl TransactionRequest {
    /// Create a request targeting `to`.
    #[must_use]
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            ..Self::default()
        }
    }

    /// Set the value to transfer.
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the calldata.
    #[must_use]
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the gas limit.
    #[must_use]
    pub const fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Set the gas price.
    #[must_use]
    pub fn gas_price(mut self, gas_price: impl Into<String>) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    /// Transaction hash.
    pub hash: String,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// Gas consumed, as a decimal integer string.
    pub gas_used: Option<String>,
}
