//! Configuration for wallet backends and the registry.

use std::time::Duration;

use crate::types::ProviderKind;

/// Shared wallet configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Order in which `auto_connect` tries available wallets.
    pub priority: Vec<ProviderKind>,
    /// How often to poll for a transaction receipt.
    pub receipt_poll_interval: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            priority: vec![ProviderKind::Kaikas, ProviderKind::MetaMask],
            receipt_poll_interval: Duration::from_secs(1),
        }
    }
}

impl WalletConfig {
    /// Set the auto-connect priority order.
    #[must_use]
    pub fn priority(mut self, priority: impl IntoIterator<Item = ProviderKind>) -> Self {
        self.priority = priority.into_iter().collect();
        self
    }

    /// Set the receipt polling period.
    #[must_use]
    pub const fn receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_config_default() {
        let config = WalletConfig::default();
        assert_eq!(
            config.priority,
            vec![ProviderKind::Kaikas, ProviderKind::MetaMask]
        );
        assert_eq!(config.receipt_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_wallet_config_setters() {
        let config = WalletConfig::default()
            .priority([ProviderKind::MetaMask])
            .receipt_poll_interval(Duration::from_millis(250));
        assert_eq!(config.priority, vec![ProviderKind::MetaMask]);
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(250));
    }
}
