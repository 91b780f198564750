//! Connection state machine embedded in every backend.
//!
//! ```text
//! Disconnected ──begin_connect──▶ Connecting ──connected──▶ Connected
//!      ▲                              │                        │
//!      └──────────reset───────── fail ▼ ◀──────begin_connect───┘
//!                                   Error
//! ```
//!
//! Every mutation keeps the [`WalletState`] invariants: an account only
//! exists while `Connected`, `Disconnected` carries no account or network,
//! and `Error` always carries a message.

use crate::network::NetworkInfo;
use crate::types::{Account, ConnectionStatus, ProviderKind, WalletState};

/// Owned, in-place mutated connection state of one backend.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    kind: ProviderKind,
    status: ConnectionStatus,
    account: Option<Account>,
    network: Option<NetworkInfo>,
    error: Option<String>,
}

impl ConnectionState {
    /// A fresh, disconnected state.
    #[must_use]
    pub const fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            status: ConnectionStatus::Disconnected,
            account: None,
            network: None,
            error: None,
        }
    }

    /// Current status.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Cached account.
    #[inline]
    #[must_use]
    pub const fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Cached network.
    #[inline]
    #[must_use]
    pub const fn network(&self) -> Option<&NetworkInfo> {
        self.network.as_ref()
    }

    /// Last error message.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Enter `Connecting`. Drops the previous session's account and network
    /// and clears the last error.
    pub fn begin_connect(&mut self) {
        self.status = ConnectionStatus::Connecting;
        self.account = None;
        self.network = None;
        self.error = None;
        self.debug_check();
    }

    /// Enter `Connected` with a fresh account and network.
    pub fn connected(&mut self, account: Account, network: Option<NetworkInfo>) {
        self.status = ConnectionStatus::Connected;
        self.account = Some(account);
        self.network = network;
        self.error = None;
        self.debug_check();
    }

    /// Enter `Error` with `message`. Drops the account.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ConnectionStatus::Error;
        self.account = None;
        self.error = Some(message.into());
        self.debug_check();
    }

    /// Return to `Disconnected`, clearing everything.
    pub fn reset(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.account = None;
        self.network = None;
        self.error = None;
        self.debug_check();
    }

    /// Replace the account in place. Ignored unless `Connected`.
    pub fn update_account(&mut self, account: Account) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        self.account = Some(account);
        self.debug_check();
        true
    }

    /// Replace the network in place. Ignored while `Disconnected`.
    pub fn update_network(&mut self, network: Option<NetworkInfo>) -> bool {
        if self.status == ConnectionStatus::Disconnected {
            return false;
        }
        self.network = network;
        self.debug_check();
        true
    }

    /// Snapshot for external consumers.
    #[must_use]
    pub fn snapshot(&self) -> WalletState {
        WalletState {
            status: self.status,
            account: self.account.clone(),
            network: self.network.clone(),
            provider_kind: self.kind,
            error: self.error.clone(),
        }
    }

    /// Returns `true` if the invariants hold.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let account_ok = self.account.is_none() || self.status == ConnectionStatus::Connected;
        let disconnected_ok = self.status != ConnectionStatus::Disconnected
            || (self.account.is_none() && self.network.is_none());
        let error_ok = self.status != ConnectionStatus::Error || self.error.is_some();
        account_ok && disconnected_ok && error_ok
    }

    fn debug_check(&self) {
        debug_assert!(self.is_consistent(), "inconsistent wallet state: {self:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{KAIROS_TESTNET, NetworkRegistry};

    fn testnet() -> Option<NetworkInfo> {
        NetworkRegistry::default().resolve(KAIROS_TESTNET)
    }

    #[test]
    fn test_fresh_state_is_disconnected() {
        let state = ConnectionState::new(ProviderKind::Kaikas);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert!(snapshot.account.is_none() && snapshot.network.is_none());
        assert_eq!(snapshot.provider_kind, ProviderKind::Kaikas);
    }

    #[test]
    fn test_full_cycle() {
        let mut state = ConnectionState::new(ProviderKind::Kaikas);
        state.begin_connect();
        assert_eq!(state.status(), ConnectionStatus::Connecting);

        state.connected(Account::new("0xabc", "1"), testnet());
        assert_eq!(state.status(), ConnectionStatus::Connected);
        assert_eq!(state.account().unwrap().address, "0xabc");

        state.reset();
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert!(state.account().is_none() && state.network().is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_fail_drops_account_and_records_error() {
        let mut state = ConnectionState::new(ProviderKind::MetaMask);
        state.connected(Account::new("0xabc", "1"), testnet());
        state.begin_connect();
        assert!(state.account().is_none());

        state.fail("User rejected the request.");
        assert_eq!(state.status(), ConnectionStatus::Error);
        assert_eq!(state.error(), Some("User rejected the request."));
        assert!(state.account().is_none());
    }

    #[test]
    fn test_reconnect_forgets_previous_network() {
        let mut state = ConnectionState::new(ProviderKind::Kaikas);
        state.connected(Account::new("0xabc", "1"), testnet());

        state.begin_connect();
        assert!(state.network().is_none());

        state.fail("offline");
        let snapshot = state.snapshot();
        assert!(snapshot.account.is_none() && snapshot.network.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_successful_connect_clears_previous_error() {
        let mut state = ConnectionState::new(ProviderKind::MetaMask);
        state.fail("boom");
        state.begin_connect();
        state.connected(Account::new("0xabc", "1"), None);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_updates_ignored_when_not_applicable() {
        let mut state = ConnectionState::new(ProviderKind::Kaikas);
        assert!(!state.update_account(Account::new("0xabc", "1")));
        assert!(!state.update_network(testnet()));
        assert!(state.account().is_none() && state.network().is_none());

        state.connected(Account::new("0xabc", "1"), None);
        assert!(state.update_account(Account::new("0xdef", "2")));
        assert!(state.update_network(testnet()));
        assert_eq!(state.account().unwrap().address, "0xdef");
        assert_eq!(state.network().unwrap().chain_id, KAIROS_TESTNET);
    }
}
