//! Registry of wallet backends keyed by provider kind.
//!
//! [`WalletRegistry`] owns one backend per registered [`ProviderKind`] for
//! its whole lifetime. It answers which wallets are available, hands out
//! backends on selection, resolves auto-connect priority, and snapshots the
//! state of every backend. It never mutates a backend except through the
//! backend's own operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use kaia_wallet::prelude::*;
//!
//! let registry = WalletRegistry::new(env);
//! if let Some(wallet) = registry.auto_connect().await {
//!     let balance = wallet.balance(None).await?;
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::backend::{ClientFactory, InjectedWallet, SharedWallet, WalletBackend};
use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::network::NetworkRegistry;
use crate::provider::Environment;
use crate::types::{ConnectionStatus, ProviderKind, WalletState};

/// Owns every wallet backend and applies cross-backend policies.
pub struct WalletRegistry {
    /// Backends in registration order.
    backends: Vec<SharedWallet>,
    /// Kind of the last selected backend.
    current: Mutex<Option<ProviderKind>>,
    /// Auto-connect priority.
    priority: Vec<ProviderKind>,
    networks: Arc<NetworkRegistry>,
}

impl WalletRegistry {
    /// Create a registry with the built-in Kaikas and MetaMask backends.
    #[must_use]
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self::builder(env).build()
    }

    /// Create a builder over `env`.
    #[must_use]
    pub fn builder(env: Arc<dyn Environment>) -> WalletRegistryBuilder {
        WalletRegistryBuilder::new(env)
    }

    /// The backend registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<SharedWallet> {
        self.backends
            .iter()
            .find(|backend| backend.kind() == kind)
            .map(Arc::clone)
    }

    /// Registered kinds in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.backends.iter().map(|backend| backend.kind()).collect()
    }

    /// The network table shared by the built-in backends.
    #[must_use]
    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Kinds whose provider is currently available, in registration order.
    #[must_use]
    pub fn available_wallets(&self) -> Vec<ProviderKind> {
        self.backends
            .iter()
            .filter(|backend| backend.is_available())
            .map(|backend| backend.kind())
            .collect()
    }

    /// Select the backend for `kind` and remember it as current.
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` if nothing is registered for `kind`;
    /// `Unavailable` if its provider is not present.
    pub fn select_wallet(&self, kind: ProviderKind) -> Result<SharedWallet> {
        let backend = self
            .get(kind)
            .ok_or_else(|| WalletError::UnsupportedProvider(kind.to_string()))?;
        if !backend.is_available() {
            return Err(WalletError::Unavailable { provider: kind });
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(kind);
        Ok(backend)
    }

    /// Select a backend by its string identifier (`"kaikas"`, `"metamask"`).
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` for unknown names, otherwise as
    /// [`select_wallet`](Self::select_wallet).
    pub fn select_wallet_by_name(&self, name: &str) -> Result<SharedWallet> {
        self.select_wallet(name.parse()?)
    }

    /// The last selected backend.
    #[must_use]
    pub fn current_wallet(&self) -> Option<SharedWallet> {
        let kind = (*self.current.lock().unwrap_or_else(PoisonError::into_inner))?;
        self.get(kind)
    }

    /// Connect the first available wallet in priority order.
    ///
    /// A candidate whose `connect` fails is logged and skipped; that backend
    /// keeps the `Error` state its failed connect recorded. Returns `None`
    /// when nothing is available or every candidate fails.
    pub async fn auto_connect(&self) -> Option<SharedWallet> {
        let available = self.available_wallets();
        let candidates = self
            .priority
            .iter()
            .copied()
            .filter(|kind| available.contains(kind));

        for kind in candidates {
            let wallet = match self.select_wallet(kind) {
                Ok(wallet) => wallet,
                Err(err) => {
                    warn!(provider = %kind, %err, "auto-connect candidate unavailable");
                    continue;
                }
            };
            match wallet.connect().await {
                Ok(account) => {
                    info!(provider = %kind, address = %account.address, "auto-connected");
                    return Some(wallet);
                }
                Err(err) => {
                    warn!(provider = %kind, %err, "auto-connect failed, trying next wallet");
                }
            }
        }
        None
    }

    /// Disconnect every connected backend and clear the current selection.
    pub fn disconnect_all(&self) {
        for backend in &self.backends {
            if backend.state().status == ConnectionStatus::Connected {
                backend.disconnect();
            }
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of every backend's cached state. Performs no provider calls.
    #[must_use]
    pub fn wallet_states(&self) -> BTreeMap<ProviderKind, WalletState> {
        self.backends
            .iter()
            .map(|backend| (backend.kind(), backend.state()))
            .collect()
    }

    /// Drive every backend's account refresh. See [`WalletBackend::listen`].
    pub async fn listen(&self) {
        futures::future::join_all(self.backends.iter().map(|backend| backend.listen())).await;
    }
}

impl std::fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRegistry")
            .field("backends", &self.kinds())
            .field("current", &*self.current.lock().unwrap_or_else(PoisonError::into_inner))
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WalletRegistry`].
pub struct WalletRegistryBuilder {
    env: Arc<dyn Environment>,
    config: WalletConfig,
    networks: NetworkRegistry,
    kinds: Vec<ProviderKind>,
    client_factory: Option<ClientFactory>,
    extra: Vec<SharedWallet>,
}

impl WalletRegistryBuilder {
    fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            config: WalletConfig::default(),
            networks: NetworkRegistry::default(),
            kinds: ProviderKind::ALL.to_vec(),
            client_factory: None,
            extra: Vec::new(),
        }
    }

    /// Set the wallet configuration.
    #[must_use]
    pub fn config(mut self, config: WalletConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the network table.
    #[must_use]
    pub fn networks(mut self, networks: NetworkRegistry) -> Self {
        self.networks = networks;
        self
    }

    /// Restrict which built-in brands are registered.
    #[must_use]
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = ProviderKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Override how built-in backends build their chain query capability.
    #[must_use]
    pub fn client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = Some(factory);
        self
    }

    /// Register a custom backend, replacing any built-in one of the same kind.
    #[must_use]
    pub fn backend(mut self, backend: SharedWallet) -> Self {
        self.extra.push(backend);
        self
    }

    /// Build the registry.
    #[must_use]
    pub fn build(self) -> WalletRegistry {
        let networks = Arc::new(self.networks);
        let mut backends: Vec<SharedWallet> = Vec::with_capacity(self.kinds.len());

        for kind in self.kinds {
            if backends.iter().any(|backend| backend.kind() == kind) {
                continue;
            }
            let mut wallet = InjectedWallet::new(
                kind.brand(),
                Arc::clone(&self.env),
                Arc::clone(&networks),
                &self.config,
            );
            if let Some(ref factory) = self.client_factory {
                wallet = wallet.with_client_factory(Arc::clone(factory));
            }
            backends.push(Arc::new(wallet));
        }

        for backend in self.extra {
            match backends.iter_mut().find(|b| b.kind() == backend.kind()) {
                Some(slot) => *slot = backend,
                None => backends.push(backend),
            }
        }

        WalletRegistry {
            backends,
            current: Mutex::new(None),
            priority: self.config.priority,
            networks,
        }
    }
}

impl std::fmt::Debug for WalletRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRegistryBuilder")
            .field("config", &self.config)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::ProviderError;
    use crate::events::{EventEmitter, EventKind, WalletEvent};
    use crate::mock::{MockEnvironment, MockProvider};
    use crate::network::{KAIROS_TESTNET, NetworkInfo};
    use crate::provider::ProviderNotification;
    use crate::types::{Account, TransactionRequest, TransactionResult};

    fn ready(provider: MockProvider, address: &str) -> MockProvider {
        provider
            .with_accounts(&[address])
            .with_balance("0x0")
            .with_chain_id(KAIROS_TESTNET)
    }

    fn both_installed() -> Arc<MockEnvironment> {
        Arc::new(
            MockEnvironment::new()
                .with_provider("klaytn", ready(MockProvider::kaikas(), "0xK"))
                .with_provider("ethereum", ready(MockProvider::metamask(), "0xM")),
        )
    }

    #[test]
    fn test_fresh_registry_states() {
        let registry = WalletRegistry::new(both_installed());

        let states = registry.wallet_states();

        assert_eq!(states.len(), 2);
        for (kind, state) in &states {
            assert_eq!(state.provider_kind, *kind);
            assert_eq!(state.status, ConnectionStatus::Disconnected);
            assert!(state.account.is_none());
        }
        assert!(registry.current_wallet().is_none());
    }

    #[test]
    fn test_available_wallets_keep_registration_order() {
        let env = Arc::new(MockEnvironment::new());
        let registry = WalletRegistry::new(env.clone());
        assert!(registry.available_wallets().is_empty());

        env.install("ethereum", Arc::new(MockProvider::metamask()));
        assert_eq!(registry.available_wallets(), vec![ProviderKind::MetaMask]);

        env.install("klaytn", Arc::new(MockProvider::kaikas()));
        assert_eq!(
            registry.available_wallets(),
            vec![ProviderKind::Kaikas, ProviderKind::MetaMask]
        );
    }

    #[test]
    fn test_select_wallet_errors() {
        let env = Arc::new(MockEnvironment::new());
        let registry = WalletRegistry::builder(env)
            .kinds([ProviderKind::Kaikas])
            .build();

        assert_eq!(
            registry.select_wallet(ProviderKind::MetaMask).unwrap_err(),
            WalletError::UnsupportedProvider("metamask".into())
        );
        assert_eq!(
            registry.select_wallet_by_name("brandX").unwrap_err(),
            WalletError::UnsupportedProvider("brandX".into())
        );
        assert_eq!(
            registry.select_wallet(ProviderKind::Kaikas).unwrap_err(),
            WalletError::Unavailable {
                provider: ProviderKind::Kaikas
            }
        );
        assert!(registry.current_wallet().is_none());
    }

    #[test]
    fn test_select_wallet_sets_current() {
        let registry = WalletRegistry::new(both_installed());

        let wallet = assert_ok!(registry.select_wallet_by_name("metamask"));

        assert_eq!(wallet.kind(), ProviderKind::MetaMask);
        assert_eq!(
            registry.current_wallet().map(|w| w.kind()),
            Some(ProviderKind::MetaMask)
        );
    }

    #[tokio::test]
    async fn test_auto_connect_nothing_available() {
        let registry = WalletRegistry::new(Arc::new(MockEnvironment::new()));
        assert!(registry.auto_connect().await.is_none());
    }

    #[tokio::test]
    async fn test_auto_connect_prefers_priority_order() {
        let registry = WalletRegistry::new(both_installed());

        let wallet = registry.auto_connect().await.unwrap();

        assert_eq!(wallet.kind(), ProviderKind::Kaikas);
        assert_eq!(wallet.state().account.unwrap().address, "0xK");
        let states = registry.wallet_states();
        assert_eq!(states[&ProviderKind::MetaMask].status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_auto_connect_falls_back_on_failure() {
        let env = both_installed();
        env.mock("klaytn")
            .unwrap()
            .fail("eth_requestAccounts", ProviderError::user_rejected());
        let registry = WalletRegistry::new(env);

        let wallet = registry.auto_connect().await.unwrap();

        assert_eq!(wallet.kind(), ProviderKind::MetaMask);
        assert!(wallet.state().is_connected());
        assert_eq!(
            registry.current_wallet().map(|w| w.kind()),
            Some(ProviderKind::MetaMask)
        );
        let kaikas = &registry.wallet_states()[&ProviderKind::Kaikas];
        assert_eq!(kaikas.status, ConnectionStatus::Error);
        assert!(kaikas.error.is_some());
    }

    #[tokio::test]
    async fn test_auto_connect_all_fail() {
        let env = both_installed();
        for global in ["klaytn", "ethereum"] {
            env.mock(global)
                .unwrap()
                .fail("eth_requestAccounts", ProviderError::user_rejected());
        }
        let registry = WalletRegistry::new(env);

        assert!(registry.auto_connect().await.is_none());
    }

    #[tokio::test]
    async fn test_auto_connect_respects_configured_priority() {
        let registry = WalletRegistry::builder(both_installed())
            .config(
                WalletConfig::default().priority([ProviderKind::MetaMask, ProviderKind::Kaikas]),
            )
            .build();

        let wallet = registry.auto_connect().await.unwrap();

        assert_eq!(wallet.kind(), ProviderKind::MetaMask);
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let registry = WalletRegistry::new(both_installed());
        for kind in ProviderKind::ALL {
            assert_ok!(registry.select_wallet(kind).unwrap().connect().await);
        }

        registry.disconnect_all();

        for state in registry.wallet_states().values() {
            assert_eq!(state.status, ConnectionStatus::Disconnected);
            assert!(state.account.is_none() && state.network.is_none());
        }
        assert!(registry.current_wallet().is_none());
    }

    #[test]
    fn test_disconnect_all_skips_idle_backends() {
        let registry = WalletRegistry::new(both_installed());
        let metamask = registry.get(ProviderKind::MetaMask).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        metamask.on(EventKind::Disconnect, move |event| {
            let _ = tx.send(event.clone());
        });

        registry.disconnect_all();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notifications_apply_after_auto_connect() {
        let env = both_installed();
        let registry = WalletRegistry::new(env.clone());
        let wallet = registry.auto_connect().await.unwrap();
        assert_eq!(wallet.kind(), ProviderKind::Kaikas);
        let kaikas = env.mock("klaytn").unwrap();

        kaikas.emit(ProviderNotification::ChainChanged("0x2019".into()));
        assert_eq!(wallet.state().network.unwrap().chain_id, 8217);

        kaikas.emit(ProviderNotification::AccountsChanged(Vec::new()));
        let states = registry.wallet_states();
        let state = &states[&ProviderKind::Kaikas];
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.account.is_none() && state.network.is_none());
    }

    #[tokio::test]
    async fn test_listen_refreshes_switched_account() {
        let env = both_installed();
        let registry = Arc::new(WalletRegistry::new(env.clone()));
        let wallet = registry.select_wallet(ProviderKind::MetaMask).unwrap();
        assert_ok!(wallet.connect().await);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        wallet.on(EventKind::AccountsChanged, move |event| {
            let _ = tx.send(event.clone());
        });

        let listener = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.listen().await })
        };
        tokio::task::yield_now().await;
        let metamask = env.mock("ethereum").unwrap();
        metamask.respond("eth_getBalance", serde_json::json!("0x64"));
        metamask.emit(ProviderNotification::AccountsChanged(vec!["0xN".into()]));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(WalletEvent::AccountsChanged(vec!["0xN".into()])));
        assert_eq!(wallet.state().account, Some(Account::new("0xN", "100")));
        listener.abort();
    }

    /// Backend that is always available and connects to a fixed account.
    struct StaticWallet {
        events: EventEmitter,
    }

    #[async_trait]
    impl WalletBackend for StaticWallet {
        fn kind(&self) -> ProviderKind {
            ProviderKind::MetaMask
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn connect(&self) -> Result<Account> {
            Ok(Account::new("0xSTATIC", "7"))
        }

        fn disconnect(&self) {
            self.events.emit(&WalletEvent::Disconnect);
        }

        async fn account(&self) -> Option<Account> {
            None
        }

        async fn network(&self) -> Option<NetworkInfo> {
            None
        }

        async fn balance(&self, _address: Option<&str>) -> Result<String> {
            Err(WalletError::NotConnected)
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> Result<TransactionResult> {
            Err(WalletError::NotConnected)
        }

        async fn sign_message(&self, _message: &str) -> Result<String> {
            Err(WalletError::NotConnected)
        }

        async fn switch_network(&self, chain_id: u64) -> Result<()> {
            Err(WalletError::UnsupportedNetwork(chain_id))
        }

        fn state(&self) -> WalletState {
            WalletState {
                status: ConnectionStatus::Disconnected,
                account: None,
                network: None,
                provider_kind: ProviderKind::MetaMask,
                error: None,
            }
        }

        fn events(&self) -> &EventEmitter {
            &self.events
        }
    }

    #[tokio::test]
    async fn test_custom_backend_replaces_builtin() {
        let registry = WalletRegistry::builder(Arc::new(MockEnvironment::new()))
            .backend(Arc::new(StaticWallet {
                events: EventEmitter::new(),
            }))
            .build();

        assert_eq!(registry.kinds(), vec![ProviderKind::Kaikas, ProviderKind::MetaMask]);
        assert_eq!(registry.available_wallets(), vec![ProviderKind::MetaMask]);

        let wallet = registry.auto_connect().await.unwrap();
        assert_eq!(wallet.kind(), ProviderKind::MetaMask);
        assert_err!(wallet.balance(None).await);
    }
}
