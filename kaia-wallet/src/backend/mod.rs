//! Wallet backends: one polymorphic unit per wallet brand.
//!
//! Every backend implements [`WalletBackend`]. The built-in brands share a
//! single implementation, [`InjectedWallet`], parameterized by a static
//! [`Brand`] descriptor naming the injected global and its marker flag.
//!
//! # Architecture
//!
//! ```text
//! WalletBackend (trait)
//!   └── InjectedWallet { brand, env, networks, state, session, events }
//!         ├── connect()        → eth_requestAccounts, balance, chain id
//!         ├── send_transaction → signer → receipt
//!         ├── switch_network   → wallet_switchEthereumChain / wallet_addEthereumChain
//!         └── listen()         → account refresh after native accountsChanged
//! ```

mod injected;
pub mod state;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::{EventEmitter, EventKind, ListenerId, WalletEvent};
use crate::network::NetworkInfo;
use crate::types::{Account, ProviderKind, TransactionRequest, TransactionResult, WalletState};

pub use injected::{ClientFactory, InjectedWallet};
pub use state::ConnectionState;

/// Static description of a wallet brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brand {
    /// Provider kind served by this brand.
    pub kind: ProviderKind,
    /// Global name the provider object is injected under.
    pub global: &'static str,
    /// Boolean marker the provider object must carry.
    pub marker: &'static str,
    /// Display name.
    pub name: &'static str,
}

/// Kaikas injects `window.klaytn` with `isKaikas`.
pub const KAIKAS: Brand = Brand {
    kind: ProviderKind::Kaikas,
    global: "klaytn",
    marker: "isKaikas",
    name: "Kaikas",
};

/// MetaMask injects `window.ethereum` with `isMetaMask`.
pub const METAMASK: Brand = Brand {
    kind: ProviderKind::MetaMask,
    global: "ethereum",
    marker: "isMetaMask",
    name: "MetaMask",
};

impl ProviderKind {
    /// The static brand descriptor for this kind.
    #[must_use]
    pub const fn brand(self) -> &'static Brand {
        match self {
            Self::Kaikas => &KAIKAS,
            Self::MetaMask => &METAMASK,
        }
    }
}

/// The connection and transaction interface shared by every wallet brand.
///
/// Query operations ([`account`](Self::account), [`network`](Self::network))
/// degrade to `None`. Lifecycle and mutating operations return errors; only
/// [`connect`](Self::connect) also moves the backend into the `Error` state.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Which brand this backend serves.
    fn kind(&self) -> ProviderKind;

    /// Whether the brand's provider object is injected and marked. Never fails.
    fn is_available(&self) -> bool;

    /// Request account access and open a session.
    ///
    /// # Errors
    ///
    /// `NotInstalled` when unavailable; otherwise any provider or query
    /// failure, which is also recorded in the state and emitted as `error`.
    async fn connect(&self) -> Result<Account>;

    /// Tear down the session. Always succeeds and always emits `disconnect`.
    fn disconnect(&self);

    /// Re-query the active account and its balance.
    async fn account(&self) -> Option<Account>;

    /// Re-query the active chain and resolve it.
    async fn network(&self) -> Option<NetworkInfo>;

    /// Balance of `address`, or of the active account, in the smallest unit.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a session, `NoAccount` when the session has no
    /// accounts, or the underlying query failure.
    async fn balance(&self, address: Option<&str>) -> Result<String>;

    /// Submit a transaction and wait until it is mined.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a session; every other failure is reported
    /// as `TransactionFailed`.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TransactionResult>;

    /// Sign a UTF-8 message with the active account.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a session; every other failure is reported
    /// as `SigningFailed`.
    async fn sign_message(&self, message: &str) -> Result<String>;

    /// Ask the wallet to switch to `chain_id`, adding the chain if unknown to it.
    ///
    /// # Errors
    ///
    /// `UnsupportedNetwork` before any provider call when the chain is not
    /// registered; provider rejections pass through unchanged.
    async fn switch_network(&self, chain_id: u64) -> Result<()>;

    /// Synchronous snapshot of the cached state.
    fn state(&self) -> WalletState;

    /// The backend's observer list.
    fn events(&self) -> &EventEmitter;

    /// Refresh the cached account after the provider switches accounts.
    ///
    /// Disconnects and chain changes apply without it. Runs until the
    /// future is dropped, and returns immediately when another `listen` is
    /// already running or the backend has nothing to refresh. Spawn it on
    /// the host executor.
    async fn listen(&self) {}
}

impl dyn WalletBackend {
    /// Subscribe to a normalized event.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.events().on(kind, listener)
    }

    /// Unsubscribe a listener. Returns `false` if it was not subscribed.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.events().off(kind, id)
    }
}

impl std::fmt::Debug for dyn WalletBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletBackend")
            .field("kind", &self.kind())
            .field("status", &self.state().status)
            .finish()
    }
}

/// A shared, type-erased wallet backend.
pub type SharedWallet = Arc<dyn WalletBackend>;
