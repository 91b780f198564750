//! Capabilities consumed from the execution environment.
//!
//! The crate never touches browser globals directly. Instead:
//!
//! - [`Environment`] answers "is there an injected object named `klaytn`?"
//! - [`InjectedProvider`] is that object: EIP-1193 style `request` plus
//!   native `on` / `removeListener` notifications
//! - [`ChainClient`](chain::ChainClient) is the chain query capability
//!   (accounts, network, balance, signer) built on top of a provider
//!
//! Hosts implement these traits over whatever exposes the injected objects;
//! tests substitute [`crate::mock`].

pub mod chain;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

pub use chain::{ChainClient, Eip1193Client, TransactionReceipt, TransactionSigner};

/// Native notifications an injected provider can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderNotification {
    /// `accountsChanged` with the new account list (empty when locked).
    AccountsChanged(Vec<String>),
    /// `chainChanged` with the hex chain id.
    ChainChanged(String),
    /// `disconnect`.
    Disconnect,
}

impl ProviderNotification {
    /// The native event name this notification is delivered under.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::AccountsChanged(_) => NotificationKind::AccountsChanged,
            Self::ChainChanged(_) => NotificationKind::ChainChanged,
            Self::Disconnect => NotificationKind::Disconnect,
        }
    }
}

/// Native event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// `accountsChanged`
    AccountsChanged,
    /// `chainChanged`
    ChainChanged,
    /// `disconnect`
    Disconnect,
}

impl NotificationKind {
    /// All native events a backend subscribes to.
    pub const ALL: [Self; 3] = [Self::AccountsChanged, Self::ChainChanged, Self::Disconnect];

    /// The event name as used by injected providers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Callback registered with [`InjectedProvider::on`].
///
/// Identity is by pointer, mirroring `removeListener(fn)`.
pub type NotificationListener = Arc<dyn Fn(ProviderNotification) + Send + Sync>;

/// A provider object injected into the environment by a wallet extension.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// Read a boolean brand marker such as `isKaikas` or `isMetaMask`.
    fn has_flag(&self, flag: &str) -> bool;

    /// Issue a JSON-RPC style request. May suspend awaiting user approval.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to a native notification.
    fn on(&self, kind: NotificationKind, listener: NotificationListener);

    /// Remove a listener previously passed to [`on`](Self::on).
    fn remove_listener(&self, kind: NotificationKind, listener: &NotificationListener);
}

/// A shared, type-erased injected provider.
pub type SharedProvider = Arc<dyn InjectedProvider>;

/// Lookup of injected provider objects by global name.
pub trait Environment: Send + Sync {
    /// The object injected under `global` (e.g. `"klaytn"`), if any.
    fn provider(&self, global: &str) -> Option<SharedProvider>;
}

/// An environment with no injected providers, such as a server process.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn provider(&self, _global: &str) -> Option<SharedProvider> {
        None
    }
}
