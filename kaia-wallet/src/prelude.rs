//! Commonly used types, re-exported for glob import.

pub use crate::backend::{InjectedWallet, SharedWallet, WalletBackend};
pub use crate::config::WalletConfig;
pub use crate::error::{ProviderError, Result, WalletError};
pub use crate::events::{EventKind, ListenerId, WalletEvent};
pub use crate::network::{NetworkInfo, NetworkRegistry};
pub use crate::provider::{Environment, InjectedProvider, ProviderNotification};
pub use crate::registry::WalletRegistry;
pub use crate::types::{
    Account, ConnectionStatus, ProviderKind, TransactionRequest, TransactionResult, WalletState,
};
