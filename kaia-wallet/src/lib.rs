#![cfg_attr(docsrs, feature(doc_cfg))]
//! Kaia Wallet is one connection interface over browser-injected wallet providers.
//!
//! A [`WalletRegistry`](registry::WalletRegistry) owns one
//! [`WalletBackend`](backend::WalletBackend) per wallet brand (Kaikas and
//! MetaMask), reports which ones the environment provides, resolves
//! auto-connect priority, and snapshots every backend's connection state.
//! Each backend runs the same lifecycle, `disconnected → connecting →
//! connected | error`, and re-emits the provider's native events in a
//! normalized form.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod mock;
pub mod network;
pub mod prelude;
pub mod provider;
pub mod registry;
pub mod types;

pub use error::{ProviderError, Result, WalletError};
