//! Scriptable fakes of the injected environment.
//!
//! [`MockProvider`] answers JSON-RPC requests from a per-method script and
//! records every request it receives; [`MockEnvironment`] maps global names
//! to providers. Both are useful for exercising backends without a browser.
//!
//! # Example
//!
//! ```rust,ignore
//! let kaikas = MockProvider::kaikas()
//!     .with_accounts(&["0xabc"])
//!     .with_balance("0xde0b6b3a7640000")
//!     .with_chain_id(1001);
//! let env = MockEnvironment::new().with_provider("klaytn", kaikas);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ProviderError;
use crate::network::to_hex_chain_id;
use crate::provider::{
    Environment, InjectedProvider, NotificationKind, NotificationListener, ProviderNotification,
    SharedProvider,
};

type Reply = Result<Value, ProviderError>;

#[derive(Default)]
struct Script {
    once: HashMap<String, VecDeque<Reply>>,
    always: HashMap<String, Reply>,
}

/// A fake injected provider driven by scripted replies.
///
/// Unscripted methods fail with code 4200 (unsupported method).
#[derive(Default)]
pub struct MockProvider {
    flags: Mutex<Vec<String>>,
    script: Mutex<Script>,
    requests: Mutex<Vec<(String, Value)>>,
    listeners: Mutex<Vec<(NotificationKind, NotificationListener)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a provider with no brand markers and no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider carrying the `isKaikas` marker.
    #[must_use]
    pub fn kaikas() -> Self {
        Self::new().with_flag("isKaikas")
    }

    /// A provider carrying the `isMetaMask` marker.
    #[must_use]
    pub fn metamask() -> Self {
        Self::new().with_flag("isMetaMask")
    }

    /// Set a boolean brand marker.
    #[must_use]
    pub fn with_flag(self, flag: &str) -> Self {
        lock(&self.flags).push(flag.to_string());
        self
    }

    /// Script the account list for both `eth_requestAccounts` and `eth_accounts`.
    #[must_use]
    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        self.set_accounts(accounts);
        self
    }

    /// Script the `eth_getBalance` reply (hex quantity).
    #[must_use]
    pub fn with_balance(self, hex_balance: &str) -> Self {
        self.respond("eth_getBalance", json!(hex_balance));
        self
    }

    /// Script the `eth_chainId` reply.
    #[must_use]
    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.respond("eth_chainId", json!(to_hex_chain_id(chain_id)));
        self
    }

    /// Replace the scripted account list.
    pub fn set_accounts(&self, accounts: &[&str]) {
        self.respond("eth_requestAccounts", json!(accounts));
        self.respond("eth_accounts", json!(accounts));
    }

    /// Always answer `method` with `value`.
    pub fn respond(&self, method: &str, value: Value) {
        lock(&self.script).always.insert(method.to_string(), Ok(value));
    }

    /// Answer the next call to `method` with `value`, ahead of the standing reply.
    pub fn respond_once(&self, method: &str, value: Value) {
        lock(&self.script)
            .once
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(value));
    }

    /// Always reject `method` with `error`.
    pub fn fail(&self, method: &str, error: ProviderError) {
        lock(&self.script).always.insert(method.to_string(), Err(error));
    }

    /// Reject the next call to `method` with `error`.
    pub fn fail_once(&self, method: &str, error: ProviderError) {
        lock(&self.script)
            .once
            .entry(method.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, Value)> {
        lock(&self.requests).clone()
    }

    /// Parameters of every request for `method`, in order.
    #[must_use]
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        lock(&self.requests)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of native listeners currently subscribed.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Deliver a native notification to every listener subscribed to its kind.
    pub fn emit(&self, notification: ProviderNotification) {
        let kind = notification.kind();
        let targets: Vec<NotificationListener> = lock(&self.listeners)
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in targets {
            listener(notification.clone());
        }
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("flags", &*lock(&self.flags))
            .field("requests", &lock(&self.requests).len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InjectedProvider for MockProvider {
    fn has_flag(&self, flag: &str) -> bool {
        lock(&self.flags).iter().any(|f| f == flag)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        lock(&self.requests).push((method.to_string(), params));
        let mut script = lock(&self.script);
        if let Some(reply) = script.once.get_mut(method).and_then(VecDeque::pop_front) {
            return reply;
        }
        script.always.get(method).cloned().unwrap_or_else(|| {
            Err(ProviderError::new(
                ProviderError::UNSUPPORTED_METHOD,
                format!("The method \"{method}\" is not supported."),
            ))
        })
    }

    fn on(&self, kind: NotificationKind, listener: NotificationListener) {
        lock(&self.listeners).push((kind, listener));
    }

    fn remove_listener(&self, kind: NotificationKind, listener: &NotificationListener) {
        lock(&self.listeners).retain(|(k, l)| !(*k == kind && Arc::ptr_eq(l, listener)));
    }
}

/// A fake environment holding injected providers by global name.
#[derive(Default)]
pub struct MockEnvironment {
    providers: Mutex<HashMap<String, Arc<MockProvider>>>,
}

impl MockEnvironment {
    /// Create an environment with nothing injected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `provider` under `global`.
    #[must_use]
    pub fn with_provider(self, global: &str, provider: MockProvider) -> Self {
        self.install(global, Arc::new(provider));
        self
    }

    /// Inject a shared provider under `global`, replacing any previous one.
    pub fn install(&self, global: &str, provider: Arc<MockProvider>) {
        lock(&self.providers).insert(global.to_string(), provider);
    }

    /// Remove the provider injected under `global`.
    pub fn uninstall(&self, global: &str) -> Option<Arc<MockProvider>> {
        lock(&self.providers).remove(global)
    }

    /// The concrete mock injected under `global`.
    #[must_use]
    pub fn mock(&self, global: &str) -> Option<Arc<MockProvider>> {
        lock(&self.providers).get(global).cloned()
    }
}

impl std::fmt::Debug for MockEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let globals: Vec<String> = lock(&self.providers).keys().cloned().collect();
        f.debug_struct("MockEnvironment")
            .field("globals", &globals)
            .finish()
    }
}

impl Environment for MockEnvironment {
    fn provider(&self, global: &str) -> Option<SharedProvider> {
        self.mock(global).map(|p| p as SharedProvider)
    }
}
