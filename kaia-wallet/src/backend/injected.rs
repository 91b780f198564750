//! Backend bound to one browser-injected provider object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use super::state::ConnectionState;
use super::{Brand, WalletBackend};
use crate::config::WalletConfig;
use crate::error::{ProviderError, Result, WalletError};
use crate::events::{EventEmitter, WalletEvent};
use crate::network::{NetworkInfo, NetworkRegistry, parse_chain_id};
use crate::provider::chain::{SharedChainClient, parse_accounts};
use crate::provider::{
    Eip1193Client, Environment, NotificationKind, NotificationListener, ProviderNotification,
    SharedProvider, TransactionReceipt,
};
use crate::types::{Account, ProviderKind, TransactionRequest, TransactionResult, WalletState};

/// Builds the chain query capability for a freshly approved provider.
pub type ClientFactory = Arc<dyn Fn(SharedProvider) -> SharedChainClient + Send + Sync>;

/// State reachable from native provider callbacks.
struct Shared {
    brand: &'static Brand,
    networks: Arc<NetworkRegistry>,
    state: Mutex<ConnectionState>,
    session: Mutex<Option<SharedChainClient>>,
    events: EventEmitter,
    /// Latest account list awaiting a balance refresh.
    pending_refresh: Mutex<Option<Vec<String>>>,
    refresh_ready: Notify,
    draining: AtomicBool,
}

impl Shared {
    fn session(&self) -> Option<SharedChainClient> {
        lock(&self.session).clone()
    }

    fn set_session(&self, client: Option<SharedChainClient>) {
        *lock(&self.session) = client;
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ConnectionState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    fn disconnect(&self) {
        self.set_session(None);
        lock(&self.pending_refresh).take();
        self.with_state(ConnectionState::reset);
        info!(provider = %self.brand.kind, "wallet disconnected");
        self.events.emit(&WalletEvent::Disconnect);
    }

    /// Apply a native notification from inside the provider's callback.
    fn apply(&self, notification: ProviderNotification) {
        debug!(provider = %self.brand.kind, ?notification, "provider notification");
        match notification {
            ProviderNotification::AccountsChanged(accounts) if accounts.is_empty() => {
                self.disconnect();
            }
            ProviderNotification::AccountsChanged(accounts) => {
                if self.draining.load(Ordering::Acquire) && self.session().is_some() {
                    *lock(&self.pending_refresh) = Some(accounts);
                    self.refresh_ready.notify_one();
                } else {
                    self.events.emit(&WalletEvent::AccountsChanged(accounts));
                }
            }
            ProviderNotification::ChainChanged(chain_id) => {
                let network = parse_chain_id(&chain_id).and_then(|id| self.networks.resolve(id));
                self.with_state(|state| state.update_network(network));
                self.events.emit(&WalletEvent::ChainChanged(chain_id));
            }
            ProviderNotification::Disconnect => self.disconnect(),
        }
    }

    async fn refresh_account(&self, accounts: Vec<String>) {
        if let Some(client) = self.session() {
            match fetch_account(&client, accounts.first().cloned()).await {
                Ok(account) => {
                    self.with_state(|state| state.update_account(account));
                }
                Err(err) => {
                    warn!(provider = %self.brand.kind, %err, "failed to refresh account");
                }
            }
        }
        self.events.emit(&WalletEvent::AccountsChanged(accounts));
    }
}

/// Marks a running `listen` and discards its unfinished work when dropped.
struct DrainGuard<'a>(&'a Shared);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        lock(&self.0.pending_refresh).take();
        self.0.draining.store(false, Ordering::Release);
    }
}

struct Subscription {
    provider: SharedProvider,
    listener: NotificationListener,
}

impl Subscription {
    fn detach(&self) {
        for kind in NotificationKind::ALL {
            self.provider.remove_listener(kind, &self.listener);
        }
    }
}

/// A [`WalletBackend`] for a brand whose provider is injected into the environment.
///
/// The wallet subscribes to the provider's native notifications on
/// construction when the provider is present, otherwise on the first
/// `connect`, and re-subscribes if the injected object is replaced.
/// Disconnects, locked accounts and chain changes are applied from inside
/// the provider callback. Switching to another account needs a balance
/// query, which [`listen`](WalletBackend::listen) performs; without it the
/// `accountsChanged` event is emitted immediately and the cached account is
/// refreshed by the next [`account`](WalletBackend::account) call.
pub struct InjectedWallet {
    shared: Arc<Shared>,
    env: Arc<dyn Environment>,
    client_factory: ClientFactory,
    listener: NotificationListener,
    subscription: Mutex<Option<Subscription>>,
}

impl InjectedWallet {
    /// Create a wallet for `brand`, resolving networks through `networks`.
    #[must_use]
    pub fn new(
        brand: &'static Brand,
        env: Arc<dyn Environment>,
        networks: Arc<NetworkRegistry>,
        config: &WalletConfig,
    ) -> Self {
        let poll_interval = config.receipt_poll_interval;
        let client_factory: ClientFactory = Arc::new(move |provider: SharedProvider| {
            Arc::new(Eip1193Client::new(provider).with_poll_interval(poll_interval))
                as SharedChainClient
        });

        let shared = Arc::new(Shared {
            brand,
            networks,
            state: Mutex::new(ConnectionState::new(brand.kind)),
            session: Mutex::new(None),
            events: EventEmitter::new(),
            pending_refresh: Mutex::new(None),
            refresh_ready: Notify::new(),
            draining: AtomicBool::new(false),
        });
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let listener: NotificationListener = Arc::new(move |notification: ProviderNotification| {
            if let Some(shared) = weak.upgrade() {
                shared.apply(notification);
            }
        });

        let wallet = Self {
            shared,
            env,
            client_factory,
            listener,
            subscription: Mutex::new(None),
        };
        if let Some(provider) = wallet.provider() {
            wallet.subscribe(&provider);
        }
        wallet
    }

    /// Replace the factory used to build the chain query capability.
    #[must_use]
    pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = factory;
        self
    }

    /// The brand descriptor.
    #[must_use]
    pub fn brand(&self) -> &'static Brand {
        self.shared.brand
    }

    fn provider(&self) -> Option<SharedProvider> {
        find_provider(self.env.as_ref(), self.shared.brand)
    }

    /// Attach the native listener to `provider` unless it is already attached.
    fn subscribe(&self, provider: &SharedProvider) {
        let mut subscription = lock(&self.subscription);
        if subscription
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.provider, provider))
        {
            return;
        }
        if let Some(previous) = subscription.take() {
            previous.detach();
        }
        for kind in NotificationKind::ALL {
            provider.on(kind, Arc::clone(&self.listener));
        }
        debug!(provider = %self.shared.brand.kind, "subscribed to provider notifications");
        *subscription = Some(Subscription {
            provider: Arc::clone(provider),
            listener: Arc::clone(&self.listener),
        });
    }

    async fn handshake(
        &self,
        provider: SharedProvider,
    ) -> Result<(SharedChainClient, Account, Option<NetworkInfo>)> {
        let accounts = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(WalletError::from)
            .and_then(|value| parse_accounts("eth_requestAccounts", value))?;
        let address = accounts.into_iter().next().ok_or(WalletError::NoAccount)?;

        let client = (self.client_factory)(provider);
        let balance = client.balance(&address).await?;
        let chain_id = client.chain_id().await?;
        let network = self.shared.networks.resolve(chain_id);
        if network.is_none() {
            warn!(chain_id, "connected to an unregistered chain");
        }

        Ok((client, Account::new(address, balance.to_string()), network))
    }

    async fn submit(
        client: &SharedChainClient,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt> {
        let signer = client.signer().await?;
        let hash = signer.send_transaction(tx).await?;
        info!(from = signer.address(), hash = %hash, "transaction submitted");
        client.wait_for_receipt(&hash).await
    }

    async fn sign(client: &SharedChainClient, message: &str) -> Result<String> {
        client.signer().await?.sign_message(message).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn find_provider(env: &dyn Environment, brand: &Brand) -> Option<SharedProvider> {
    env.provider(brand.global)
        .filter(|provider| provider.has_flag(brand.marker))
}

async fn fetch_account(client: &SharedChainClient, address: Option<String>) -> Result<Account> {
    let address = match address {
        Some(address) => address,
        None => client
            .list_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(WalletError::NoAccount)?,
    };
    let balance = client.balance(&address).await?;
    Ok(Account::new(address, balance.to_string()))
}

fn add_chain_params(network: &NetworkInfo) -> Value {
    let mut params = json!({
        "chainId": network.hex_chain_id(),
        "chainName": network.name,
        "rpcUrls": [network.rpc_url],
        "nativeCurrency": network.native_currency,
    });
    if let Some(ref explorer) = network.explorer_url {
        params["blockExplorerUrls"] = json!([explorer]);
    }
    params
}

#[async_trait]
impl WalletBackend for InjectedWallet {
    fn kind(&self) -> ProviderKind {
        self.shared.brand.kind
    }

    fn is_available(&self) -> bool {
        self.provider().is_some()
    }

    #[instrument(skip(self), fields(provider = %self.shared.brand.kind))]
    async fn connect(&self) -> Result<Account> {
        let Some(provider) = self.provider() else {
            return Err(WalletError::NotInstalled {
                provider: self.shared.brand.kind,
            });
        };
        self.subscribe(&provider);

        let shared = &self.shared;
        shared.set_session(None);
        shared.with_state(ConnectionState::begin_connect);
        info!("connecting wallet");

        match self.handshake(provider).await {
            Ok((client, account, network)) => {
                shared.set_session(Some(client));
                shared.with_state(|state| state.connected(account.clone(), network));
                info!(address = %account.address, "wallet connected");
                shared.events.emit(&WalletEvent::Connect(account.clone()));
                Ok(account)
            }
            Err(err) => {
                shared.with_state(|state| state.fail(err.to_string()));
                warn!(%err, "wallet connection failed");
                shared.events.emit(&WalletEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn disconnect(&self) {
        self.shared.disconnect();
    }

    async fn account(&self) -> Option<Account> {
        let client = self.shared.session()?;
        match fetch_account(&client, None).await {
            Ok(account) => {
                self.shared
                    .with_state(|state| state.update_account(account.clone()));
                Some(account)
            }
            Err(err) => {
                debug!(provider = %self.shared.brand.kind, %err, "account query failed");
                None
            }
        }
    }

    async fn network(&self) -> Option<NetworkInfo> {
        let client = self.shared.session()?;
        let chain_id = match client.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(err) => {
                debug!(provider = %self.shared.brand.kind, %err, "network query failed");
                return None;
            }
        };
        let network = self.shared.networks.resolve(chain_id);
        self.shared
            .with_state(|state| state.update_network(network.clone()));
        network
    }

    async fn balance(&self, address: Option<&str>) -> Result<String> {
        let client = self.shared.session().ok_or(WalletError::NotConnected)?;
        let account = fetch_account(&client, address.map(str::to_string)).await?;
        Ok(account.balance)
    }

    #[instrument(skip(self, tx), fields(provider = %self.shared.brand.kind, to = %tx.to))]
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TransactionResult> {
        let client = self.shared.session().ok_or(WalletError::NotConnected)?;
        let receipt = Self::submit(&client, &tx)
            .await
            .map_err(WalletError::into_transaction_failure)?;
        info!(
            hash = %receipt.hash,
            block_number = receipt.block_number,
            "transaction mined",
        );
        Ok(TransactionResult {
            hash: receipt.hash,
            block_number: Some(receipt.block_number),
            gas_used: Some(receipt.gas_used.to_string()),
        })
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let client = self.shared.session().ok_or(WalletError::NotConnected)?;
        Self::sign(&client, message)
            .await
            .map_err(WalletError::into_signing_failure)
    }

    #[instrument(skip(self), fields(provider = %self.shared.brand.kind))]
    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        let network = self
            .shared
            .networks
            .resolve(chain_id)
            .ok_or(WalletError::UnsupportedNetwork(chain_id))?;
        let provider = self.provider().ok_or(WalletError::NotInstalled {
            provider: self.shared.brand.kind,
        })?;

        let switch = provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": network.hex_chain_id() }]),
            )
            .await;
        match switch {
            Ok(_) => {}
            Err(err) if err.code == ProviderError::UNRECOGNIZED_CHAIN => {
                info!("chain unknown to wallet, adding it");
                provider
                    .request("wallet_addEthereumChain", json!([add_chain_params(&network)]))
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        info!(network = %network.name, "network switch requested");
        Ok(())
    }

    fn state(&self) -> WalletState {
        lock(&self.shared.state).snapshot()
    }

    fn events(&self) -> &EventEmitter {
        &self.shared.events
    }

    async fn listen(&self) {
        let shared = self.shared.as_ref();
        if shared.draining.swap(true, Ordering::AcqRel) {
            debug!(provider = %shared.brand.kind, "account refresh already driven elsewhere");
            return;
        }
        let _guard = DrainGuard(shared);
        loop {
            shared.refresh_ready.notified().await;
            let pending = lock(&shared.pending_refresh).take();
            if let Some(accounts) = pending {
                shared.refresh_account(accounts).await;
            }
        }
    }
}

impl Drop for InjectedWallet {
    fn drop(&mut self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.detach();
        }
    }
}

impl std::fmt::Debug for InjectedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedWallet")
            .field("brand", &self.shared.brand.name)
            .field("state", &*lock(&self.shared.state))
            .field("events", &self.shared.events)
            .finish_non_exhaustive()
    }
}
