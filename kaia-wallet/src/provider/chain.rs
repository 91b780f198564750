//! Chain query capability.
//!
//! [`ChainClient`] is the narrow interface a backend uses once a session is
//! open: list accounts, read the active chain, read balances, obtain a
//! [`TransactionSigner`], and wait for receipts.
//!
//! [`Eip1193Client`] implements it by speaking standard `eth_*` JSON-RPC
//! through the injected provider itself, which is how browser wallets
//! expose chain access.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{U256, hex};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::SharedProvider;
use crate::error::{Result, WalletError};
use crate::network::parse_chain_id;
use crate::types::TransactionRequest;

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub hash: String,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Gas consumed.
    pub gas_used: U256,
}

/// Signs and submits on behalf of one account.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The signing account address.
    fn address(&self) -> &str;

    /// Submit a transaction and return its hash without waiting for mining.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String>;

    /// Sign a UTF-8 message (EIP-191 `personal_sign`) and return the hex signature.
    async fn sign_message(&self, message: &str) -> Result<String>;
}

/// Chain queries available during a session.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Accounts the session has access to; first is the active one.
    async fn list_accounts(&self) -> Result<Vec<String>>;

    /// The active chain id.
    async fn chain_id(&self) -> Result<u64>;

    /// Balance of `address` in the smallest unit.
    async fn balance(&self, address: &str) -> Result<U256>;

    /// A signer for the active account.
    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>>;

    /// Resolve once `hash` is mined. No timeout is imposed.
    async fn wait_for_receipt(&self, hash: &str) -> Result<TransactionReceipt>;
}

/// A shared, type-erased chain client.
pub type SharedChainClient = Arc<dyn ChainClient>;

/// [`ChainClient`] backed by an injected provider's JSON-RPC interface.
#[derive(Clone)]
pub struct Eip1193Client {
    provider: SharedProvider,
    poll_interval: Duration,
}

impl Eip1193Client {
    /// Default receipt polling period.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Create a client over `provider`.
    #[must_use]
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the receipt polling period.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        Ok(self.provider.request(method, params).await?)
    }
}

impl std::fmt::Debug for Eip1193Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eip1193Client")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainClient for Eip1193Client {
    async fn list_accounts(&self) -> Result<Vec<String>> {
        let value = self.call("eth_accounts", json!([])).await?;
        parse_accounts("eth_accounts", value)
    }

    async fn chain_id(&self) -> Result<u64> {
        let value = self.call("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_chain_id)
            .ok_or_else(|| WalletError::invalid_response("eth_chainId", format!("{value}")))
    }

    async fn balance(&self, address: &str) -> Result<U256> {
        let value = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity("eth_getBalance", &value)
    }

    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>> {
        let address = self
            .list_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(WalletError::NoAccount)?;
        Ok(Arc::new(Eip1193Signer {
            provider: Arc::clone(&self.provider),
            address,
        }))
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<TransactionReceipt> {
        loop {
            let value = self.call("eth_getTransactionReceipt", json!([hash])).await?;
            if value.is_null() {
                debug!(hash, "transaction pending");
                futures_timer::Delay::new(self.poll_interval).await;
                continue;
            }
            return parse_receipt(hash, &value);
        }
    }
}

/// [`TransactionSigner`] that delegates signing to the injected provider.
#[derive(Clone)]
pub struct Eip1193Signer {
    provider: SharedProvider,
    address: String,
}

impl std::fmt::Debug for Eip1193Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eip1193Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionSigner for Eip1193Signer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let params = encode_transaction(&self.address, tx)?;
        let value = self
            .provider
            .request("eth_sendTransaction", json!([params]))
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::invalid_response("eth_sendTransaction", format!("{value}")))
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let payload = hex::encode_prefixed(message.as_bytes());
        let value = self
            .provider
            .request("personal_sign", json!([payload, self.address]))
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::invalid_response("personal_sign", format!("{value}")))
    }
}

/// Parse a JSON array of address strings.
pub(crate) fn parse_accounts(method: &str, value: Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(WalletError::invalid_response(method, "expected an array of accounts"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(address) => Ok(address),
            other => Err(WalletError::invalid_response(
                method,
                format!("expected an address string, got {other}"),
            )),
        })
        .collect()
}

/// Parse a hex (or decimal) quantity.
fn parse_quantity(method: &str, value: &Value) -> Result<U256> {
    value
        .as_str()
        .and_then(|raw| raw.parse::<U256>().ok())
        .ok_or_else(|| WalletError::invalid_response(method, format!("invalid quantity {value}")))
}

/// Re-encode a decimal amount as a hex quantity.
fn hex_quantity(field: &str, amount: &str) -> Result<String> {
    let amount = amount
        .parse::<U256>()
        .map_err(|e| WalletError::InvalidRequest(format!("invalid {field} '{amount}': {e}")))?;
    Ok(format!("0x{amount:x}"))
}

fn encode_transaction(from: &str, tx: &TransactionRequest) -> Result<Value> {
    let mut params = Map::new();
    params.insert("from".into(), json!(from));
    params.insert("to".into(), json!(tx.to));
    if let Some(ref value) = tx.value {
        params.insert("value".into(), json!(hex_quantity("value", value)?));
    }
    if let Some(ref data) = tx.data {
        params.insert("data".into(), json!(data));
    }
    if let Some(gas) = tx.gas_limit {
        params.insert("gas".into(), json!(format!("{gas:#x}")));
    }
    if let Some(ref price) = tx.gas_price {
        params.insert("gasPrice".into(), json!(hex_quantity("gasPrice", price)?));
    }
    Ok(Value::Object(params))
}

fn parse_receipt(hash: &str, value: &Value) -> Result<TransactionReceipt> {
    const METHOD: &str = "eth_getTransactionReceipt";

    if value.get("status").and_then(Value::as_str) == Some("0x0") {
        return Err(WalletError::TransactionFailed(format!(
            "transaction {hash} reverted"
        )));
    }
    let block_number = value
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(parse_chain_id)
        .ok_or_else(|| WalletError::invalid_response(METHOD, "missing blockNumber"))?;
    let gas_used = parse_quantity(METHOD, value.get("gasUsed").unwrap_or(&Value::Null))?;
    let hash = value
        .get("transactionHash")
        .and_then(Value::as_str)
        .unwrap_or(hash)
        .to_string();

    Ok(TransactionReceipt {
        hash,
        block_number,
        gas_used,
    })
}
