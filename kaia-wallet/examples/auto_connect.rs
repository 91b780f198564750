//! Auto-connect example against a scripted environment.
//!
//! Kaikas is injected but the user rejects it, so the registry falls back
//! to MetaMask. A chain switch and an account lock follow.
//!
//! ```bash
//! RUST_LOG=kaia_wallet=debug cargo run --example auto_connect
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;

use kaia_wallet::mock::{MockEnvironment, MockProvider};
use kaia_wallet::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let kaikas =
        MockProvider::kaikas().with_accounts(&["0x1111111111111111111111111111111111111111"]);
    kaikas.fail("eth_requestAccounts", ProviderError::user_rejected());

    let metamask = MockProvider::metamask()
        .with_accounts(&["0x2222222222222222222222222222222222222222"])
        .with_balance("0x1bc16d674ec80000")
        .with_chain_id(1001);
    metamask.fail(
        "wallet_switchEthereumChain",
        ProviderError::unrecognized_chain(8217),
    );
    metamask.respond("wallet_addEthereumChain", json!(null));

    let env = Arc::new(
        MockEnvironment::new()
            .with_provider("klaytn", kaikas)
            .with_provider("ethereum", metamask),
    );
    let registry = Arc::new(WalletRegistry::new(env.clone()));
    println!("available: {:?}", registry.available_wallets());

    let listener = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.listen().await })
    };

    let Some(wallet) = registry.auto_connect().await else {
        println!("no wallet could be connected");
        return Ok(());
    };
    wallet.on(EventKind::Disconnect, |_| println!("event: disconnect"));

    println!("connected with {}", wallet.kind());
    println!("balance: {}", wallet.balance(None).await?);

    wallet.switch_network(8217).await?;
    println!("switch to 8217 requested");

    if let Some(provider) = env.mock("ethereum") {
        provider.emit(ProviderNotification::AccountsChanged(Vec::new()));
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    for (kind, state) in registry.wallet_states() {
        println!("{kind}: {}", serde_json::to_string(&state)?);
    }

    listener.abort();
    Ok(())
}
