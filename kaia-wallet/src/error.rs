//! Unified error types for wallet operations.
//!
//! This module provides the error hierarchy shared by every backend:
//! - Lifecycle errors (provider missing, not connected, no account)
//! - Registry errors (unknown or unavailable provider kind)
//! - Passthrough errors raised by the injected provider itself

use serde_json::Value;

use crate::types::ProviderKind;

/// Result type alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

/// The main error type for wallet operations.
///
/// `WalletError` is `Clone` because the same failure is both returned to the
/// caller and delivered to `error` event listeners.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// The brand-specific provider object is not injected in this environment.
    #[error("{provider} is not installed")]
    NotInstalled {
        /// The provider kind that was requested.
        provider: ProviderKind,
    },

    /// The backend is registered but its provider is not available right now.
    #[error("{provider} is not available")]
    Unavailable {
        /// The provider kind that was requested.
        provider: ProviderKind,
    },

    /// No backend is registered for the requested provider kind.
    #[error("unsupported wallet provider: {0}")]
    UnsupportedProvider(String),

    /// The active session exposes no accounts.
    #[error("no account available")]
    NoAccount,

    /// The operation requires an active session.
    #[error("wallet is not connected")]
    NotConnected,

    /// The chain id is not present in the network registry.
    #[error("unsupported network: chain id {0}")]
    UnsupportedNetwork(u64),

    /// Submitting or mining a transaction failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Signing a message failed.
    #[error("message signing failed: {0}")]
    SigningFailed(String),

    /// Rejection raised by the injected provider, passed through unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider answered with a result of unexpected shape.
    #[error("invalid provider response for {method}: {message}")]
    InvalidResponse {
        /// The JSON-RPC method that produced the response.
        method: String,
        /// What was wrong with the response.
        message: String,
    },

    /// Transaction parameters could not be encoded for the provider.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl WalletError {
    /// Create an [`InvalidResponse`](Self::InvalidResponse) error.
    #[must_use]
    pub fn invalid_response(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Wrap this error as a [`TransactionFailed`](Self::TransactionFailed) error.
    ///
    /// Errors that already are transaction failures are returned as is.
    #[must_use]
    pub fn into_transaction_failure(self) -> Self {
        match self {
            Self::TransactionFailed(_) => self,
            Self::Provider(err) => Self::TransactionFailed(err.message),
            other => Self::TransactionFailed(other.to_string()),
        }
    }

    /// Wrap this error as a [`SigningFailed`](Self::SigningFailed) error.
    #[must_use]
    pub fn into_signing_failure(self) -> Self {
        match self {
            Self::SigningFailed(_) => self,
            Self::Provider(err) => Self::SigningFailed(err.message),
            other => Self::SigningFailed(other.to_string()),
        }
    }

    /// Returns the provider error code if this is a passthrough provider error.
    #[must_use]
    pub const fn provider_code(&self) -> Option<i64> {
        match self {
            Self::Provider(err) => Some(err.code),
            _ => None,
        }
    }
}

/// A JSON-RPC rejection raised by an injected provider (EIP-1193 `ProviderRpcError`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    pub data: Option<Value>,
}

impl ProviderError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested method or account has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the requested method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The provider is not connected to the requested chain.
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// The provider does not know the requested chain.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// Generic JSON-RPC internal error.
    pub const INTERNAL: i64 = -32603;

    /// Create a provider error with a code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Shorthand for a user rejection (code 4001).
    #[must_use]
    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    /// Shorthand for an unrecognized chain (code 4902).
    #[must_use]
    pub fn unrecognized_chain(chain_id: u64) -> Self {
        Self::new(
            Self::UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID {chain_id:#x}."),
        )
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns `true` if the user declined the request.
    #[must_use]
    pub const fn is_user_rejection(&self) -> bool {
        self.code == Self::USER_REJECTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_passthrough_display() {
        let err: WalletError = ProviderError::user_rejected().into();
        assert_eq!(err.to_string(), "provider error 4001: User rejected the request.");
        assert_eq!(err.provider_code(), Some(ProviderError::USER_REJECTED));
    }

    #[test]
    fn test_transaction_failure_keeps_underlying_message() {
        let err = WalletError::from(ProviderError::new(-32000, "insufficient funds"))
            .into_transaction_failure();
        assert_eq!(err, WalletError::TransactionFailed("insufficient funds".into()));

        let again = err.clone().into_transaction_failure();
        assert_eq!(again, err);
    }

    #[test]
    fn test_signing_failure_wraps_other_errors() {
        let err = WalletError::NoAccount.into_signing_failure();
        assert_eq!(err, WalletError::SigningFailed("no account available".into()));
    }

    #[test]
    fn test_not_installed_names_provider() {
        let err = WalletError::NotInstalled {
            provider: ProviderKind::Kaikas,
        };
        assert_eq!(err.to_string(), "kaikas is not installed");
    }
}
