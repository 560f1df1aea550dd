use crate::types::ProviderKind;
use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{} account not connected", .0.display_name())]
    NotConnected(ProviderKind),

    #[error("{provider} token expired: {reason}")]
    AuthExpired {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Token refresh failed for {provider}: HTTP {status}: {body}")]
    TokenRefresh {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {provider}: {detail}")]
    InvalidResponse {
        provider: ProviderKind,
        detail: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, AccountError>;
