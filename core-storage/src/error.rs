//! Error types for storage operations

use core_accounts::{AccountError, ProviderKind};
use thiserror::Error;

/// Storage operation errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Credential problem (not connected, expired, refresh failed).
    ///
    /// Transparent so account error messages reach federated envelopes
    /// unchanged.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Provider API returned an error status.
    ///
    /// Never retried automatically; callers see the first failure.
    #[error("{provider} API error (status {status}): {message}")]
    ApiError {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// Provider response could not be parsed
    #[error("Failed to parse {provider} response: {detail}")]
    ParseError {
        provider: ProviderKind,
        detail: String,
    },

    /// Caller-supplied arguments were rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] bridge_traits::error::BridgeError),

    /// Anything that does not fit the other variants
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let error = StorageError::ApiError {
            provider: ProviderKind::Dropbox,
            status: 409,
            message: "path/conflict".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Dropbox API error (status 409): path/conflict"
        );
    }

    #[test]
    fn test_account_errors_pass_through_unchanged() {
        let error = StorageError::from(AccountError::NotConnected(ProviderKind::OneDrive));
        assert_eq!(error.to_string(), "OneDrive account not connected");
    }
}
