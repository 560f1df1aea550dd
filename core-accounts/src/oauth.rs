//! OAuth 2.0 token refresh
//!
//! Only the refresh leg of OAuth lives in the core: interactive consent
//! happens in the embedding application, which then persists the issued
//! tokens through [`TokenLifecycle`](crate::lifecycle::TokenLifecycle).
//! This module knows each provider's token endpoint and how to exchange a
//! refresh token for a new access token.
//!
//! A refresh is a single `POST` with a form-encoded body. It is never
//! retried here; a failed refresh surfaces immediately so callers can report
//! the account as expired rather than mask the problem.

use crate::error::{AccountError, Result};
use crate::types::ProviderKind;

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Per-request timeout for token endpoint calls.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint configuration for one provider.
///
/// # Examples
///
/// ```
/// use core_accounts::ProviderOAuthConfig;
///
/// let config = ProviderOAuthConfig::dropbox("app-key", "app-secret");
/// assert_eq!(config.token_url, "https://api.dropbox.com/oauth2/token");
/// ```
#[derive(Clone)]
pub struct ProviderOAuthConfig {
    /// The provider this endpoint belongs to
    pub provider: ProviderKind,
    /// OAuth client identifier
    pub client_id: String,
    /// OAuth client secret, when the provider requires one
    pub client_secret: Option<String>,
    /// The token endpoint URL
    pub token_url: String,
    /// Token lifetime assumed when the response omits `expires_in`
    pub default_expires_in: i64,
}

impl ProviderOAuthConfig {
    /// Dropbox token endpoint.
    ///
    /// Dropbox access tokens default to a four hour lifetime.
    pub fn dropbox(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Dropbox,
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            token_url: "https://api.dropbox.com/oauth2/token".to_string(),
            default_expires_in: 14400,
        }
    }

    /// Google token endpoint.
    pub fn google_drive(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::GoogleDrive,
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            default_expires_in: 3600,
        }
    }
}

impl fmt::Debug for ProviderOAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("default_expires_in", &self.default_expires_in)
            .finish()
    }
}

/// Tokens produced by a successful refresh.
#[derive(Clone)]
pub struct RefreshedTokens {
    /// The new access token
    pub access_token: String,
    /// The refresh token to keep using. Providers that rotate refresh
    /// tokens return a new one; otherwise the token that was presented is
    /// carried forward.
    pub refresh_token: Option<String>,
    /// When the new access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Wire format of the token endpoint response.
#[derive(Debug, Serialize, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

/// Client for the provider token endpoints.
///
/// Stateless apart from the injected HTTP client; the per-provider endpoint
/// configuration is passed into each call.
///
/// # Example
///
/// ```ignore
/// use core_accounts::{ProviderOAuthConfig, TokenRefreshClient};
/// use std::sync::Arc;
///
/// # async fn example(http_client: Arc<dyn bridge_traits::HttpClient>) -> core_accounts::Result<()> {
/// let refresh = TokenRefreshClient::new(http_client);
/// let config = ProviderOAuthConfig::google_drive("client-id", "client-secret");
///
/// let tokens = refresh.refresh(&config, "stored-refresh-token").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenRefreshClient {
    http_client: Arc<dyn HttpClient>,
}

impl TokenRefreshClient {
    /// Create a new refresh client
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Performs exactly one `POST` against the provider's token endpoint.
    ///
    /// # Errors
    ///
    /// - [`AccountError::TokenRefresh`] when the endpoint answers with a
    ///   non-2xx status
    /// - [`AccountError::InvalidResponse`] when the 2xx body does not parse
    /// - [`AccountError::Http`] on transport failure
    #[instrument(skip(self, refresh_token), fields(provider = %config.provider.as_str()))]
    pub async fn refresh(
        &self,
        config: &ProviderOAuthConfig,
        refresh_token: &str,
    ) -> Result<RefreshedTokens> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &config.client_id);

        if let Some(ref client_secret) = config.client_secret {
            params.insert("client_secret", client_secret);
        }

        debug!("Refreshing access token");

        let encoded_body = serde_urlencoded::to_string(&params)
            .map_err(|e| AccountError::Config(format!("Failed to encode token request: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded_body))
            .timeout(REFRESH_TIMEOUT);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(
                status = status,
                error = %error_body,
                "Token refresh rejected by provider"
            );

            return Err(AccountError::TokenRefresh {
                provider: config.provider,
                status,
                body: error_body,
            });
        }

        let token_response: TokenResponse =
            response.json().map_err(|e| AccountError::InvalidResponse {
                provider: config.provider,
                detail: format!("Failed to parse token response: {}", e),
            })?;

        let expires_in = token_response
            .expires_in
            .unwrap_or(config.default_expires_in);

        info!(expires_in = expires_in, "Token refreshed");

        Ok(RefreshedTokens {
            access_token: token_response.access_token,
            refresh_token: token_response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        })
    }
}
