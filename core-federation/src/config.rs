//! Federation configuration
//!
//! OAuth client credentials for the refresh-capable providers. OneDrive
//! takes no entry here because its access tokens are never refreshed; a
//! provider left unconfigured still serves API calls until one of its
//! tokens goes stale, at which point the missing credentials surface as a
//! refresh failure.

use core_accounts::{ProviderKind, ProviderOAuthConfig};
use core_runtime::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// OAuth client credentials per provider.
///
/// # Example
///
/// ```
/// use core_federation::FederationConfig;
///
/// let config = FederationConfig::builder()
///     .dropbox("app-key", "app-secret")
///     .google_drive("client-id", "client-secret")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.to_oauth_configs().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FederationConfig {
    dropbox: Option<ClientCredentials>,
    google_drive: Option<ClientCredentials>,
}

#[derive(Clone)]
struct ClientCredentials {
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl FederationConfig {
    /// Start building a configuration
    pub fn builder() -> FederationConfigBuilder {
        FederationConfigBuilder::default()
    }

    /// The per-provider OAuth configurations the token lifecycle consumes
    pub fn to_oauth_configs(&self) -> HashMap<ProviderKind, ProviderOAuthConfig> {
        let mut configs = HashMap::new();
        if let Some(ref creds) = self.dropbox {
            configs.insert(
                ProviderKind::Dropbox,
                ProviderOAuthConfig::dropbox(creds.client_id.clone(), creds.client_secret.clone()),
            );
        }
        if let Some(ref creds) = self.google_drive {
            configs.insert(
                ProviderKind::GoogleDrive,
                ProviderOAuthConfig::google_drive(
                    creds.client_id.clone(),
                    creds.client_secret.clone(),
                ),
            );
        }
        configs
    }
}

/// Builder for [`FederationConfig`]
#[derive(Default)]
pub struct FederationConfigBuilder {
    dropbox: Option<(String, String)>,
    google_drive: Option<(String, String)>,
}

impl FederationConfigBuilder {
    /// Enable Dropbox token refresh with an app key and secret
    pub fn dropbox(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.dropbox = Some((client_id.into(), client_secret.into()));
        self
    }

    /// Enable Google Drive token refresh with OAuth client credentials
    pub fn google_drive(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.google_drive = Some((client_id.into(), client_secret.into()));
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when an enabled provider carries an empty client id
    /// or secret.
    pub fn build(self) -> Result<FederationConfig> {
        Ok(FederationConfig {
            dropbox: self
                .dropbox
                .map(|creds| Self::validated("Dropbox", creds))
                .transpose()?,
            google_drive: self
                .google_drive
                .map(|creds| Self::validated("Google Drive", creds))
                .transpose()?,
        })
    }

    fn validated(
        provider: &str,
        (client_id, client_secret): (String, String),
    ) -> Result<ClientCredentials> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} OAuth credentials must not be empty",
                provider
            )));
        }
        Ok(ClientCredentials {
            client_id,
            client_secret,
        })
    }
}
