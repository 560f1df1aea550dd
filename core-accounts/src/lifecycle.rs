//! Token lifecycle management
//!
//! [`TokenLifecycle`] is the gate every provider call goes through to obtain
//! usable credentials. It loads the stored account, decides whether the
//! access token is still current, refreshes it when the provider allows,
//! and persists the result.
//!
//! ## Refresh rules
//!
//! - A token counts as current only when its recorded expiry lies strictly
//!   in the future; an unknown expiry counts as stale
//! - A current token is returned as-is, with no network traffic
//! - Stale tokens are refreshed when the provider supports it and a refresh
//!   token is on file; otherwise the caller gets
//!   [`AccountError::AuthExpired`] and the user must reconnect
//! - Refreshes are single-flight per `(user, provider)`: concurrent callers
//!   queue on a per-account lock and re-read the store once they hold it,
//!   so one stale account produces exactly one token endpoint call

use crate::error::{AccountError, Result};
use crate::oauth::{ProviderOAuthConfig, TokenRefreshClient};
use crate::store::CredentialStore;
use crate::types::{ExternalAccount, NewAccount, ProviderKind, UserId};

use bridge_traits::http::HttpClient;
use core_runtime::events::{AccountEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Coordinates credential storage and token refresh for connected accounts.
///
/// Providers call [`ensure_valid`](TokenLifecycle::ensure_valid) before each
/// API request and use the returned account's access token. The lifecycle
/// never initiates OAuth consent flows; tokens enter the system through
/// [`connect_account`](TokenLifecycle::connect_account).
pub struct TokenLifecycle {
    /// Credential persistence
    store: Arc<dyn CredentialStore>,
    /// Token endpoint client
    refresh_client: TokenRefreshClient,
    /// OAuth configuration per refresh-capable provider
    configs: HashMap<ProviderKind, ProviderOAuthConfig>,
    /// Event bus for emitting account events
    event_bus: EventBus,
    /// Refresh locks to prevent concurrent refreshes per account
    refresh_locks: Arc<Mutex<HashMap<(UserId, ProviderKind), Arc<Mutex<()>>>>>,
}

impl TokenLifecycle {
    /// Creates a new token lifecycle.
    ///
    /// # Arguments
    ///
    /// * `store` - Credential store holding connected accounts
    /// * `http_client` - Host-provided HTTP client for token endpoint calls
    /// * `configs` - OAuth configuration per provider; providers without an
    ///   entry cannot refresh and surface [`AccountError::Config`] if they try
    /// * `event_bus` - Event bus for emitting account events
    pub fn new(
        store: Arc<dyn CredentialStore>,
        http_client: Arc<dyn HttpClient>,
        configs: HashMap<ProviderKind, ProviderOAuthConfig>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            refresh_client: TokenRefreshClient::new(http_client),
            configs,
            event_bus,
            refresh_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns an account whose access token is safe to use right now.
    ///
    /// # Errors
    ///
    /// - [`AccountError::NotConnected`] if the user never connected this
    ///   provider
    /// - [`AccountError::AuthExpired`] if the token is stale and cannot be
    ///   refreshed (no refresh token, or the provider does not support it)
    /// - [`AccountError::TokenRefresh`] if the provider's token endpoint
    ///   rejects the refresh
    #[instrument(skip(self), fields(user_id = %user, provider = %provider.as_str()))]
    pub async fn ensure_valid(
        &self,
        user: UserId,
        provider: ProviderKind,
    ) -> Result<ExternalAccount> {
        let account = self
            .store
            .get_account(user, provider)
            .await?
            .ok_or(AccountError::NotConnected(provider))?;

        if account.token_is_current() {
            debug!("Access token is current, no refresh needed");
            return Ok(account);
        }

        if !provider.supports_refresh() {
            warn!("Access token expired and provider does not support refresh");
            return Err(AccountError::AuthExpired {
                provider,
                reason: "token refresh not supported, reconnect the account".to_string(),
            });
        }

        if !account.has_refresh_token() {
            warn!("Access token expired and no refresh token is on file");
            return Err(AccountError::AuthExpired {
                provider,
                reason: "no refresh token available".to_string(),
            });
        }

        // Acquire or create the refresh lock for this account
        let refresh_lock = {
            let mut locks = self.refresh_locks.lock().await;
            locks
                .entry((user, provider))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        // Lock to prevent concurrent refreshes
        let _guard = refresh_lock.lock().await;

        // Re-read under the lock; another caller may have refreshed while
        // this one waited
        let account = self
            .store
            .get_account(user, provider)
            .await?
            .ok_or(AccountError::NotConnected(provider))?;

        if account.token_is_current() {
            debug!("Token was refreshed by a concurrent caller");
            return Ok(account);
        }

        self.refresh_and_store(account).await
    }

    /// Refreshes a stale account's token and persists the outcome.
    ///
    /// Callers must hold the account's refresh lock.
    async fn refresh_and_store(&self, account: ExternalAccount) -> Result<ExternalAccount> {
        let user = account.user_id;
        let provider = account.provider;

        info!("Access token stale, refreshing");
        let event = CoreEvent::Account(AccountEvent::TokenRefreshing {
            user_id: user.to_string(),
            provider: provider.as_str().to_string(),
        });
        let _ = self.event_bus.emit(event);

        let config = self.configs.get(&provider).ok_or_else(|| {
            AccountError::Config(format!(
                "No OAuth configuration registered for {}",
                provider.as_str()
            ))
        })?;

        let refresh_token = match account.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(AccountError::AuthExpired {
                    provider,
                    reason: "no refresh token available".to_string(),
                })
            }
        };

        let refreshed = match self.refresh_client.refresh(config, refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                let event = CoreEvent::Account(AccountEvent::RefreshFailed {
                    user_id: user.to_string(),
                    provider: provider.as_str().to_string(),
                    message: e.to_string(),
                });
                let _ = self.event_bus.emit(event);
                return Err(e);
            }
        };

        let mut payload = NewAccount::new(user, provider, refreshed.access_token)
            .with_expires_at(refreshed.expires_at);
        if let Some(token) = refreshed.refresh_token {
            payload = payload.with_refresh_token(token);
        }
        // Carry over connect-time metadata the token endpoint does not return
        if let Some(id) = account.provider_account_id {
            payload = payload.with_provider_account_id(id);
        }
        if let Some(data) = account.extra_data {
            payload = payload.with_extra_data(data);
        }

        let stored = self.store.upsert_account(payload).await?;

        let event = CoreEvent::Account(AccountEvent::TokenRefreshed {
            user_id: user.to_string(),
            provider: provider.as_str().to_string(),
            expires_at: refreshed.expires_at,
        });
        let _ = self.event_bus.emit(event);

        info!("Token refreshed successfully");
        Ok(stored)
    }

    /// Stores tokens obtained from an externally completed OAuth flow.
    ///
    /// Connecting a provider the user already connected replaces the stored
    /// tokens; there is at most one account per `(user, provider)` pair.
    #[instrument(
        skip(self, account),
        fields(user_id = %account.user_id, provider = %account.provider.as_str())
    )]
    pub async fn connect_account(&self, account: NewAccount) -> Result<ExternalAccount> {
        let stored = self.store.upsert_account(account).await?;

        let event = CoreEvent::Account(AccountEvent::Connected {
            user_id: stored.user_id.to_string(),
            provider: stored.provider.as_str().to_string(),
            provider_account_id: stored.provider_account_id.clone(),
        });
        let _ = self.event_bus.emit(event);

        info!("Provider account connected");
        Ok(stored)
    }

    /// Removes a connected account and its stored tokens.
    ///
    /// Returns `true` if an account existed. Tokens are not revoked at the
    /// provider; hosts that want revocation do it before disconnecting.
    #[instrument(skip(self), fields(user_id = %user, provider = %provider.as_str()))]
    pub async fn disconnect_account(&self, user: UserId, provider: ProviderKind) -> Result<bool> {
        let removed = self.store.delete_account(user, provider).await?;

        if removed {
            self.refresh_locks.lock().await.remove(&(user, provider));

            let event = CoreEvent::Account(AccountEvent::Disconnected {
                user_id: user.to_string(),
                provider: provider.as_str().to_string(),
            });
            let _ = self.event_bus.emit(event);

            info!("Provider account disconnected");
        }

        Ok(removed)
    }

    /// Lists every account the user has connected.
    pub async fn connected_accounts(&self, user: UserId) -> Result<Vec<ExternalAccount>> {
        self.store.list_accounts(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bytes::Bytes;
    use chrono::{Duration, Utc};
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn test_configs() -> HashMap<ProviderKind, ProviderOAuthConfig> {
        let mut configs = HashMap::new();
        configs.insert(
            ProviderKind::Dropbox,
            ProviderOAuthConfig::dropbox("cid", "sec"),
        );
        configs.insert(
            ProviderKind::GoogleDrive,
            ProviderOAuthConfig::google_drive("cid", "sec"),
        );
        configs
    }

    fn lifecycle_with(
        store: Arc<dyn CredentialStore>,
        mock_client: MockHttpClient,
        event_bus: EventBus,
    ) -> TokenLifecycle {
        TokenLifecycle::new(store, Arc::new(mock_client), test_configs(), event_bus)
    }

    fn token_endpoint_response(access_token: &str) -> HttpResponse {
        let body = serde_json::json!({
            "access_token": access_token,
            "expires_in": 3600,
            "token_type": "bearer",
        });
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    async fn seed_account(store: &MemoryCredentialStore, payload: NewAccount) -> ExternalAccount {
        store.upsert_account(payload).await.unwrap()
    }

    #[tokio::test]
    async fn test_current_token_is_returned_without_network() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::Dropbox, "live-token")
                .with_refresh_token("refresh")
                .with_expires_at(Utc::now() + Duration::hours(1)),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client.expect_execute().times(0);

        let lifecycle = lifecycle_with(store, mock_client, EventBus::new(100));
        let account = lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await
            .unwrap();

        assert_eq!(account.access_token, "live-token");
    }

    #[tokio::test]
    async fn test_missing_account_is_not_connected() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mock_client = MockHttpClient::new();
        let lifecycle = lifecycle_with(store, mock_client, EventBus::new(100));

        let err = lifecycle
            .ensure_valid(UserId::new(), ProviderKind::OneDrive)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AccountError::NotConnected(ProviderKind::OneDrive)
        ));
        assert_eq!(err.to_string(), "OneDrive account not connected");
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed_and_persisted() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::GoogleDrive, "stale-token")
                .with_refresh_token("refresh-1")
                .with_expires_at(Utc::now() - Duration::hours(1))
                .with_provider_account_id("acct-1")
                .with_extra_data(serde_json::json!({ "email": "user@example.com" })),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(token_endpoint_response("fresh-token")));

        let lifecycle = lifecycle_with(store.clone(), mock_client, EventBus::new(100));
        let account = lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await
            .unwrap();

        assert_eq!(account.access_token, "fresh-token");
        assert!(account.token_is_current());

        // Refresh persisted and preserved connect-time metadata
        let stored = store
            .get_account(user, ProviderKind::GoogleDrive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "fresh-token");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(stored.provider_account_id.as_deref(), Some("acct-1"));
        assert_eq!(stored.extra_data.unwrap()["email"], "user@example.com");
    }

    #[tokio::test]
    async fn test_unknown_expiry_routes_through_refresh() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::Dropbox, "ageless-token")
                .with_refresh_token("refresh"),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(token_endpoint_response("fresh-token")));

        let lifecycle = lifecycle_with(store, mock_client, EventBus::new(100));
        let account = lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await
            .unwrap();

        assert_eq!(account.access_token, "fresh-token");
        assert!(account.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails_without_network() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::Dropbox, "stale-token")
                .with_expires_at(Utc::now() - Duration::minutes(5)),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client.expect_execute().times(0);

        let lifecycle = lifecycle_with(store.clone(), mock_client, EventBus::new(100));
        let err = lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AccountError::AuthExpired {
                provider: ProviderKind::Dropbox,
                ..
            }
        ));

        // The stale row is left untouched
        let stored = store
            .get_account(user, ProviderKind::Dropbox)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "stale-token");
    }

    #[tokio::test]
    async fn test_expired_onedrive_token_cannot_be_refreshed() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        // Even with a refresh token on file, OneDrive accounts are not
        // refreshed.
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::OneDrive, "stale-token")
                .with_refresh_token("refresh")
                .with_expires_at(Utc::now() - Duration::minutes(5)),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client.expect_execute().times(0);

        let lifecycle = lifecycle_with(store, mock_client, EventBus::new(100));
        let err = lifecycle
            .ensure_valid(user, ProviderKind::OneDrive)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AccountError::AuthExpired {
                provider: ProviderKind::OneDrive,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_and_emits_event() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::GoogleDrive, "stale-token")
                .with_refresh_token("revoked")
                .with_expires_at(Utc::now() - Duration::hours(1)),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        mock_client.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 400,
                headers: HashMap::new(),
                body: Bytes::from_static(b"{\"error\":\"invalid_grant\"}"),
            })
        });

        let event_bus = EventBus::new(100);
        let mut events = event_bus.subscribe();
        let lifecycle = lifecycle_with(store, mock_client, event_bus);

        let err = lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::TokenRefresh { status: 400, .. }));

        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            CoreEvent::Account(AccountEvent::TokenRefreshing { .. })
        ));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second,
            CoreEvent::Account(AccountEvent::RefreshFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        seed_account(
            &store,
            NewAccount::new(user, ProviderKind::Dropbox, "stale-token")
                .with_refresh_token("refresh")
                .with_expires_at(Utc::now() - Duration::hours(1)),
        )
        .await;

        let mut mock_client = MockHttpClient::new();
        // Exactly one token endpoint call despite three concurrent callers
        mock_client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(token_endpoint_response("fresh-token")));

        let lifecycle = Arc::new(lifecycle_with(store, mock_client, EventBus::new(100)));

        let (a, b, c) = tokio::join!(
            lifecycle.ensure_valid(user, ProviderKind::Dropbox),
            lifecycle.ensure_valid(user, ProviderKind::Dropbox),
            lifecycle.ensure_valid(user, ProviderKind::Dropbox),
        );

        assert_eq!(a.unwrap().access_token, "fresh-token");
        assert_eq!(b.unwrap().access_token, "fresh-token");
        assert_eq!(c.unwrap().access_token, "fresh-token");
    }

    #[tokio::test]
    async fn test_connect_account_stores_and_emits() {
        let store = Arc::new(MemoryCredentialStore::new());
        let event_bus = EventBus::new(100);
        let mut events = event_bus.subscribe();
        let lifecycle = lifecycle_with(store.clone(), MockHttpClient::new(), event_bus);

        let user = UserId::new();
        let stored = lifecycle
            .connect_account(
                NewAccount::new(user, ProviderKind::Dropbox, "token")
                    .with_provider_account_id("dbid:abc"),
            )
            .await
            .unwrap();
        assert_eq!(stored.provider_account_id.as_deref(), Some("dbid:abc"));

        let event = events.recv().await.unwrap();
        match event {
            CoreEvent::Account(AccountEvent::Connected {
                user_id,
                provider,
                provider_account_id,
            }) => {
                assert_eq!(user_id, user.to_string());
                assert_eq!(provider, "dropbox");
                assert_eq!(provider_account_id.as_deref(), Some("dbid:abc"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_account_reports_removal() {
        let store = Arc::new(MemoryCredentialStore::new());
        let event_bus = EventBus::new(100);
        let mut events = event_bus.subscribe();
        let lifecycle = lifecycle_with(store, MockHttpClient::new(), event_bus);

        let user = UserId::new();
        lifecycle
            .connect_account(NewAccount::new(user, ProviderKind::GoogleDrive, "token"))
            .await
            .unwrap();

        assert!(lifecycle
            .disconnect_account(user, ProviderKind::GoogleDrive)
            .await
            .unwrap());
        assert!(!lifecycle
            .disconnect_account(user, ProviderKind::GoogleDrive)
            .await
            .unwrap());

        // Connected then Disconnected
        events.recv().await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Account(AccountEvent::Disconnected { .. })
        ));

        assert!(lifecycle.connected_accounts(user).await.unwrap().is_empty());
    }
}
