//! Federated aggregation service
//!
//! [`FederationService`] fans operations out across the three provider
//! adapters and assembles fixed per-provider envelopes. Failure isolation
//! is the central contract: inside a federated call every leg's error is
//! captured in its own slot and never aborts, cancels, or taints the
//! sibling legs. Targeted single-provider calls propagate errors to the
//! caller unchanged.

use crate::config::FederationConfig;
use crate::outcome::{
    FederatedListing, FederatedNamespaceListing, FederatedNamespaces, FederatedSearch,
    NamespaceListing, ProviderSlots, SearchOutcome,
};
use bridge_traits::http::HttpClient;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_accounts::{
    CredentialStore, ExternalAccount, NewAccount, ProviderKind, TokenLifecycle, UserId,
};
use core_runtime::events::{CoreEvent, EventBus, FederationEvent};
use core_storage::{
    CloudProvider, FileRecord, NamespaceDescriptor, Result, StorageError, UploadReceipt,
};
use futures::future::join_all;
use provider_dropbox::DropboxConnector;
use provider_google_drive::GoogleDriveConnector;
use provider_onedrive::OneDriveConnector;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Aggregates the three cloud providers behind one facade.
///
/// Every collaborator is injected; the service holds no global state and
/// owns no background tasks. [`FederationService::builder`] wires the
/// standard adapters for hosts that do not bring their own.
///
/// # Example
///
/// ```ignore
/// use core_federation::{FederationConfig, FederationService};
///
/// let config = FederationConfig::builder()
///     .dropbox("app-key", "app-secret")
///     .build()?;
/// let service = FederationService::builder(config)
///     .store(store)
///     .http_client(http_client)
///     .build()?;
///
/// let results = service.search_all_providers(user, "report", true).await;
/// ```
pub struct FederationService {
    /// Credential persistence, shared with the token lifecycle
    store: Arc<dyn CredentialStore>,
    /// Token lifecycle gating every provider call
    lifecycle: Arc<TokenLifecycle>,
    /// Dropbox adapter
    dropbox: Arc<dyn CloudProvider>,
    /// OneDrive adapter
    one_drive: Arc<dyn CloudProvider>,
    /// Google Drive adapter
    google_drive: Arc<dyn CloudProvider>,
    /// Event bus for federation events
    event_bus: EventBus,
}

impl std::fmt::Debug for FederationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationService").finish_non_exhaustive()
    }
}

impl FederationService {
    /// Create a service from explicit handles
    pub fn new(
        store: Arc<dyn CredentialStore>,
        lifecycle: Arc<TokenLifecycle>,
        dropbox: Arc<dyn CloudProvider>,
        one_drive: Arc<dyn CloudProvider>,
        google_drive: Arc<dyn CloudProvider>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            lifecycle,
            dropbox,
            one_drive,
            google_drive,
            event_bus,
        }
    }

    /// Start building a service with the standard adapters
    pub fn builder(config: FederationConfig) -> FederationServiceBuilder {
        FederationServiceBuilder {
            config,
            store: None,
            http_client: None,
            event_bus: None,
        }
    }

    /// The event bus this service emits on
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn provider(&self, kind: ProviderKind) -> &dyn CloudProvider {
        match kind {
            ProviderKind::Dropbox => self.dropbox.as_ref(),
            ProviderKind::OneDrive => self.one_drive.as_ref(),
            ProviderKind::GoogleDrive => self.google_drive.as_ref(),
        }
    }

    /// Search all providers concurrently.
    ///
    /// The query is trimmed and lowercased before dispatch; a query that is
    /// empty after trimming answers immediately without touching any
    /// provider. Each provider's failure lands in its own slot.
    #[instrument(skip(self), fields(user_id = %user, query = %raw_query))]
    pub async fn search_all_providers(
        &self,
        user: UserId,
        raw_query: &str,
        search_in_content: bool,
    ) -> FederatedSearch {
        let query = raw_query.trim().to_lowercase();
        if query.is_empty() {
            debug!("Empty search query, answering without provider calls");
            return FederatedSearch {
                query,
                results: ProviderSlots::default(),
                total_files: 0,
            };
        }

        let (dropbox, one_drive, google_drive) = tokio::join!(
            Self::search_leg(self.dropbox.as_ref(), user, &query, search_in_content),
            Self::search_leg(self.one_drive.as_ref(), user, &query, search_in_content),
            Self::search_leg(self.google_drive.as_ref(), user, &query, search_in_content),
        );

        let results = ProviderSlots {
            dropbox,
            one_drive,
            google_drive,
        };
        let total_files = results.total_files();

        let _ = self
            .event_bus
            .emit(CoreEvent::Federation(FederationEvent::SearchCompleted {
                query: query.clone(),
                total_files,
                failed_providers: results.failed_providers(),
            }));
        info!(total_files, "Federated search completed");

        FederatedSearch {
            query,
            results,
            total_files,
        }
    }

    /// List every provider's files concurrently.
    ///
    /// Each leg walks all namespaces its account can reach, tagging records
    /// with their origin where the provider distinguishes namespaces.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_all_files(&self, user: UserId) -> FederatedListing {
        let (dropbox, one_drive, google_drive) = tokio::join!(
            Self::listing_leg(self.dropbox.as_ref(), user),
            Self::listing_leg(self.one_drive.as_ref(), user),
            Self::listing_leg(self.google_drive.as_ref(), user),
        );

        let results = ProviderSlots {
            dropbox,
            one_drive,
            google_drive,
        };
        let total_files = results.total_files();

        let _ = self
            .event_bus
            .emit(CoreEvent::Federation(FederationEvent::ListingCompleted {
                total_files,
                failed_providers: results.failed_providers(),
            }));
        info!(total_files, "Federated listing completed");

        FederatedListing {
            results,
            total_files,
        }
    }

    /// Enumerate every provider's namespaces concurrently.
    ///
    /// A failed provider contributes an empty slot rather than failing the
    /// envelope.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_namespaces(&self, user: UserId) -> FederatedNamespaces {
        let (dropbox, one_drive, google_drive) = tokio::join!(
            Self::namespaces_leg(self.dropbox.as_ref(), user),
            Self::namespaces_leg(self.one_drive.as_ref(), user),
            Self::namespaces_leg(self.google_drive.as_ref(), user),
        );

        FederatedNamespaces {
            namespaces: ProviderSlots {
                dropbox,
                one_drive,
                google_drive,
            },
        }
    }

    /// List the files of one namespace at one provider.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidInput`] when the namespace id does not exist
    /// at that provider; adapter errors propagate unchanged.
    #[instrument(
        skip(self),
        fields(user_id = %user, provider = provider.as_str(), namespace_id = %namespace_id)
    )]
    pub async fn list_files_for_namespace(
        &self,
        user: UserId,
        provider: ProviderKind,
        namespace_id: &str,
    ) -> Result<Vec<FileRecord>> {
        let adapter = self.provider(provider);
        let namespaces = adapter.list_namespaces(user).await?;
        let namespace = namespaces
            .iter()
            .find(|ns| ns.id == namespace_id)
            .ok_or_else(|| {
                StorageError::InvalidInput(format!(
                    "unknown {} namespace: {}",
                    provider.display_name(),
                    namespace_id
                ))
            })?;

        adapter.list_files(user, Some(namespace)).await
    }

    /// List every namespace of every provider, organized by namespace.
    ///
    /// The unit of concurrency is the namespace: all walks across all
    /// providers run at once. A namespace whose walk fails keeps its entry
    /// with the failure recorded, so callers see the full namespace map
    /// even when parts of it cannot be read.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_all_with_namespaces(&self, user: UserId) -> FederatedNamespaceListing {
        let (dropbox, one_drive, google_drive) = tokio::join!(
            Self::namespace_listings(self.dropbox.as_ref(), user),
            Self::namespace_listings(self.one_drive.as_ref(), user),
            Self::namespace_listings(self.google_drive.as_ref(), user),
        );

        let results = ProviderSlots {
            dropbox,
            one_drive,
            google_drive,
        };
        let total_files = results.total_files();

        let _ = self
            .event_bus
            .emit(CoreEvent::Federation(FederationEvent::ListingCompleted {
                total_files,
                failed_providers: results.failed_providers(),
            }));
        info!(total_files, "Federated namespace listing completed");

        FederatedNamespaceListing {
            results,
            total_files,
        }
    }

    /// Upload a file to one provider's namespace root.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidInput`] for blank file names; adapter errors
    /// propagate unchanged.
    #[instrument(
        skip(self, content),
        fields(user_id = %user, provider = provider.as_str(), file_name = %file_name)
    )]
    pub async fn upload_file(
        &self,
        user: UserId,
        provider: ProviderKind,
        file_name: &str,
        content: Bytes,
    ) -> Result<UploadReceipt> {
        if file_name.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }

        let receipt = self
            .provider(provider)
            .upload(user, file_name, content)
            .await?;

        let _ = self
            .event_bus
            .emit(CoreEvent::Federation(FederationEvent::UploadCompleted {
                provider: provider.as_str().to_string(),
                file_name: receipt.name.clone(),
                file_id: receipt.id.clone(),
            }));
        info!(file_id = %receipt.id, "Upload completed");

        Ok(receipt)
    }

    /// Store tokens from an externally completed OAuth flow.
    ///
    /// The provider-side identity is fetched best effort with the fresh
    /// token and recorded on the account; a failed identity call still
    /// connects the account.
    #[instrument(
        skip(self, access_token, refresh_token),
        fields(user_id = %user, provider = provider.as_str())
    )]
    pub async fn connect_account(
        &self,
        user: UserId,
        provider: ProviderKind,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ExternalAccount> {
        // Stage the tokens so the identity call below can authenticate
        let staged = Self::account_payload(user, provider, &access_token, &refresh_token, expires_at);
        self.store.upsert_account(staged).await?;

        let mut payload =
            Self::account_payload(user, provider, &access_token, &refresh_token, expires_at);
        match self.provider(provider).current_user(user).await {
            Ok(profile) => {
                if let Some(id) = profile.id {
                    payload = payload.with_provider_account_id(id);
                }
                if !profile.raw.is_null() {
                    payload = payload.with_extra_data(profile.raw);
                }
            }
            Err(e) => warn!("Provider identity not available at connect time: {}", e),
        }

        Ok(self.lifecycle.connect_account(payload).await?)
    }

    /// Remove a connected account and its stored tokens
    pub async fn disconnect_account(&self, user: UserId, provider: ProviderKind) -> Result<bool> {
        Ok(self.lifecycle.disconnect_account(user, provider).await?)
    }

    /// Every account the user has connected
    pub async fn connected_accounts(&self, user: UserId) -> Result<Vec<ExternalAccount>> {
        Ok(self.lifecycle.connected_accounts(user).await?)
    }

    fn account_payload(
        user: UserId,
        provider: ProviderKind,
        access_token: &str,
        refresh_token: &Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> NewAccount {
        let mut payload = NewAccount::new(user, provider, access_token);
        if let Some(token) = refresh_token {
            payload = payload.with_refresh_token(token.clone());
        }
        if let Some(at) = expires_at {
            payload = payload.with_expires_at(at);
        }
        payload
    }

    async fn search_leg(
        provider: &dyn CloudProvider,
        user: UserId,
        query: &str,
        search_in_content: bool,
    ) -> SearchOutcome {
        match provider.search(user, query, search_in_content).await {
            Ok(files) => SearchOutcome::ok(files),
            Err(e) => {
                warn!(provider = provider.kind().as_str(), "Search leg failed: {}", e);
                SearchOutcome::failed(e.to_string())
            }
        }
    }

    async fn listing_leg(provider: &dyn CloudProvider, user: UserId) -> SearchOutcome {
        match provider.list_files(user, None).await {
            Ok(files) => SearchOutcome::ok(files),
            Err(e) => {
                warn!(provider = provider.kind().as_str(), "Listing leg failed: {}", e);
                SearchOutcome::failed(e.to_string())
            }
        }
    }

    async fn namespaces_leg(provider: &dyn CloudProvider, user: UserId) -> Vec<NamespaceDescriptor> {
        match provider.list_namespaces(user).await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!(
                    provider = provider.kind().as_str(),
                    "Namespace listing failed: {}", e
                );
                Vec::new()
            }
        }
    }

    /// One provider's per-namespace entries, walked concurrently
    async fn namespace_listings(
        provider: &dyn CloudProvider,
        user: UserId,
    ) -> Vec<NamespaceListing> {
        let namespaces = match provider.list_namespaces(user).await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!(
                    provider = provider.kind().as_str(),
                    "Namespace listing failed: {}", e
                );
                return Vec::new();
            }
        };

        join_all(
            namespaces
                .into_iter()
                .map(|ns| Self::namespace_listing_leg(provider, user, ns)),
        )
        .await
    }

    async fn namespace_listing_leg(
        provider: &dyn CloudProvider,
        user: UserId,
        namespace: NamespaceDescriptor,
    ) -> NamespaceListing {
        match provider.list_files(user, Some(&namespace)).await {
            Ok(files) => {
                let reference = namespace.to_ref();
                let files = files
                    .into_iter()
                    .map(|mut record| {
                        record.namespace = Some(reference.clone());
                        record
                    })
                    .collect();
                NamespaceListing {
                    namespace,
                    outcome: SearchOutcome::ok(files),
                }
            }
            Err(e) => {
                warn!(namespace_id = %namespace.id, "Namespace walk failed: {}", e);
                NamespaceListing {
                    namespace,
                    outcome: SearchOutcome::failed(e.to_string()),
                }
            }
        }
    }
}

/// Builder wiring the standard adapters into a [`FederationService`]
pub struct FederationServiceBuilder {
    config: FederationConfig,
    store: Option<Arc<dyn CredentialStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    event_bus: Option<EventBus>,
}

impl FederationServiceBuilder {
    /// The credential store backing connected accounts
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The host-provided HTTP client all outbound calls go through
    pub fn http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// The event bus to emit on; defaults to a bus of its own
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the service with the standard provider adapters.
    ///
    /// # Errors
    ///
    /// [`core_runtime::Error::Config`] when the credential store or the
    /// HTTP client is missing.
    pub fn build(self) -> core_runtime::Result<FederationService> {
        let store = self.store.ok_or_else(|| {
            core_runtime::Error::Config("a credential store is required".to_string())
        })?;
        let http_client = self.http_client.ok_or_else(|| {
            core_runtime::Error::Config("an HTTP client is required".to_string())
        })?;
        let event_bus = self.event_bus.unwrap_or_else(EventBus::default);

        let lifecycle = Arc::new(TokenLifecycle::new(
            store.clone(),
            http_client.clone(),
            self.config.to_oauth_configs(),
            event_bus.clone(),
        ));

        let dropbox: Arc<dyn CloudProvider> = Arc::new(DropboxConnector::new(
            lifecycle.clone(),
            http_client.clone(),
        ));
        let one_drive: Arc<dyn CloudProvider> = Arc::new(OneDriveConnector::new(
            lifecycle.clone(),
            http_client.clone(),
        ));
        let google_drive: Arc<dyn CloudProvider> =
            Arc::new(GoogleDriveConnector::new(lifecycle.clone(), http_client));

        Ok(FederationService::new(
            store,
            lifecycle,
            dropbox,
            one_drive,
            google_drive,
            event_bus,
        ))
    }
}
