//! Dropbox API connector implementation
//!
//! Implements the `CloudProvider` trait for the Dropbox API v2.

use crate::types::{
    CurrentAccount, ListFolderResponse, Metadata, NamespacesListResponse, SearchResponse,
    TeamNamespace, UploadResponse,
};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_accounts::{ProviderKind, TokenLifecycle, UserId};
use core_storage::{
    parse_timestamp, CloudProvider, FileKind, FileRecord, NamespaceDescriptor, NamespaceKind,
    NamespaceRef, ProviderUser, Result, StorageError, UploadReceipt,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Dropbox API base URL (metadata RPC calls)
const API_BASE: &str = "https://api.dropboxapi.com/2";

/// Dropbox content host base URL (uploads)
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Timeout for metadata RPC calls
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for content uploads
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Namespace name used when the account reports no display name
const PERSONAL_FALLBACK_NAME: &str = "Personal Dropbox";

/// Dropbox API connector
///
/// Every Dropbox metadata operation is a JSON POST against the API host;
/// uploads go to the separate content host. Team namespaces are addressed
/// by repeating the same calls with a `Dropbox-API-Path-Root` header, which
/// this connector attaches for team namespaces and omits for the personal
/// one.
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use core_storage::CloudProvider;
///
/// let connector = DropboxConnector::new(lifecycle, http_client);
/// let files = connector.list_files(user, None).await?;
/// ```
pub struct DropboxConnector {
    /// Token lifecycle providing per-call credentials
    lifecycle: Arc<TokenLifecycle>,

    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,
}

impl DropboxConnector {
    /// Create a new Dropbox connector
    pub fn new(lifecycle: Arc<TokenLifecycle>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            lifecycle,
            http_client,
        }
    }

    /// Parse a response body, tagging parse failures with the provider
    fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| StorageError::ParseError {
            provider: ProviderKind::Dropbox,
            detail: e.to_string(),
        })
    }

    /// Execute one RPC call against the API host.
    ///
    /// `path_root` is the team namespace id to address, when present.
    async fn rpc(
        &self,
        access_token: &str,
        endpoint: &str,
        body: serde_json::Value,
        path_root: Option<&str>,
    ) -> Result<Bytes> {
        let mut request = HttpRequest::new(HttpMethod::Post, format!("{}{}", API_BASE, endpoint))
            .bearer_token(access_token)
            .json(&body)?
            .timeout(RPC_TIMEOUT);

        if let Some(namespace_id) = path_root {
            request = request.header(
                "Dropbox-API-Path-Root",
                format!(r#"{{"namespace_id": "{}"}}"#, namespace_id),
            );
        }

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::Dropbox,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        Ok(response.body)
    }

    /// Fetch the current account, keeping both typed fields and the raw
    /// payload
    async fn fetch_current_account(
        &self,
        access_token: &str,
    ) -> Result<(CurrentAccount, serde_json::Value)> {
        let body = self
            .rpc(
                access_token,
                "/users/get_current_account",
                serde_json::Value::Null,
                None,
            )
            .await?;
        let raw: serde_json::Value = Self::parse(&body)?;
        let account: CurrentAccount =
            serde_json::from_value(raw.clone()).map_err(|e| StorageError::ParseError {
                provider: ProviderKind::Dropbox,
                detail: e.to_string(),
            })?;
        Ok((account, raw))
    }

    /// Fetch team namespaces; requires team scope
    async fn fetch_team_namespaces(&self, access_token: &str) -> Result<Vec<TeamNamespace>> {
        let body = self
            .rpc(access_token, "/team/namespaces/list", json!({}), None)
            .await?;
        let response: NamespacesListResponse = Self::parse(&body)?;
        Ok(response.namespaces)
    }

    /// Enumerate every reachable namespace with an already-validated token.
    ///
    /// Both legs are best effort: an account without team scope still gets
    /// its personal namespace, and a failed account call still surfaces the
    /// team namespaces.
    async fn namespaces_with_token(&self, access_token: &str) -> Vec<NamespaceDescriptor> {
        let mut namespaces = Vec::new();

        match self.fetch_current_account(access_token).await {
            Ok((account, raw)) => {
                let name = account
                    .name
                    .as_ref()
                    .and_then(|n| n.display_name.clone())
                    .unwrap_or_else(|| PERSONAL_FALLBACK_NAME.to_string());
                // The account id doubles as the personal namespace id
                namespaces.push(NamespaceDescriptor {
                    id: account.account_id,
                    name,
                    kind: NamespaceKind::Personal,
                    provider: ProviderKind::Dropbox,
                    detail: raw,
                });
            }
            Err(e) => warn!("Failed to fetch the personal Dropbox account: {}", e),
        }

        match self.fetch_team_namespaces(access_token).await {
            Ok(team) => {
                for ns in team {
                    let detail = json!({
                        "namespace_id": ns.namespace_id.clone(),
                        "name": ns.name.clone(),
                        "namespace_type": ns.namespace_type.as_ref().map(|t| t.tag.clone()),
                    });
                    namespaces.push(NamespaceDescriptor {
                        id: ns.namespace_id,
                        name: ns.name,
                        kind: NamespaceKind::Team,
                        provider: ProviderKind::Dropbox,
                        detail,
                    });
                }
            }
            Err(e) => debug!("Team namespaces not available: {}", e),
        }

        namespaces
    }

    /// Walk one namespace to exhaustion via `list_folder` + `/continue`
    async fn list_namespace_files(
        &self,
        access_token: &str,
        path_root: Option<&str>,
        namespace: Option<&NamespaceRef>,
    ) -> Result<Vec<FileRecord>> {
        let body = json!({
            "path": "",
            "recursive": true,
            "include_media_info": true,
            "include_deleted": false,
        });
        let first = self
            .rpc(access_token, "/files/list_folder", body, path_root)
            .await?;
        let mut page: ListFolderResponse = Self::parse(&first)?;

        let mut records = Vec::new();
        loop {
            records.extend(
                page.entries
                    .into_iter()
                    .filter_map(|entry| Self::convert_entry(entry, namespace)),
            );
            if !page.has_more {
                break;
            }
            let next = self
                .rpc(
                    access_token,
                    "/files/list_folder/continue",
                    json!({ "cursor": page.cursor }),
                    path_root,
                )
                .await?;
            page = Self::parse(&next)?;
        }

        Ok(records)
    }

    /// Search one namespace to exhaustion via `search_v2` + `/continue_v2`
    async fn search_namespace(
        &self,
        access_token: &str,
        query: &str,
        path_root: Option<&str>,
    ) -> Result<Vec<FileRecord>> {
        let first = self
            .rpc(
                access_token,
                "/files/search_v2",
                json!({ "query": query }),
                path_root,
            )
            .await?;
        let mut page: SearchResponse = Self::parse(&first)?;

        let mut records = Vec::new();
        loop {
            records.extend(
                page.matches
                    .into_iter()
                    .filter_map(|m| Self::convert_entry(m.metadata.metadata, None)),
            );
            if !page.has_more {
                break;
            }
            let Some(cursor) = page.cursor else {
                break;
            };
            let next = self
                .rpc(
                    access_token,
                    "/files/search/continue_v2",
                    json!({ "cursor": cursor }),
                    path_root,
                )
                .await?;
            page = Self::parse(&next)?;
        }

        Ok(records)
    }

    /// The path-root header target for a namespace: team namespaces are
    /// addressed explicitly, the personal namespace uses the default root
    fn path_root_for(namespace: &NamespaceDescriptor) -> Option<&str> {
        match namespace.kind {
            NamespaceKind::Personal => None,
            NamespaceKind::Team => Some(namespace.id.as_str()),
        }
    }

    /// Convert a wire entry to a normalized record; deleted entries drop out
    fn convert_entry(entry: Metadata, namespace: Option<&NamespaceRef>) -> Option<FileRecord> {
        match entry {
            Metadata::File {
                id,
                name,
                path_display,
                client_modified,
                server_modified,
                rev,
                size,
                content_hash,
            } => Some(FileRecord {
                id,
                name,
                kind: FileKind::File,
                path: path_display,
                size,
                revision: rev,
                content_hash,
                created_at: client_modified.as_deref().and_then(parse_timestamp),
                modified_at: server_modified.as_deref().and_then(parse_timestamp),
                web_url: None,
                mime_type: None,
                provider: ProviderKind::Dropbox,
                namespace: namespace.cloned(),
            }),
            Metadata::Folder {
                id,
                name,
                path_display,
            } => Some(FileRecord {
                id,
                name,
                kind: FileKind::Folder,
                path: path_display,
                size: None,
                revision: None,
                content_hash: None,
                created_at: None,
                modified_at: None,
                web_url: None,
                mime_type: None,
                provider: ProviderKind::Dropbox,
                namespace: namespace.cloned(),
            }),
            Metadata::Deleted { .. } => None,
        }
    }
}

#[async_trait]
impl CloudProvider for DropboxConnector {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn current_user(&self, user: UserId) -> Result<ProviderUser> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await?;
        let (current, raw) = self.fetch_current_account(&account.access_token).await?;

        Ok(ProviderUser {
            id: Some(current.account_id),
            display_name: current.name.and_then(|n| n.display_name),
            email: current.email,
            raw,
        })
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_namespaces(&self, user: UserId) -> Result<Vec<NamespaceDescriptor>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await?;
        let namespaces = self.namespaces_with_token(&account.access_token).await;

        info!(count = namespaces.len(), "Listed Dropbox namespaces");
        Ok(namespaces)
    }

    #[instrument(
        skip(self, namespace),
        fields(user_id = %user, namespace_id = namespace.map(|n| n.id.as_str()))
    )]
    async fn list_files(
        &self,
        user: UserId,
        namespace: Option<&NamespaceDescriptor>,
    ) -> Result<Vec<FileRecord>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await?;
        let token = account.access_token;

        match namespace {
            // Targeted listing of one namespace; API failures yield an
            // empty listing rather than failing the namespace
            Some(ns) => match self
                .list_namespace_files(&token, Self::path_root_for(ns), None)
                .await
            {
                Ok(files) => {
                    info!(count = files.len(), "Listed Dropbox namespace");
                    Ok(files)
                }
                Err(e) => {
                    warn!(namespace_id = %ns.id, "Dropbox listing failed: {}", e);
                    Ok(Vec::new())
                }
            },
            // Flat listing across every reachable namespace, each record
            // tagged with its origin
            None => {
                let namespaces = self.namespaces_with_token(&token).await;
                let mut all = Vec::new();
                for ns in &namespaces {
                    let reference = ns.to_ref();
                    match self
                        .list_namespace_files(&token, Self::path_root_for(ns), Some(&reference))
                        .await
                    {
                        Ok(files) => all.extend(files),
                        Err(e) => {
                            warn!(namespace_id = %ns.id, "Dropbox listing failed: {}", e)
                        }
                    }
                }
                info!(count = all.len(), "Listed Dropbox files");
                Ok(all)
            }
        }
    }

    #[instrument(skip(self), fields(user_id = %user, query = %query))]
    async fn search(
        &self,
        user: UserId,
        query: &str,
        _search_in_content: bool,
    ) -> Result<Vec<FileRecord>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await?;
        let token = account.access_token;

        // search_v2 covers file names and content in one indexed call
        let mut results = self.search_namespace(&token, query, None).await?;

        // Team namespaces are searched best effort
        match self.fetch_team_namespaces(&token).await {
            Ok(team) => {
                for ns in team {
                    match self
                        .search_namespace(&token, query, Some(&ns.namespace_id))
                        .await
                    {
                        Ok(files) => results.extend(files),
                        Err(e) => warn!(
                            namespace_id = %ns.namespace_id,
                            "Dropbox team namespace search failed: {}", e
                        ),
                    }
                }
            }
            Err(e) => debug!("Team namespaces not available for search: {}", e),
        }

        info!(count = results.len(), "Dropbox search completed");
        Ok(results)
    }

    #[instrument(skip(self, content), fields(user_id = %user, file_name = %file_name))]
    async fn upload(
        &self,
        user: UserId,
        file_name: &str,
        content: Bytes,
    ) -> Result<UploadReceipt> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::Dropbox)
            .await?;

        let api_arg = json!({
            "path": format!("/{}", file_name),
            "mode": "add",
            "autorename": true,
            "mute": false,
        });

        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files/upload", CONTENT_BASE))
            .bearer_token(account.access_token.as_str())
            .header("Dropbox-API-Arg", api_arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .timeout(UPLOAD_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::Dropbox,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let uploaded: UploadResponse = Self::parse(&response.body)?;
        info!(file_id = %uploaded.id, "Uploaded file to Dropbox");

        Ok(UploadReceipt {
            id: uploaded.id,
            name: uploaded.name,
            path: uploaded.path_display,
            size: uploaded.size,
            revision: uploaded.rev,
            web_url: None,
            provider: ProviderKind::Dropbox,
        })
    }
}
