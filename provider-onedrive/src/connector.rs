//! OneDrive API connector implementation
//!
//! Implements the `CloudProvider` trait against Microsoft Graph. The
//! personal drive lives at `/me/drive`; SharePoint site drives are
//! discovered through `/sites?search=*` and addressed at
//! `/sites/{id}/drive`.

use crate::types::{CollectionPage, Drive, DriveItem, GraphUser, Site};
use crate::walker::DriveWalker;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_accounts::{ProviderKind, TokenLifecycle, UserId};
use core_storage::{
    parse_timestamp, CloudProvider, FileKind, FileRecord, NamespaceDescriptor, NamespaceKind,
    NamespaceRef, ProviderUser, Result, StorageError, UploadReceipt,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Microsoft Graph API base URL
pub(crate) const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Timeout for metadata calls
pub(crate) const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for content uploads
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Display name for the personal drive namespace
const PERSONAL_NAMESPACE_NAME: &str = "Personal OneDrive";

/// Namespace id accepted as an alias for the personal drive
const PERSONAL_NAMESPACE_ALIAS: &str = "personal";

/// OneDrive API connector
///
/// # Example
///
/// ```ignore
/// use provider_onedrive::OneDriveConnector;
/// use core_storage::CloudProvider;
///
/// let connector = OneDriveConnector::new(lifecycle, http_client);
/// let namespaces = connector.list_namespaces(user).await?;
/// ```
pub struct OneDriveConnector {
    /// Token lifecycle providing per-call credentials
    lifecycle: Arc<TokenLifecycle>,

    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,
}

impl OneDriveConnector {
    /// Create a new OneDrive connector
    pub fn new(lifecycle: Arc<TokenLifecycle>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            lifecycle,
            http_client,
        }
    }

    /// Parse a response body, tagging parse failures with the provider
    fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| StorageError::ParseError {
            provider: ProviderKind::OneDrive,
            detail: e.to_string(),
        })
    }

    /// Authenticated GET, mapping non-2xx statuses to API errors
    async fn get_json(&self, access_token: &str, url: String) -> Result<Bytes> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(access_token)
            .timeout(RPC_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::OneDrive,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
        Ok(response.body)
    }

    /// The drive base URL a namespace is addressed through
    fn drive_base_for(namespace: &NamespaceDescriptor) -> String {
        match namespace.kind {
            NamespaceKind::Personal => format!("{}/me/drive", GRAPH_BASE),
            NamespaceKind::Team => format!("{}/sites/{}/drive", GRAPH_BASE, namespace.id),
        }
    }

    /// Convert a Graph item to a normalized record
    fn convert_item(item: DriveItem, namespace: Option<&NamespaceRef>) -> FileRecord {
        let kind = if item.folder.is_some() {
            FileKind::Folder
        } else {
            FileKind::File
        };

        FileRecord {
            id: item.id,
            name: item.name,
            kind,
            path: item.parent_reference.and_then(|p| p.path),
            size: item.size,
            revision: item.e_tag,
            content_hash: None,
            created_at: item.created_date_time.as_deref().and_then(parse_timestamp),
            modified_at: item
                .last_modified_date_time
                .as_deref()
                .and_then(parse_timestamp),
            web_url: item.web_url,
            mime_type: item.file.and_then(|f| f.mime_type),
            provider: ProviderKind::OneDrive,
            namespace: namespace.cloned(),
        }
    }

    /// Enumerate the personal drive plus every SharePoint site drive.
    ///
    /// The personal drive is best effort, as accounts without OneDrive
    /// provisioned still reach their site drives. Site discovery pages
    /// through `@odata.nextLink`; each site's default drive is attached to
    /// the descriptor detail when reachable.
    async fn namespaces_with_token(&self, access_token: &str) -> Vec<NamespaceDescriptor> {
        let mut namespaces = Vec::new();

        match self
            .get_json(access_token, format!("{}/me/drive", GRAPH_BASE))
            .await
            .and_then(|body| Self::parse::<serde_json::Value>(&body))
        {
            Ok(raw) => match serde_json::from_value::<Drive>(raw.clone()) {
                Ok(drive) => namespaces.push(NamespaceDescriptor {
                    id: drive.id,
                    name: PERSONAL_NAMESPACE_NAME.to_string(),
                    kind: NamespaceKind::Personal,
                    provider: ProviderKind::OneDrive,
                    detail: raw,
                }),
                Err(e) => debug!("Unexpected personal drive payload: {}", e),
            },
            Err(e) => debug!("Personal OneDrive not available: {}", e),
        }

        let mut url = Some(format!("{}/sites?search=*", GRAPH_BASE));
        while let Some(current) = url.take() {
            let page: CollectionPage<serde_json::Value> = match self
                .get_json(access_token, current)
                .await
                .and_then(|body| Self::parse(&body))
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to list SharePoint sites: {}", e);
                    break;
                }
            };

            for raw_site in page.value {
                let site: Site = match serde_json::from_value(raw_site.clone()) {
                    Ok(site) => site,
                    Err(e) => {
                        debug!("Skipping unaddressable site entry: {}", e);
                        continue;
                    }
                };

                // Attach the site's default drive when reachable; the site
                // is kept either way
                let mut detail = raw_site;
                match self
                    .get_json(
                        access_token,
                        format!("{}/sites/{}/drive", GRAPH_BASE, site.id),
                    )
                    .await
                    .and_then(|body| Self::parse::<serde_json::Value>(&body))
                {
                    Ok(drive) => detail["drive"] = drive,
                    Err(e) => debug!(site_id = %site.id, "Failed to fetch site drive: {}", e),
                }

                let name = site
                    .display_name
                    .or(site.name)
                    .unwrap_or_else(|| site.id.clone());
                namespaces.push(NamespaceDescriptor {
                    id: site.id,
                    name,
                    kind: NamespaceKind::Team,
                    provider: ProviderKind::OneDrive,
                    detail,
                });
            }

            url = page.next_link;
        }

        namespaces
    }

    /// Run one search leg to exhaustion, absorbing failures.
    ///
    /// `name_filter` is the lowercased needle applied client side when only
    /// name matches are wanted; Graph itself always searches content too.
    async fn search_leg(
        &self,
        access_token: &str,
        start_url: String,
        namespace: Option<&NamespaceRef>,
        name_filter: Option<&str>,
    ) -> Vec<FileRecord> {
        let mut records = Vec::new();
        let mut url = Some(start_url);

        while let Some(current) = url.take() {
            let page: CollectionPage<DriveItem> = match self
                .get_json(access_token, current)
                .await
                .and_then(|body| Self::parse(&body))
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("OneDrive search leg failed: {}", e);
                    break;
                }
            };

            for item in page.value {
                if let Some(needle) = name_filter {
                    if !item.name.to_lowercase().contains(needle) {
                        continue;
                    }
                }
                records.push(Self::convert_item(item, namespace));
            }

            url = page.next_link;
        }

        records
    }
}

#[async_trait]
impl CloudProvider for OneDriveConnector {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn current_user(&self, user: UserId) -> Result<ProviderUser> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::OneDrive)
            .await?;

        let request = HttpRequest::new(HttpMethod::Get, format!("{}/me", GRAPH_BASE))
            .bearer_token(account.access_token.as_str())
            .timeout(RPC_TIMEOUT);
        let response = self.http_client.execute(request).await?;

        // User info is best effort; a rejected call yields an empty profile
        if !response.is_success() {
            warn!(status = response.status, "Failed to fetch OneDrive user info");
            return Ok(ProviderUser::default());
        }

        let raw: serde_json::Value = Self::parse(&response.body)?;
        let me: GraphUser =
            serde_json::from_value(raw.clone()).map_err(|e| StorageError::ParseError {
                provider: ProviderKind::OneDrive,
                detail: e.to_string(),
            })?;

        Ok(ProviderUser {
            id: me.id,
            display_name: me.display_name,
            email: me.mail.or(me.user_principal_name),
            raw,
        })
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_namespaces(&self, user: UserId) -> Result<Vec<NamespaceDescriptor>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::OneDrive)
            .await?;
        let namespaces = self.namespaces_with_token(&account.access_token).await;

        info!(count = namespaces.len(), "Listed OneDrive namespaces");
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
            .ensure_valid(user, ProviderKind::OneDrive)
            .await?;
        let token = account.access_token;

        match namespace {
            Some(ns) => {
                let walker =
                    DriveWalker::new(self.http_client.as_ref(), &token, Self::drive_base_for(ns));
                let files: Vec<FileRecord> = walker
                    .walk()
                    .await
                    .into_iter()
                    .map(|item| Self::convert_item(item, None))
                    .collect();

                info!(count = files.len(), "Listed OneDrive namespace");
                Ok(files)
            }
            None => {
                // Walk every reachable drive, tagging records with their
                // origin
                let namespaces = self.namespaces_with_token(&token).await;
                let mut all = Vec::new();
                for ns in &namespaces {
                    let reference = ns.to_ref();
                    let walker = DriveWalker::new(
                        self.http_client.as_ref(),
                        &token,
                        Self::drive_base_for(ns),
                    );
                    for item in walker.walk().await {
                        all.push(Self::convert_item(item, Some(&reference)));
                    }
                }

                info!(count = all.len(), "Listed OneDrive files");
                Ok(all)
            }
        }
    }

    #[instrument(skip(self), fields(user_id = %user, query = %query))]
    async fn search(
        &self,
        user: UserId,
        query: &str,
        search_in_content: bool,
    ) -> Result<Vec<FileRecord>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::OneDrive)
            .await?;
        let token = account.access_token;

        let needle = (!search_in_content).then(|| query.to_lowercase());
        let encoded = urlencoding::encode(query);

        let personal_ref = NamespaceRef {
            id: PERSONAL_NAMESPACE_ALIAS.to_string(),
            name: PERSONAL_NAMESPACE_NAME.to_string(),
        };
        let personal_url = format!("{}/me/drive/root/search(q='{}')", GRAPH_BASE, encoded);
        let mut results = self
            .search_leg(&token, personal_url, Some(&personal_ref), needle.as_deref())
            .await;

        // Every site drive gets its own leg
        let namespaces = self.namespaces_with_token(&token).await;
        for ns in namespaces
            .iter()
            .filter(|ns| ns.kind == NamespaceKind::Team)
        {
            let url = format!(
                "{}/sites/{}/drive/root/search(q='{}')",
                GRAPH_BASE, ns.id, encoded
            );
            let reference = ns.to_ref();
            results.extend(
                self.search_leg(&token, url, Some(&reference), needle.as_deref())
                    .await,
            );
        }

        info!(count = results.len(), "OneDrive search completed");
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
            .ensure_valid(user, ProviderKind::OneDrive)
            .await?;

        let url = format!(
            "{}/me/drive/root:/{}:/content",
            GRAPH_BASE,
            urlencoding::encode(file_name)
        );
        let request = HttpRequest::new(HttpMethod::Put, url)
            .bearer_token(account.access_token.as_str())
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .timeout(UPLOAD_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        // Graph answers 200 for replacements and 201 for new files
        if !matches!(response.status, 200 | 201) {
            return Err(StorageError::ApiError {
                provider: ProviderKind::OneDrive,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let item: DriveItem = Self::parse(&response.body)?;
        info!(file_id = %item.id, "Uploaded file to OneDrive");

        Ok(UploadReceipt {
            id: item.id,
            name: item.name,
            path: item.parent_reference.and_then(|p| p.path),
            size: item.size,
            revision: item.e_tag,
            web_url: item.web_url,
            provider: ProviderKind::OneDrive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use chrono::{Duration as ChronoDuration, Utc};
    use core_accounts::{AccountError, CredentialStore, MemoryCredentialStore, NewAccount};
    use core_runtime::events::EventBus;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn ok_response(body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.as_bytes().to_vec()),
        })
    }

    fn error_response(status: u16, message: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(message.as_bytes().to_vec()),
        })
    }

    async fn connector_for(mock_http: MockHttpClient) -> (OneDriveConnector, UserId) {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        store
            .upsert_account(
                NewAccount::new(user, ProviderKind::OneDrive, "test-token")
                    .with_expires_at(Utc::now() + ChronoDuration::hours(1)),
            )
            .await
            .unwrap();

        let http: Arc<dyn HttpClient> = Arc::new(mock_http);
        let lifecycle = Arc::new(TokenLifecycle::new(
            store,
            http.clone(),
            HashMap::new(),
            EventBus::new(100),
        ));
        (OneDriveConnector::new(lifecycle, http), user)
    }

    fn personal_namespace() -> NamespaceDescriptor {
        NamespaceDescriptor {
            id: "drive-1".to_string(),
            name: "Personal OneDrive".to_string(),
            kind: NamespaceKind::Personal,
            provider: ProviderKind::OneDrive,
            detail: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_current_user_maps_graph_profile() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://graph.microsoft.com/v1.0/me");
            assert_eq!(
                req.headers.get("Authorization").map(String::as_str),
                Some("Bearer test-token")
            );
            ok_response(
                r#"{"id": "user-9", "displayName": "Pat Doe", "userPrincipalName": "pat@contoso.com"}"#,
            )
        });

        let (connector, user) = connector_for(mock_http).await;
        let profile = connector.current_user(user).await.unwrap();

        assert_eq!(profile.id.as_deref(), Some("user-9"));
        assert_eq!(profile.email.as_deref(), Some("pat@contoso.com"));
    }

    #[tokio::test]
    async fn test_list_namespaces_combines_personal_and_sites() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(4).returning(|req| {
            if req.url.ends_with("/me/drive") {
                ok_response(r#"{"id": "drive-1", "driveType": "personal"}"#)
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(
                    r#"{"value": [
                        {"id": "site-a", "displayName": "Engineering"},
                        {"id": "site-b", "name": "ops"}
                    ]}"#,
                )
            } else if req.url.ends_with("/sites/site-a/drive") {
                ok_response(r#"{"id": "drive-a", "driveType": "documentLibrary"}"#)
            } else if req.url.ends_with("/sites/site-b/drive") {
                error_response(404, "no default drive")
            } else {
                panic!("unexpected url: {}", req.url)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let namespaces = connector.list_namespaces(user).await.unwrap();

        assert_eq!(namespaces.len(), 3);
        assert_eq!(namespaces[0].id, "drive-1");
        assert_eq!(namespaces[0].name, "Personal OneDrive");
        assert_eq!(namespaces[0].kind, NamespaceKind::Personal);

        assert_eq!(namespaces[1].id, "site-a");
        assert_eq!(namespaces[1].name, "Engineering");
        assert_eq!(namespaces[1].kind, NamespaceKind::Team);
        assert_eq!(namespaces[1].detail["drive"]["id"], "drive-a");

        // Site without a reachable drive is kept
        assert_eq!(namespaces[2].id, "site-b");
        assert_eq!(namespaces[2].name, "ops");
        assert!(namespaces[2].detail.get("drive").is_none());
    }

    #[tokio::test]
    async fn test_personal_drive_failure_keeps_sites() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(|req| {
            if req.url.ends_with("/me/drive") {
                error_response(401, "no personal drive")
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(r#"{"value": [{"id": "site-a", "displayName": "Engineering"}]}"#)
            } else {
                ok_response(r#"{"id": "drive-a"}"#)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let namespaces = connector.list_namespaces(user).await.unwrap();

        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].kind, NamespaceKind::Team);
    }

    #[tokio::test]
    async fn test_site_pagination_follows_next_link() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(5).returning(|req| {
            if req.url.ends_with("/me/drive") {
                error_response(404, "none")
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(
                    r#"{"value": [{"id": "site-a", "displayName": "One"}],
                        "@odata.nextLink": "https://graph.microsoft.com/v1.0/sites?search=*&$skiptoken=x"}"#,
                )
            } else if req.url.contains("skiptoken") {
                ok_response(r#"{"value": [{"id": "site-b", "displayName": "Two"}]}"#)
            } else if req.url.contains("/sites/site-") {
                error_response(404, "no drive")
            } else {
                panic!("unexpected url: {}", req.url)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let namespaces = connector.list_namespaces(user).await.unwrap();

        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].name, "One");
        assert_eq!(namespaces[1].name, "Two");
    }

    #[tokio::test]
    async fn test_list_files_walks_target_namespace() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            if req.url.ends_with("/me/drive/root/children") {
                ok_response(
                    r#"{"value": [
                        {"id": "i1", "name": "a.txt", "size": 10, "file": {"mimeType": "text/plain"},
                         "parentReference": {"path": "/drive/root:"}},
                        {"id": "d1", "name": "Docs", "folder": {"childCount": 1}}
                    ]}"#,
                )
            } else {
                assert!(req.url.ends_with("/me/drive/items/d1/children"));
                ok_response(
                    r#"{"value": [{"id": "i2", "name": "b.txt", "file": {},
                        "parentReference": {"path": "/drive/root:/Docs"}}]}"#,
                )
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let files = connector
            .list_files(user, Some(&personal_namespace()))
            .await
            .unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(files[0].name, "a.txt");
        assert_eq!(files[0].kind, FileKind::File);
        assert_eq!(files[0].mime_type.as_deref(), Some("text/plain"));
        assert_eq!(files[1].kind, FileKind::Folder);
        assert_eq!(files[2].path.as_deref(), Some("/drive/root:/Docs"));
    }

    #[tokio::test]
    async fn test_search_filters_by_name_when_content_disabled() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(|req| {
            if req.url.contains("/me/drive/root/search") {
                assert!(req.url.ends_with("search(q='report')"));
                ok_response(
                    r#"{"value": [
                        {"id": "i1", "name": "Q1 Report.pdf", "file": {}},
                        {"id": "i2", "name": "summary.txt", "file": {}}
                    ]}"#,
                )
            } else if req.url.ends_with("/me/drive") {
                error_response(404, "none")
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(r#"{"value": []}"#)
            } else {
                panic!("unexpected url: {}", req.url)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let files = connector.search(user, "report", false).await.unwrap();

        // Graph matched content too; only the name match survives
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "Q1 Report.pdf");
    }

    #[tokio::test]
    async fn test_search_fans_out_to_site_drives() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(5).returning(|req| {
            if req.url.contains("/me/drive/root/search") {
                ok_response(r#"{"value": [{"id": "i1", "name": "personal.docx", "file": {}}]}"#)
            } else if req.url.ends_with("/me/drive") {
                error_response(404, "none")
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(r#"{"value": [{"id": "site-a", "displayName": "Engineering"}]}"#)
            } else if req.url.ends_with("/sites/site-a/drive") {
                error_response(404, "no drive")
            } else {
                assert!(req.url.ends_with("/sites/site-a/drive/root/search(q='report')"));
                ok_response(r#"{"value": [{"id": "i2", "name": "team.docx", "file": {}}]}"#)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let files = connector.search(user, "report", true).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].namespace.as_ref().map(|n| n.id.as_str()),
            Some("personal")
        );
        assert_eq!(
            files[1].namespace.as_ref().map(|n| n.name.as_str()),
            Some("Engineering")
        );
    }

    #[tokio::test]
    async fn test_failed_search_leg_keeps_other_results() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(5).returning(|req| {
            if req.url.contains("/me/drive/root/search") {
                error_response(503, "service unavailable")
            } else if req.url.ends_with("/me/drive") {
                error_response(404, "none")
            } else if req.url.ends_with("/sites?search=*") {
                ok_response(r#"{"value": [{"id": "site-a", "displayName": "Engineering"}]}"#)
            } else if req.url.ends_with("/sites/site-a/drive") {
                error_response(404, "no drive")
            } else {
                ok_response(r#"{"value": [{"id": "i2", "name": "team.docx", "file": {}}]}"#)
            }
        });

        let (connector, user) = connector_for(mock_http).await;
        let files = connector.search(user, "report", true).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "team.docx");
    }

    #[tokio::test]
    async fn test_upload_puts_to_encoded_path() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Put);
            assert_eq!(
                req.url,
                "https://graph.microsoft.com/v1.0/me/drive/root:/my%20notes.txt:/content"
            );
            assert_eq!(
                req.headers.get("Content-Type").map(String::as_str),
                Some("application/octet-stream")
            );
            assert_eq!(req.body.as_deref(), Some(b"hello".as_ref()));

            Ok(HttpResponse {
                status: 201,
                headers: HashMap::new(),
                body: Bytes::from_static(
                    br#"{"id": "item-9", "name": "my notes.txt", "size": 5,
                        "webUrl": "https://contoso-my.sharepoint.com/personal/doc9"}"#,
                ),
            })
        });

        let (connector, user) = connector_for(mock_http).await;
        let receipt = connector
            .upload(user, "my notes.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(receipt.id, "item-9");
        assert_eq!(receipt.size, Some(5));
        assert_eq!(receipt.provider, ProviderKind::OneDrive);
    }

    #[tokio::test]
    async fn test_upload_rejected_status_errors() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| error_response(507, "insufficient storage"));

        let (connector, user) = connector_for(mock_http).await;
        let err = connector
            .upload(user, "big.bin", Bytes::from_static(b"data"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::ApiError {
                provider: ProviderKind::OneDrive,
                status: 507,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_account_propagates_not_connected() {
        let store = Arc::new(MemoryCredentialStore::new());
        let http: Arc<dyn HttpClient> = Arc::new(MockHttpClient::new());
        let lifecycle = Arc::new(TokenLifecycle::new(
            store,
            http.clone(),
            HashMap::new(),
            EventBus::new(100),
        ));
        let connector = OneDriveConnector::new(lifecycle, http);

        let err = connector
            .search(UserId::new(), "report", true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OneDrive account not connected");
    }

    #[tokio::test]
    async fn test_expired_token_surfaces_auth_expired() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = UserId::new();
        store
            .upsert_account(
                NewAccount::new(user, ProviderKind::OneDrive, "stale-token")
                    .with_refresh_token("unusable")
                    .with_expires_at(Utc::now() - ChronoDuration::hours(1)),
            )
            .await
            .unwrap();

        let http: Arc<dyn HttpClient> = Arc::new(MockHttpClient::new());
        let lifecycle = Arc::new(TokenLifecycle::new(
            store,
            http.clone(),
            HashMap::new(),
            EventBus::new(100),
        ));
        let connector = OneDriveConnector::new(lifecycle, http);

        let err = connector.list_files(user, None).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Account(AccountError::AuthExpired {
                provider: ProviderKind::OneDrive,
                ..
            })
        ));
    }
}
