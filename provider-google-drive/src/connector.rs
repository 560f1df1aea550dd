//! Google Drive API connector implementation
//!
//! Implements the `CloudProvider` trait for the Drive v3 REST API, plus the
//! single-file operations (metadata read, download, content read, update)
//! that only Drive exposes.

use crate::types::{DriveFile, FilesListResponse, UserInfo};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_accounts::{ProviderKind, TokenLifecycle, UserId};
use core_storage::{
    parse_timestamp, CloudProvider, FileKind, FileRecord, NamespaceDescriptor, NamespaceKind,
    ProviderUser, Result, StorageError, UploadReceipt,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload host base URL (multipart and media transfers)
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// OAuth2 user info endpoint
const USER_INFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// MIME type marking an entry as a folder
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Page size for listing and search calls
const PAGE_SIZE: u32 = 100;

/// Fields requested for listing calls
const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, size, createdTime, modifiedTime, webViewLink)";

/// Fields requested for search calls (adds download links and parents)
const SEARCH_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, createdTime, \
                             modifiedTime, webViewLink, webContentLink, parents)";

/// Fields requested for single-file metadata reads
const FILE_FIELDS: &str = "id, name, mimeType, size, createdTime, modifiedTime, webViewLink";

/// Timeout for metadata calls
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for content transfers
const CONTENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Drive has no namespace concept; a single personal namespace stands in
const PERSONAL_NAMESPACE_ID: &str = "personal";
const PERSONAL_NAMESPACE_NAME: &str = "My Drive";

/// A downloaded file: content bytes paired with resolved metadata
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub record: FileRecord,
    pub content: Bytes,
    /// Content type reported by the content host
    pub content_type: String,
}

/// Changes to apply to an existing Drive file
///
/// At least one of `name` and `content` must be set.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub content: Option<Bytes>,
    /// Content type for replacement content; defaults to octet-stream
    pub mime_type: Option<String>,
}

/// Google Drive API connector
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use core_storage::CloudProvider;
///
/// let connector = GoogleDriveConnector::new(lifecycle, http_client);
/// let files = connector.search(user, "report", true).await?;
/// ```
pub struct GoogleDriveConnector {
    /// Token lifecycle providing per-call credentials
    lifecycle: Arc<TokenLifecycle>,

    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    pub fn new(lifecycle: Arc<TokenLifecycle>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            lifecycle,
            http_client,
        }
    }

    /// Parse a response body, tagging parse failures with the provider
    fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| StorageError::ParseError {
            provider: ProviderKind::GoogleDrive,
            detail: e.to_string(),
        })
    }

    /// Build a `/files` URL with percent-encoded query parameters
    fn files_url(params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/files?{}", DRIVE_API_BASE, query)
    }

    /// Execute a request, mapping non-2xx statuses to API errors
    async fn execute_checked(&self, request: HttpRequest) -> Result<Bytes> {
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::GoogleDrive,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
        Ok(response.body)
    }

    /// Authenticated GET returning the raw body
    async fn get(&self, access_token: &str, url: String, timeout: Duration) -> Result<Bytes> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(access_token)
            .timeout(timeout);
        self.execute_checked(request).await
    }

    /// Fetch single-file metadata with an already-validated token
    async fn fetch_file(&self, access_token: &str, file_id: &str) -> Result<FileRecord> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            file_id,
            urlencoding::encode(FILE_FIELDS)
        );
        let body = self.get(access_token, url, RPC_TIMEOUT).await?;
        let file: DriveFile = Self::parse(&body)?;
        Ok(Self::convert_file(file))
    }

    /// Assemble a `multipart/related` body: optional JSON metadata part
    /// followed by the content part
    fn multipart_body(
        boundary: &str,
        metadata: Option<&serde_json::Value>,
        mime_type: &str,
        content: &Bytes,
    ) -> Bytes {
        let mut body = Vec::with_capacity(content.len() + 512);
        if let Some(metadata) = metadata {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n",
                    boundary, metadata
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!("--{}\r\nContent-Type: {}\r\n\r\n", boundary, mime_type).as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        Bytes::from(body)
    }

    /// Convert a wire file to a normalized record
    fn convert_file(file: DriveFile) -> FileRecord {
        let kind = if file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE) {
            FileKind::Folder
        } else {
            FileKind::File
        };

        FileRecord {
            id: file.id,
            name: file.name,
            kind,
            path: None,
            size: file.size.as_deref().and_then(|s| s.parse().ok()),
            revision: None,
            content_hash: None,
            created_at: file.created_time.as_deref().and_then(parse_timestamp),
            modified_at: file.modified_time.as_deref().and_then(parse_timestamp),
            web_url: file.web_view_link,
            mime_type: file.mime_type,
            provider: ProviderKind::GoogleDrive,
            namespace: None,
        }
    }

    /// Fetch single-file metadata
    #[instrument(skip(self), fields(user_id = %user, file_id = %file_id))]
    pub async fn get_file(&self, user: UserId, file_id: &str) -> Result<FileRecord> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;
        self.fetch_file(&account.access_token, file_id).await
    }

    /// Download a file: metadata read followed by an `alt=media` content
    /// fetch
    #[instrument(skip(self), fields(user_id = %user, file_id = %file_id))]
    pub async fn download_file(&self, user: UserId, file_id: &str) -> Result<FileDownload> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;

        let record = self.fetch_file(&account.access_token, file_id).await?;

        let url = format!("{}/files/{}?alt=media", DRIVE_API_BASE, file_id);
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(account.access_token.as_str())
            .timeout(CONTENT_TIMEOUT);
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::GoogleDrive,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let content_type = response
            .headers
            .get("Content-Type")
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        info!(size = response.body.len(), "Downloaded file from Google Drive");
        Ok(FileDownload {
            record,
            content: response.body,
            content_type,
        })
    }

    /// Read just the content bytes of a file
    #[instrument(skip(self), fields(user_id = %user, file_id = %file_id))]
    pub async fn read_file(&self, user: UserId, file_id: &str) -> Result<Bytes> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;

        let url = format!("{}/files/{}?alt=media", DRIVE_API_BASE, file_id);
        self.get(&account.access_token, url, CONTENT_TIMEOUT).await
    }

    /// Update an existing file's name and/or content.
    ///
    /// Content together with a name or MIME type goes through the multipart
    /// endpoint; content alone through the media endpoint; a name alone
    /// through a plain metadata PATCH.
    #[instrument(skip(self, update), fields(user_id = %user, file_id = %file_id))]
    pub async fn update_file(
        &self,
        user: UserId,
        file_id: &str,
        update: FileUpdate,
    ) -> Result<FileRecord> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;
        let token = account.access_token;

        let body = match (&update.content, &update.name, &update.mime_type) {
            (Some(content), name, mime) if name.is_some() || mime.is_some() => {
                let metadata = name.as_ref().map(|n| json!({ "name": n }));
                let boundary = Uuid::new_v4().simple().to_string();
                let mime_type = mime.as_deref().unwrap_or("application/octet-stream");
                let multipart =
                    Self::multipart_body(&boundary, metadata.as_ref(), mime_type, content);

                let request = HttpRequest::new(
                    HttpMethod::Patch,
                    format!("{}/files/{}?uploadType=multipart", UPLOAD_API_BASE, file_id),
                )
                .bearer_token(token.as_str())
                .header(
                    "Content-Type",
                    format!("multipart/related; boundary={}", boundary),
                )
                .body(multipart)
                .timeout(CONTENT_TIMEOUT);
                self.execute_checked(request).await?
            }
            (Some(content), _, _) => {
                let request = HttpRequest::new(
                    HttpMethod::Patch,
                    format!("{}/files/{}?uploadType=media", UPLOAD_API_BASE, file_id),
                )
                .bearer_token(token.as_str())
                .header("Content-Type", "application/octet-stream")
                .body(content.clone())
                .timeout(CONTENT_TIMEOUT);
                self.execute_checked(request).await?
            }
            (None, Some(name), _) => {
                let request = HttpRequest::new(
                    HttpMethod::Patch,
                    format!("{}/files/{}", DRIVE_API_BASE, file_id),
                )
                .bearer_token(token.as_str())
                .json(&json!({ "name": name }))?
                .timeout(RPC_TIMEOUT);
                self.execute_checked(request).await?
            }
            (None, None, _) => {
                return Err(StorageError::InvalidInput(
                    "no update parameters provided".to_string(),
                ))
            }
        };

        let updated: DriveFile = Self::parse(&body)?;
        info!(file_id = %updated.id, "Updated file on Google Drive");
        Ok(Self::convert_file(updated))
    }
}

#[async_trait]
impl CloudProvider for GoogleDriveConnector {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn current_user(&self, user: UserId) -> Result<ProviderUser> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;

        let request = HttpRequest::new(HttpMethod::Get, USER_INFO_URL)
            .bearer_token(account.access_token.as_str())
            .timeout(RPC_TIMEOUT);
        let response = self.http_client.execute(request).await?;

        // User info is best effort; a rejected call yields an empty profile
        if !response.is_success() {
            warn!(status = response.status, "Failed to fetch Google user info");
            return Ok(ProviderUser::default());
        }

        let raw: serde_json::Value = Self::parse(&response.body)?;
        let info: UserInfo =
            serde_json::from_value(raw.clone()).map_err(|e| StorageError::ParseError {
                provider: ProviderKind::GoogleDrive,
                detail: e.to_string(),
            })?;

        Ok(ProviderUser {
            id: info.id.or(info.sub),
            display_name: info.name,
            email: info.email,
            raw,
        })
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_namespaces(&self, user: UserId) -> Result<Vec<NamespaceDescriptor>> {
        // Validates the connection; Drive reaches shared content through
        // query flags rather than separate namespaces
        self.lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;

        Ok(vec![NamespaceDescriptor {
            id: PERSONAL_NAMESPACE_ID.to_string(),
            name: PERSONAL_NAMESPACE_NAME.to_string(),
            kind: NamespaceKind::Personal,
            provider: ProviderKind::GoogleDrive,
            detail: serde_json::Value::Null,
        }])
    }

    #[instrument(skip(self, _namespace), fields(user_id = %user))]
    async fn list_files(
        &self,
        user: UserId,
        _namespace: Option<&NamespaceDescriptor>,
    ) -> Result<Vec<FileRecord>> {
        let account = self
            .lifecycle
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;
        let token = account.access_token;

        let page_size = PAGE_SIZE.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> =
                vec![("pageSize", page_size.as_str()), ("fields", LIST_FIELDS)];
            if let Some(token_value) = page_token.as_deref() {
                params.push(("pageToken", token_value));
            }

            let body = self
                .get(&token, Self::files_url(&params), RPC_TIMEOUT)
                .await?;
            let page: FilesListResponse = Self::parse(&body)?;
            files.extend(page.files.into_iter().map(Self::convert_file));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        info!(count = files.len(), "Listed Google Drive files");
        Ok(files)
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
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;
        let token = account.access_token;

        // Single quotes terminate Drive query string literals
        let escaped = query.replace('\'', "\\'");
        let q = if search_in_content {
            format!(
                "(name contains '{}' or fullText contains '{}') and trashed = false",
                escaped, escaped
            )
        } else {
            format!("name contains '{}' and trashed = false", escaped)
        };

        let page_size = PAGE_SIZE.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("q", q.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", SEARCH_FIELDS),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
                ("corpora", "user"),
            ];
            if let Some(token_value) = page_token.as_deref() {
                params.push(("pageToken", token_value));
            }

            // A failed page keeps the pages already fetched
            let page: FilesListResponse = match self
                .get(&token, Self::files_url(&params), RPC_TIMEOUT)
                .await
                .and_then(|body| Self::parse(&body))
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Google Drive search page failed: {}", e);
                    break;
                }
            };
            files.extend(page.files.into_iter().map(Self::convert_file));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        info!(count = files.len(), "Google Drive search completed");
        Ok(files)
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
            .ensure_valid(user, ProviderKind::GoogleDrive)
            .await?;

        let metadata = json!({ "name": file_name });
        let boundary = Uuid::new_v4().simple().to_string();
        let body = Self::multipart_body(
            &boundary,
            Some(&metadata),
            "application/octet-stream",
            &content,
        );

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?uploadType=multipart", UPLOAD_API_BASE),
        )
        .bearer_token(account.access_token.as_str())
        .header(
            "Content-Type",
            format!("multipart/related; boundary={}", boundary),
        )
        .body(body)
        .timeout(CONTENT_TIMEOUT);

        let response_body = self.execute_checked(request).await?;
        let uploaded: DriveFile = Self::parse(&response_body)?;
        info!(file_id = %uploaded.id, "Uploaded file to Google Drive");

        let record = Self::convert_file(uploaded);
        Ok(UploadReceipt {
            id: record.id,
            name: record.name,
            path: None,
            size: record.size,
            revision: None,
            web_url: record.web_url,
            provider: ProviderKind::GoogleDrive,
        })
    }
}
