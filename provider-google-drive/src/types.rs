//! Google Drive API response types

use serde::Deserialize;

/// Google Drive file resource
///
/// See: <https://developers.google.com/drive/api/reference/rest/v3/files>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File size in bytes; Drive serializes int64 values as decimal strings
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
    #[serde(default)]
    pub parents: Option<Vec<String>>,
}

/// Response from the `files.list` endpoint
///
/// See: <https://developers.google.com/drive/api/reference/rest/v3/files/list>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// OAuth2 user info payload
///
/// The account id arrives as `id` on the v2 endpoint and as `sub` on the
/// OpenID Connect endpoint; both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
