//! Normalized file and namespace model
//!
//! Data structures every provider adapter translates its wire types into.

use chrono::{DateTime, Utc};
use core_accounts::ProviderKind;
use serde::{Deserialize, Serialize};

/// Whether a record is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Folder,
}

/// Reference to the namespace a record was listed from.
///
/// Carried on records in flat cross-namespace listings so callers can tell
/// which space each entry came out of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRef {
    /// Provider-native namespace identifier
    pub id: String,
    /// Human-readable namespace name
    pub name: String,
}

/// A normalized file or folder record.
///
/// Field coverage varies by provider; anything a provider does not report
/// is `None` rather than a sentinel value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Provider-native identifier
    pub id: String,

    /// Entry name
    pub name: String,

    /// File or folder
    pub kind: FileKind,

    /// Display path within the namespace, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Size in bytes (folders and some providers omit it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Provider revision identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Provider content hash, in the provider's own format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Creation time (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification time (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Link for opening the entry in the provider's web UI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    /// MIME type, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// The provider this record came from
    pub provider: ProviderKind,

    /// The namespace this record was listed from, for cross-namespace
    /// listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceRef>,
}

/// Classification of a listable namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    /// The user's own space
    Personal,
    /// A shared space (Dropbox team namespace, SharePoint site drive)
    Team,
}

/// A listable space at one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceDescriptor {
    /// Provider-native namespace identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Personal or team space
    pub kind: NamespaceKind,
    /// The owning provider
    pub provider: ProviderKind,
    /// Provider-native payload for callers that need fields the normalized
    /// shape drops
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

impl NamespaceDescriptor {
    /// The lightweight reference used to tag records with their origin
    pub fn to_ref(&self) -> NamespaceRef {
        NamespaceRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Result of a completed upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Provider-native identifier of the created file
    pub id: String,
    /// Stored name (providers may rename on collision)
    pub name: String,
    /// Display path, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Stored size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Revision of the created file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Web link to the created file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// The provider that stored the file
    pub provider: ProviderKind,
}

/// Identity of the provider-side account, fetched at connect time.
///
/// Providers differ in what they expose; `raw` keeps the full payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUser {
    /// Provider-native account identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Account email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Full provider payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Parse an RFC 3339 timestamp into UTC.
///
/// Providers report timestamps in several RFC 3339 variants (with and
/// without fractional seconds, with offsets); anything unparseable maps to
/// `None` instead of failing the record.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
