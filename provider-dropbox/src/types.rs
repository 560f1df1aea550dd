//! Dropbox API response types
//!
//! Data structures for deserializing Dropbox API v2 responses.

use serde::Deserialize;

/// A Dropbox metadata entry, tagged by kind.
///
/// Dropbox tags every entry with `".tag"`; deserializing into a closed enum
/// means the normalizer pattern-matches variants instead of probing fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    /// A file entry
    File {
        /// Entry ID (`id:...`)
        id: String,
        /// Entry name
        name: String,
        /// Display-cased path
        path_display: Option<String>,
        /// Timestamp set by the writing client (RFC 3339)
        client_modified: Option<String>,
        /// Timestamp set by Dropbox (RFC 3339)
        server_modified: Option<String>,
        /// Revision identifier
        rev: Option<String>,
        /// Size in bytes
        size: Option<u64>,
        /// Dropbox content hash
        content_hash: Option<String>,
    },
    /// A folder entry
    Folder {
        /// Entry ID
        id: String,
        /// Entry name
        name: String,
        /// Display-cased path
        path_display: Option<String>,
    },
    /// A deleted entry; listings request `include_deleted: false`, so these
    /// only appear defensively
    Deleted {
        /// Name of the deleted entry
        name: String,
    },
}

/// `files/list_folder` (and `/continue`) response
#[derive(Debug, Deserialize)]
pub struct ListFolderResponse {
    /// Entries in this page
    pub entries: Vec<Metadata>,
    /// Cursor for the next page
    pub cursor: String,
    /// Whether another page exists
    pub has_more: bool,
}

/// `files/search_v2` (and `search/continue_v2`) response
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// Matches in this page
    pub matches: Vec<SearchMatch>,
    /// Whether another page exists
    #[serde(default)]
    pub has_more: bool,
    /// Cursor for the next page
    pub cursor: Option<String>,
}

/// One search match wrapper
#[derive(Debug, Deserialize)]
pub struct SearchMatch {
    /// Match metadata wrapper (`metadata.metadata` holds the entry)
    pub metadata: SearchMatchMetadata,
}

/// Inner metadata wrapper of a search match
#[derive(Debug, Deserialize)]
pub struct SearchMatchMetadata {
    /// The matched entry
    pub metadata: Metadata,
}

/// `users/get_current_account` response (typed subset)
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentAccount {
    /// Dropbox account ID (`dbid:...`); also the personal namespace id
    pub account_id: String,
    /// Name payload
    pub name: Option<AccountName>,
    /// Account email
    pub email: Option<String>,
}

/// Name fields of an account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountName {
    /// Full display name
    pub display_name: Option<String>,
}

/// `team/namespaces/list` response
#[derive(Debug, Deserialize)]
pub struct NamespacesListResponse {
    /// Team namespaces visible to the account
    pub namespaces: Vec<TeamNamespace>,
}

/// One team namespace
#[derive(Debug, Clone, Deserialize)]
pub struct TeamNamespace {
    /// Namespace identifier
    pub namespace_id: String,
    /// Namespace name
    pub name: String,
    /// Namespace type union (`team_folder`, `shared_folder`, ...)
    #[serde(default)]
    pub namespace_type: Option<TagUnion>,
}

/// A bare Dropbox tag union value
#[derive(Debug, Clone, Deserialize)]
pub struct TagUnion {
    /// The union tag
    #[serde(rename = ".tag")]
    pub tag: String,
}

/// `files/upload` response (a bare file metadata object, no `".tag"`)
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Created file ID
    pub id: String,
    /// Stored name (autorename may change it)
    pub name: String,
    /// Display path
    pub path_display: Option<String>,
    /// Stored size
    pub size: Option<u64>,
    /// Revision of the stored file
    pub rev: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_file_entry() {
        let json = r#"{
            ".tag": "file",
            "id": "id:a4ayc_80_OEAAAAAAAAAXw",
            "name": "report.pdf",
            "path_lower": "/docs/report.pdf",
            "path_display": "/Docs/report.pdf",
            "client_modified": "2024-01-15T10:30:00Z",
            "server_modified": "2024-01-15T10:31:00Z",
            "rev": "a1c10ce0dd78",
            "size": 7212,
            "content_hash": "e3b0c44298fc"
        }"#;

        let entry: Metadata = serde_json::from_str(json).unwrap();
        match entry {
            Metadata::File {
                id,
                name,
                path_display,
                size,
                rev,
                ..
            } => {
                assert_eq!(id, "id:a4ayc_80_OEAAAAAAAAAXw");
                assert_eq!(name, "report.pdf");
                assert_eq!(path_display.as_deref(), Some("/Docs/report.pdf"));
                assert_eq!(size, Some(7212));
                assert_eq!(rev.as_deref(), Some("a1c10ce0dd78"));
            }
            other => panic!("expected file entry, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_folder_and_deleted_entries() {
        let folder: Metadata = serde_json::from_str(
            r#"{ ".tag": "folder", "id": "id:1", "name": "Docs", "path_display": "/Docs" }"#,
        )
        .unwrap();
        assert!(matches!(folder, Metadata::Folder { .. }));

        let deleted: Metadata = serde_json::from_str(
            r#"{ ".tag": "deleted", "name": "old.txt", "path_display": "/old.txt" }"#,
        )
        .unwrap();
        assert!(matches!(deleted, Metadata::Deleted { .. }));
    }

    #[test]
    fn test_deserialize_list_folder_response() {
        let json = r#"{
            "entries": [
                { ".tag": "folder", "id": "id:1", "name": "Docs", "path_display": "/Docs" }
            ],
            "cursor": "AAB05dOlRA",
            "has_more": true
        }"#;

        let response: ListFolderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.cursor, "AAB05dOlRA");
        assert!(response.has_more);
    }

    #[test]
    fn test_deserialize_search_response_nested_metadata() {
        let json = r#"{
            "matches": [
                {
                    "match_type": { ".tag": "filename" },
                    "metadata": {
                        ".tag": "metadata",
                        "metadata": {
                            ".tag": "file",
                            "id": "id:2",
                            "name": "notes.txt",
                            "path_display": "/notes.txt",
                            "size": 12
                        }
                    }
                }
            ],
            "has_more": false
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.matches.len(), 1);
        assert!(matches!(
            response.matches[0].metadata.metadata,
            Metadata::File { .. }
        ));
        assert!(!response.has_more);
        assert!(response.cursor.is_none());
    }

    #[test]
    fn test_deserialize_namespaces_list() {
        let json = r#"{
            "namespaces": [
                {
                    "namespace_id": "ns:123",
                    "name": "Engineering",
                    "namespace_type": { ".tag": "team_folder" }
                }
            ]
        }"#;

        let response: NamespacesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.namespaces.len(), 1);
        assert_eq!(response.namespaces[0].namespace_id, "ns:123");
        assert_eq!(
            response.namespaces[0]
                .namespace_type
                .as_ref()
                .map(|t| t.tag.as_str()),
            Some("team_folder")
        );
    }
}
