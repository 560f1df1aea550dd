//! Explicit-stack walker for Graph drive hierarchies
//!
//! Graph hands out one folder level per call, so a full listing has to walk
//! the tree. The walker keeps its own work stack of pending folders instead
//! of recursing; a failed folder fetch abandons that subtree only, and the
//! walk continues with the remaining branches.

use crate::connector::RPC_TIMEOUT;
use crate::types::{CollectionPage, DriveItem};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_accounts::ProviderKind;
use core_storage::{Result, StorageError};
use tracing::warn;

/// Depth-first walker over one drive
///
/// Walk order: a folder's children are emitted in listing order, then each
/// child folder is descended in turn.
pub struct DriveWalker<'a> {
    http_client: &'a dyn HttpClient,
    access_token: &'a str,
    /// Drive base URL, e.g. `.../me/drive` or `.../sites/{id}/drive`
    drive_base: String,
    /// Folders awaiting a visit as (folder id, path for diagnostics);
    /// `None` is the drive root
    pending: Vec<(Option<String>, String)>,
}

impl<'a> DriveWalker<'a> {
    pub fn new(
        http_client: &'a dyn HttpClient,
        access_token: &'a str,
        drive_base: String,
    ) -> Self {
        Self {
            http_client,
            access_token,
            drive_base,
            pending: vec![(None, "/".to_string())],
        }
    }

    /// Walk the whole tree, returning every item encountered.
    ///
    /// Fetch failures are absorbed: the affected subtree is skipped with a
    /// `warn!` and everything gathered so far is kept.
    pub async fn walk(mut self) -> Vec<DriveItem> {
        let mut items = Vec::new();

        while let Some((folder_id, path)) = self.pending.pop() {
            let mut url = Some(match &folder_id {
                Some(id) => format!("{}/items/{}/children", self.drive_base, id),
                None => format!("{}/root/children", self.drive_base),
            });
            let mut child_folders = Vec::new();

            while let Some(current) = url.take() {
                let page = match self.fetch_page(&current).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(folder = %path, "OneDrive folder fetch failed: {}", e);
                        break;
                    }
                };

                for item in page.value {
                    if item.folder.is_some() {
                        let child_path = if path == "/" {
                            format!("/{}", item.name)
                        } else {
                            format!("{}/{}", path, item.name)
                        };
                        child_folders.push((Some(item.id.clone()), child_path));
                    }
                    items.push(item);
                }

                url = page.next_link;
            }

            // Reversed so sibling folders pop in listing order
            self.pending.extend(child_folders.into_iter().rev());
        }

        items
    }

    async fn fetch_page(&self, url: &str) -> Result<CollectionPage<DriveItem>> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(self.access_token)
            .timeout(RPC_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StorageError::ApiError {
                provider: ProviderKind::OneDrive,
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| StorageError::ParseError {
            provider: ProviderKind::OneDrive,
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const DRIVE_BASE: &str = "https://graph.microsoft.com/v1.0/me/drive";

    fn ok_response(body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.as_bytes().to_vec()),
        })
    }

    fn error_response(status: u16) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(b"error"),
        })
    }

    fn names(items: &[DriveItem]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_walk_emits_children_then_descends() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            if req.url.ends_with("/root/children") {
                ok_response(
                    r#"{"value": [
                        {"id": "i1", "name": "a.txt", "file": {}},
                        {"id": "d1", "name": "Documents", "folder": {}},
                        {"id": "i2", "name": "c.txt", "file": {}}
                    ]}"#,
                )
            } else {
                assert!(req.url.ends_with("/items/d1/children"));
                ok_response(r#"{"value": [{"id": "i3", "name": "d.txt", "file": {}}]}"#)
            }
        });

        let walker = DriveWalker::new(&mock_http, "token", DRIVE_BASE.to_string());
        let items = walker.walk().await;

        assert_eq!(names(&items), vec!["a.txt", "Documents", "c.txt", "d.txt"]);
    }

    #[tokio::test]
    async fn test_sibling_folders_walk_in_listing_order() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(4).returning(|req| {
            if req.url.ends_with("/root/children") {
                ok_response(
                    r#"{"value": [
                        {"id": "d1", "name": "First", "folder": {}},
                        {"id": "d2", "name": "Second", "folder": {}},
                        {"id": "d3", "name": "Third", "folder": {}}
                    ]}"#,
                )
            } else if req.url.ends_with("/items/d1/children") {
                ok_response(r#"{"value": [{"id": "i1", "name": "1.txt", "file": {}}]}"#)
            } else if req.url.ends_with("/items/d2/children") {
                ok_response(r#"{"value": [{"id": "i2", "name": "2.txt", "file": {}}]}"#)
            } else {
                ok_response(r#"{"value": [{"id": "i3", "name": "3.txt", "file": {}}]}"#)
            }
        });

        let walker = DriveWalker::new(&mock_http, "token", DRIVE_BASE.to_string());
        let items = walker.walk().await;

        assert_eq!(
            names(&items),
            vec!["First", "Second", "Third", "1.txt", "2.txt", "3.txt"]
        );
    }

    #[tokio::test]
    async fn test_pagination_follows_next_link() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            if req.url.contains("skiptoken") {
                ok_response(r#"{"value": [{"id": "i2", "name": "b.txt", "file": {}}]}"#)
            } else {
                ok_response(
                    r#"{"value": [{"id": "i1", "name": "a.txt", "file": {}}],
                        "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/drive/root/children?$skiptoken=abc"}"#,
                )
            }
        });

        let walker = DriveWalker::new(&mock_http, "token", DRIVE_BASE.to_string());
        let items = walker.walk().await;

        assert_eq!(names(&items), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_failed_subtree_abandoned_siblings_continue() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(|req| {
            if req.url.ends_with("/root/children") {
                ok_response(
                    r#"{"value": [
                        {"id": "d1", "name": "Broken", "folder": {}},
                        {"id": "d2", "name": "Healthy", "folder": {}}
                    ]}"#,
                )
            } else if req.url.ends_with("/items/d1/children") {
                error_response(500)
            } else {
                ok_response(r#"{"value": [{"id": "i1", "name": "x.txt", "file": {}}]}"#)
            }
        });

        let walker = DriveWalker::new(&mock_http, "token", DRIVE_BASE.to_string());
        let items = walker.walk().await;

        assert_eq!(names(&items), vec!["Broken", "Healthy", "x.txt"]);
    }

    #[tokio::test]
    async fn test_root_failure_yields_empty_walk() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| error_response(401));

        let walker = DriveWalker::new(&mock_http, "token", DRIVE_BASE.to_string());
        let items = walker.walk().await;

        assert!(items.is_empty());
    }
}
