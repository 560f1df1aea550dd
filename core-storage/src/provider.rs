//! Cloud provider seam

use crate::error::Result;
use crate::model::{FileRecord, NamespaceDescriptor, ProviderUser, UploadReceipt};
use async_trait::async_trait;
use bytes::Bytes;
use core_accounts::{ProviderKind, UserId};

/// One cloud storage backend, normalized.
///
/// Implementations translate their provider's wire dialect into the shared
/// model and pull credentials from the accounts module on every call, so a
/// stale token is refreshed (or rejected) before any storage request goes
/// out.
///
/// # Error contract
///
/// Methods return the first failure; nothing is retried. The federation
/// layer decides which failures isolate into partial results and which
/// propagate.
///
/// # Example
///
/// ```ignore
/// use core_storage::CloudProvider;
///
/// async fn count_files(provider: &dyn CloudProvider, user: UserId) -> Result<usize> {
///     let files = provider.list_files(user, None).await?;
///     Ok(files.len())
/// }
/// ```
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Which provider this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Fetch the provider-side identity of the connected account
    async fn current_user(&self, user: UserId) -> Result<ProviderUser>;

    /// List the namespaces the account can reach.
    ///
    /// Always contains at least the personal namespace for a connected
    /// account; team namespaces depend on the account's memberships.
    async fn list_namespaces(&self, user: UserId) -> Result<Vec<NamespaceDescriptor>>;

    /// Recursively list files.
    ///
    /// # Arguments
    ///
    /// * `namespace` - The namespace to walk. `None` walks every namespace
    ///   the account can reach and tags each record with its origin via
    ///   [`FileRecord::namespace`]; targeting one namespace leaves records
    ///   untagged
    ///
    /// Listings are exhaustive: implementations follow the provider's
    /// pagination until the final page.
    async fn list_files(
        &self,
        user: UserId,
        namespace: Option<&NamespaceDescriptor>,
    ) -> Result<Vec<FileRecord>>;

    /// Search for files matching a query.
    ///
    /// # Arguments
    ///
    /// * `query` - Normalized (trimmed, lowercased) search text; callers
    ///   handle empty queries before reaching the adapter
    /// * `search_in_content` - When false, match file names only; when true,
    ///   use the provider's full-text search where it has one
    async fn search(
        &self,
        user: UserId,
        query: &str,
        search_in_content: bool,
    ) -> Result<Vec<FileRecord>>;

    /// Upload a file into the namespace root.
    async fn upload(&self, user: UserId, file_name: &str, content: Bytes)
        -> Result<UploadReceipt>;
}
