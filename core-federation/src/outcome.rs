//! Federated result envelopes
//!
//! Every federated operation answers with a fixed per-provider envelope
//! instead of failing on the first broken provider. A provider's slot holds
//! either its real results or the error message its leg produced; the
//! envelope itself always represents a completed operation.

use core_accounts::ProviderKind;
use core_storage::{FileRecord, NamespaceDescriptor};
use serde::{Deserialize, Serialize};

/// One provider's contribution to a federated operation.
///
/// A failed leg carries its message in `error` with `files` empty and
/// `total` zero; the two states never mix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Records this provider contributed
    pub files: Vec<FileRecord>,
    /// Number of contributed records
    pub total: usize,
    /// The leg's error message, when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    /// A successful outcome carrying `files`
    pub fn ok(files: Vec<FileRecord>) -> Self {
        let total = files.len();
        Self {
            files,
            total,
            error: None,
        }
    }

    /// A failed outcome carrying only the error message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            total: 0,
            error: Some(message.into()),
        }
    }

    /// Whether this leg failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-provider slots of a federated envelope.
///
/// Field order is part of the wire contract: serialized envelopes always
/// list `dropbox`, `one_drive`, `google_drive` in that order, regardless of
/// which leg finished first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSlots<T> {
    pub dropbox: T,
    pub one_drive: T,
    pub google_drive: T,
}

impl<T> ProviderSlots<T> {
    /// The slot belonging to a provider
    pub fn slot(&self, provider: ProviderKind) -> &T {
        match provider {
            ProviderKind::Dropbox => &self.dropbox,
            ProviderKind::OneDrive => &self.one_drive,
            ProviderKind::GoogleDrive => &self.google_drive,
        }
    }

    /// Mutable access to the slot belonging to a provider
    pub fn slot_mut(&mut self, provider: ProviderKind) -> &mut T {
        match provider {
            ProviderKind::Dropbox => &mut self.dropbox,
            ProviderKind::OneDrive => &mut self.one_drive,
            ProviderKind::GoogleDrive => &mut self.google_drive,
        }
    }
}

impl ProviderSlots<SearchOutcome> {
    /// Sum of the per-slot totals
    pub fn total_files(&self) -> usize {
        self.dropbox.total + self.one_drive.total + self.google_drive.total
    }

    /// Wire names of the providers whose leg failed
    pub fn failed_providers(&self) -> Vec<String> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.slot(*kind).is_failed())
            .map(|kind| kind.as_str().to_string())
            .collect()
    }
}

impl ProviderSlots<Vec<NamespaceListing>> {
    /// Sum of the entry totals across every provider
    pub fn total_files(&self) -> usize {
        [&self.dropbox, &self.one_drive, &self.google_drive]
            .into_iter()
            .flat_map(|entries| entries.iter())
            .map(|entry| entry.outcome.total)
            .sum()
    }

    /// Wire names of the providers with at least one failed namespace entry
    pub fn failed_providers(&self) -> Vec<String> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.slot(*kind).iter().any(|entry| entry.outcome.is_failed()))
            .map(|kind| kind.as_str().to_string())
            .collect()
    }
}

/// Result of a federated search across all providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedSearch {
    /// The normalized (trimmed, lowercased) query that was dispatched
    pub query: String,
    /// Per-provider outcomes
    pub results: ProviderSlots<SearchOutcome>,
    /// Sum of the per-provider totals
    pub total_files: usize,
}

/// Result of a federated flat listing across all providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedListing {
    /// Per-provider outcomes
    pub results: ProviderSlots<SearchOutcome>,
    /// Sum of the per-provider totals
    pub total_files: usize,
}

/// Namespaces reachable per provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederatedNamespaces {
    /// Per-provider namespace lists; a failed provider contributes an empty
    /// list
    pub namespaces: ProviderSlots<Vec<NamespaceDescriptor>>,
}

/// One namespace's listing within a per-namespace federated walk.
///
/// A namespace whose walk failed keeps its entry, with the failure recorded
/// in the outcome, so callers see which spaces exist even when they cannot
/// be read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceListing {
    /// The namespace that was walked
    pub namespace: NamespaceDescriptor,
    /// The walk's outcome
    pub outcome: SearchOutcome,
}

/// Result of a federated listing organized by namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedNamespaceListing {
    /// Per-provider namespace entries
    pub results: ProviderSlots<Vec<NamespaceListing>>,
    /// Sum of the entry totals across every provider
    pub total_files: usize,
}
