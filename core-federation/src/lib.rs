//! # Federation Module
//!
//! Fans file operations out across every connected cloud provider and
//! merges the results into fixed per-provider envelopes.
//!
//! ## Overview
//!
//! [`FederationService`] is the crate's entry point and the main surface
//! hosts embed. It owns one adapter per provider behind the
//! `CloudProvider` seam and runs federated operations concurrently:
//!
//! - [`FederationService::search_all_providers`]: one query, three
//!   providers, one envelope
//! - [`FederationService::list_all_files`]: flat cross-provider listing
//! - [`FederationService::list_namespaces`] /
//!   [`FederationService::list_all_with_namespaces`]: namespace discovery
//!   and per-namespace listings
//! - [`FederationService::upload_file`]: targeted single-provider upload
//! - Account management passthroughs for connect, disconnect and listing
//!
//! ## Failure Isolation
//!
//! Inside a federated envelope each provider fails alone: the slot of a
//! provider whose leg errored carries the error message while the other
//! slots carry their results. The envelope itself never fails. Targeted
//! single-provider operations propagate errors normally.
//!
//! ## Example
//!
//! ```ignore
//! use core_federation::{FederationConfig, FederationService};
//!
//! let config = FederationConfig::builder()
//!     .dropbox(dropbox_key, dropbox_secret)
//!     .google_drive(google_id, google_secret)
//!     .build()?;
//!
//! let service = FederationService::builder(config)
//!     .store(store)
//!     .http_client(http_client)
//!     .build()?;
//!
//! let results = service.search_all_providers(user, "quarterly report", true).await;
//! println!("{} files across providers", results.total_files);
//! ```

pub mod config;
pub mod outcome;
pub mod service;

pub use config::{FederationConfig, FederationConfigBuilder};
pub use outcome::{
    FederatedListing, FederatedNamespaceListing, FederatedNamespaces, FederatedSearch,
    NamespaceListing, ProviderSlots, SearchOutcome,
};
pub use service::{FederationService, FederationServiceBuilder};

// Everything that appears in the service's signatures, so hosts can depend
// on this crate alone.
pub use core_accounts::{
    CredentialStore, ExternalAccount, MemoryCredentialStore, NewAccount, ProviderKind,
    SqliteCredentialStore, UserId,
};
pub use core_runtime::events::{AccountEvent, CoreEvent, EventBus, FederationEvent};
pub use core_storage::{
    CloudProvider, FileKind, FileRecord, NamespaceDescriptor, NamespaceKind, NamespaceRef,
    StorageError, UploadReceipt,
};
