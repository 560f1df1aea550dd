//! # Storage Module
//!
//! Provider-neutral file model and the cloud provider seam.
//!
//! ## Overview
//!
//! Every cloud storage adapter speaks its own wire dialect; this module
//! defines the normalized shapes they all translate into:
//!
//! - [`FileRecord`]: one file or folder, with provider-native fields mapped
//!   to a common schema
//! - [`NamespaceDescriptor`]: a listable space (personal drive, team space,
//!   site drive)
//! - [`UploadReceipt`] / [`ProviderUser`]: upload and identity results
//!
//! The [`CloudProvider`] trait is the seam the federation layer fans out
//! over. Adapters implement it per provider and obtain credentials through
//! the accounts module, never from raw tokens held in constructors.

pub mod error;
pub mod model;
pub mod provider;

pub use error::{Result, StorageError};
pub use model::{
    parse_timestamp, FileKind, FileRecord, NamespaceDescriptor, NamespaceKind, NamespaceRef,
    ProviderUser, UploadReceipt,
};
pub use provider::CloudProvider;
