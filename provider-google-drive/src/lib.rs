//! # Google Drive Provider
//!
//! Google Drive adapter for the federation core, built on the Drive v3 REST
//! API. Listing and search page through `nextPageToken`; uploads and content
//! updates go through the separate upload host with `multipart/related`
//! bodies. Beyond the shared provider surface this crate exposes the
//! single-file operations (metadata read, download, content read, update)
//! that only Drive supports.

pub mod connector;
pub mod types;

pub use connector::{FileDownload, FileUpdate, GoogleDriveConnector};
