//! # Dropbox Provider
//!
//! Implements `CloudProvider` for the Dropbox HTTP API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Recursive file listing across personal and team namespaces
//! - Namespace enumeration with personal/team classification
//! - Indexed search via `files/search_v2`
//! - Uploads through the content host
//!
//! Dropbox's API is RPC-over-HTTP: every metadata call is a JSON POST
//! against `api.dropboxapi.com`, and team namespaces are addressed by
//! sending the same calls with a `Dropbox-API-Path-Root` header.

pub mod connector;
pub mod types;

pub use connector::DropboxConnector;
