//! # Accounts Module
//!
//! External provider accounts and OAuth 2.0 token lifecycle.
//!
//! ## Overview
//!
//! This module owns everything about a user's connection to a cloud storage
//! provider: the persisted account row (tokens, expiry, provider metadata),
//! the credential store it lives in, and the refresh machinery that keeps
//! access tokens usable. It does not implement interactive OAuth consent
//! flows; embedders complete those elsewhere and hand the resulting tokens
//! to [`TokenLifecycle::connect_account`].
//!
//! ## Features
//!
//! - One account per `(user, provider)` pair, enforced by the store upsert
//! - On-demand token refresh with per-account single-flight locking
//! - Refresh-token rotation support (providers may or may not return a new one)
//! - Pluggable persistence via the [`CredentialStore`] trait (SQLite and
//!   in-memory implementations included)
//! - Account lifecycle event emission

pub mod error;
pub mod lifecycle;
pub mod oauth;
pub mod store;
pub mod types;

pub use error::{AccountError, Result};
pub use lifecycle::TokenLifecycle;
pub use oauth::{ProviderOAuthConfig, TokenRefreshClient};
pub use store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use types::{ExternalAccount, NewAccount, ProviderKind, UserId};
