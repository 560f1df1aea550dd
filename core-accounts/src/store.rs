//! Credential persistence
//!
//! This module provides the [`CredentialStore`] trait consumed by the token
//! lifecycle, plus two implementations: a SQLite-backed store for real
//! deployments and an in-memory store for tests and embedders that persist
//! credentials elsewhere.
//!
//! ## Security Features
//!
//! - Tokens are never logged; audit logging identifies rows only by user and
//!   provider
//! - One row per `(user_id, provider)`: connecting a provider again
//!   overwrites the previous tokens
//!
//! ## Example
//!
//! ```no_run
//! use core_accounts::{CredentialStore, NewAccount, ProviderKind, SqliteCredentialStore, UserId};
//! # async fn example(pool: sqlx::SqlitePool) -> core_accounts::Result<()> {
//! let store = SqliteCredentialStore::new(pool);
//! store.initialize().await?;
//!
//! let user = UserId::new();
//! let account = store
//!     .upsert_account(NewAccount::new(user, ProviderKind::Dropbox, "access-token"))
//!     .await?;
//!
//! let loaded = store.get_account(user, ProviderKind::Dropbox).await?;
//! assert!(loaded.is_some());
//! # Ok(())
//! # }
//! ```

use crate::error::{AccountError, Result};
use crate::types::{ExternalAccount, NewAccount, ProviderKind, UserId};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, SqlitePool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Persistence seam for external accounts.
///
/// The lifecycle and federation layers only ever see this trait; swapping
/// the backing store never touches them.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the account a user has connected for one provider.
    ///
    /// # Returns
    /// - `Ok(Some(account))` if connected
    /// - `Ok(None)` if the user never connected this provider
    async fn get_account(
        &self,
        user: UserId,
        provider: ProviderKind,
    ) -> Result<Option<ExternalAccount>>;

    /// Insert or replace the account for `(account.user_id, account.provider)`.
    ///
    /// Returns the stored row, including store-managed timestamps. The
    /// original `created_at` survives replacement.
    async fn upsert_account(&self, account: NewAccount) -> Result<ExternalAccount>;

    /// Remove a connected account.
    ///
    /// # Returns
    /// - `Ok(true)` if an account was deleted
    /// - `Ok(false)` if none existed
    async fn delete_account(&self, user: UserId, provider: ProviderKind) -> Result<bool>;

    /// List every account a user has connected.
    async fn list_accounts(&self, user: UserId) -> Result<Vec<ExternalAccount>>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

/// SQLite implementation of [`CredentialStore`].
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

/// Row shape as stored; timestamps are Unix epoch seconds and JSON payloads
/// are serialized text.
#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: String,
    provider: String,
    provider_account_id: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    extra_data: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl AccountRow {
    fn into_account(self) -> Result<ExternalAccount> {
        let user_id = UserId::from_string(&self.user_id)
            .map_err(|e| AccountError::Store(format!("Invalid user id in store: {}", e)))?;
        let provider = ProviderKind::parse(&self.provider).ok_or_else(|| {
            AccountError::Store(format!("Unknown provider in store: {}", self.provider))
        })?;
        let extra_data = self
            .extra_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AccountError::Store(format!("Corrupt extra_data in store: {}", e)))?;

        Ok(ExternalAccount {
            user_id,
            provider,
            provider_account_id: self.provider_account_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.and_then(|t| DateTime::from_timestamp(t, 0)),
            extra_data,
            created_at: DateTime::from_timestamp(self.created_at, 0).unwrap_or_else(Utc::now),
            updated_at: DateTime::from_timestamp(self.updated_at, 0).unwrap_or_else(Utc::now),
        })
    }
}

impl SqliteCredentialStore {
    /// Create a new store over an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database table if it doesn't exist
    pub async fn initialize(&self) -> Result<()> {
        query(
            r#"
            CREATE TABLE IF NOT EXISTS external_accounts (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                provider_account_id TEXT,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at INTEGER,
                extra_data TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, provider)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::Store(e.to_string()))?;

        debug!("Credential store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get_account(
        &self,
        user: UserId,
        provider: ProviderKind,
    ) -> Result<Option<ExternalAccount>> {
        let row = query_as::<_, AccountRow>(
            "SELECT * FROM external_accounts WHERE user_id = ? AND provider = ?",
        )
        .bind(user.to_string())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::Store(e.to_string()))?;

        row.map(AccountRow::into_account).transpose()
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<ExternalAccount> {
        let now = Utc::now().timestamp();
        let extra_data = account.extra_data.as_ref().map(|v| v.to_string());

        query(
            r#"
            INSERT INTO external_accounts (
                user_id, provider, provider_account_id, access_token, refresh_token,
                expires_at, extra_data, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                provider_account_id = excluded.provider_account_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                extra_data = excluded.extra_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account.user_id.to_string())
        .bind(account.provider.as_str())
        .bind(&account.provider_account_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.expires_at.map(|t| t.timestamp()))
        .bind(extra_data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::Store(e.to_string()))?;

        info!(
            user_id = %account.user_id,
            provider = %account.provider.as_str(),
            "Stored provider account"
        );

        self.get_account(account.user_id, account.provider)
            .await?
            .ok_or_else(|| AccountError::Store("Upserted account not found".to_string()))
    }

    async fn delete_account(&self, user: UserId, provider: ProviderKind) -> Result<bool> {
        let result = query("DELETE FROM external_accounts WHERE user_id = ? AND provider = ?")
            .bind(user.to_string())
            .bind(provider.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AccountError::Store(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<ExternalAccount>> {
        let rows = query_as::<_, AccountRow>(
            "SELECT * FROM external_accounts WHERE user_id = ? ORDER BY provider",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccountError::Store(e.to_string()))?;

        rows.into_iter().map(AccountRow::into_account).collect()
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory implementation of [`CredentialStore`].
///
/// Used by tests and by embedders that keep credentials in their own
/// storage. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<HashMap<(UserId, ProviderKind), ExternalAccount>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_account(
        &self,
        user: UserId,
        provider: ProviderKind,
    ) -> Result<Option<ExternalAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&(user, provider)).cloned())
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<ExternalAccount> {
        let mut accounts = self.accounts.write().await;
        let now = Utc::now();
        let created_at = accounts
            .get(&(account.user_id, account.provider))
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let stored = ExternalAccount {
            user_id: account.user_id,
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            expires_at: account.expires_at,
            extra_data: account.extra_data,
            created_at,
            updated_at: now,
        };

        accounts.insert((stored.user_id, stored.provider), stored.clone());
        Ok(stored)
    }

    async fn delete_account(&self, user: UserId, provider: ProviderKind) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.remove(&(user, provider)).is_some())
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<ExternalAccount>> {
        let accounts = self.accounts.read().await;
        let mut found: Vec<ExternalAccount> = accounts
            .values()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.provider.as_str());
        Ok(found)
    }
}
