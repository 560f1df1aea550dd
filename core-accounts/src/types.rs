use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a user of the federation core.
///
/// A user can hold at most one connected account per provider; the same
/// `UserId` keys the credential rows for all of them.
///
/// # Examples
///
/// ```
/// use core_accounts::UserId;
///
/// // Create a new user ID
/// let user_id = UserId::new();
///
/// // Parse from string
/// let id_str = "550e8400-e29b-41d4-a716-446655440000";
/// let user_id = UserId::from_string(id_str).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use core_accounts::UserId;
    ///
    /// let id = UserId::from_string("550e8400-e29b-41d4-a716-446655440000").unwrap();
    /// ```
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Supported cloud storage providers.
///
/// # Examples
///
/// ```
/// use core_accounts::ProviderKind;
///
/// let provider = ProviderKind::GoogleDrive;
/// assert_eq!(provider.display_name(), "Google Drive");
/// assert_eq!(provider.as_str(), "google_drive");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Dropbox cloud storage
    Dropbox,
    /// Microsoft OneDrive cloud storage
    OneDrive,
    /// Google Drive cloud storage
    GoogleDrive,
}

impl ProviderKind {
    /// All providers, in the fixed order federated envelopes use.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Dropbox,
        ProviderKind::OneDrive,
        ProviderKind::GoogleDrive,
    ];

    /// Get the human-readable display name for this provider
    ///
    /// # Examples
    ///
    /// ```
    /// use core_accounts::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::Dropbox.display_name(), "Dropbox");
    /// assert_eq!(ProviderKind::GoogleDrive.display_name(), "Google Drive");
    /// assert_eq!(ProviderKind::OneDrive.display_name(), "OneDrive");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "Dropbox",
            ProviderKind::OneDrive => "OneDrive",
            ProviderKind::GoogleDrive => "Google Drive",
        }
    }

    /// Get the provider identifier string
    ///
    /// Used as the wire key in federated envelopes, for credential rows and
    /// for logging.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_accounts::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::OneDrive.as_str(), "one_drive");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "dropbox",
            ProviderKind::OneDrive => "one_drive",
            ProviderKind::GoogleDrive => "google_drive",
        }
    }

    /// Parse a provider kind from a string identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use core_accounts::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("google_drive"), Some(ProviderKind::GoogleDrive));
    /// assert_eq!(ProviderKind::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dropbox" => Some(ProviderKind::Dropbox),
            "one_drive" | "onedrive" => Some(ProviderKind::OneDrive),
            "google_drive" | "googledrive" => Some(ProviderKind::GoogleDrive),
            _ => None,
        }
    }

    /// Whether expired tokens for this provider can be refreshed.
    ///
    /// OneDrive accounts are connected without a refresh token, so once
    /// their access token expires the user has to reconnect.
    pub fn supports_refresh(&self) -> bool {
        !matches!(self, ProviderKind::OneDrive)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A user's connected account at one cloud storage provider.
///
/// At most one row exists per `(user_id, provider)` pair; connecting the
/// same provider again replaces the stored tokens.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug`
/// implementation redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_accounts::{ExternalAccount, ProviderKind, UserId};
/// use chrono::{Duration, Utc};
///
/// let account = ExternalAccount {
///     user_id: UserId::new(),
///     provider: ProviderKind::GoogleDrive,
///     provider_account_id: None,
///     access_token: "ya29.a0...".to_string(),
///     refresh_token: Some("1//0g...".to_string()),
///     expires_at: Some(Utc::now() + Duration::hours(1)),
///     extra_data: None,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// assert!(account.token_is_current());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ExternalAccount {
    /// The owning user
    pub user_id: UserId,
    /// The provider this account belongs to
    pub provider: ProviderKind,
    /// The provider-side account identifier, when known
    pub provider_account_id: Option<String>,
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens, if the provider
    /// issued one
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC); `None` means unknown
    pub expires_at: Option<DateTime<Utc>>,
    /// Provider-specific payload captured at connect time (user profile etc.)
    pub extra_data: Option<serde_json::Value>,
    /// When the account was first connected
    pub created_at: DateTime<Utc>,
    /// When the account row was last written
    pub updated_at: DateTime<Utc>,
}

impl ExternalAccount {
    /// Whether the stored access token can be used as-is.
    ///
    /// True only when a concrete expiry is recorded and still in the
    /// future. An unknown expiry counts as stale, which routes the account
    /// through the refresh path where the provider reports a fresh one.
    pub fn token_is_current(&self) -> bool {
        self.expires_at.map_or(false, |t| t > Utc::now())
    }

    /// Whether a usable refresh token is stored.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for ExternalAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAccount")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("provider_account_id", &self.provider_account_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Input to [`CredentialStore::upsert_account`](crate::store::CredentialStore::upsert_account).
///
/// Carries everything about a connection except the store-managed
/// timestamps.
#[derive(Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub user_id: UserId,
    pub provider: ProviderKind,
    pub provider_account_id: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub extra_data: Option<serde_json::Value>,
}

impl NewAccount {
    /// Create a new account payload with just the required fields
    pub fn new(user_id: UserId, provider: ProviderKind, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            provider,
            provider_account_id: None,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            extra_data: None,
        }
    }

    /// Set the refresh token
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Set the access token expiry
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the provider-side account identifier
    pub fn with_provider_account_id(mut self, id: impl Into<String>) -> Self {
        self.provider_account_id = Some(id.into());
        self
    }

    /// Attach a provider-specific payload
    pub fn with_extra_data(mut self, data: serde_json::Value) -> Self {
        self.extra_data = Some(data);
        self
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("provider_account_id", &self.provider_account_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account_expiring_at(expires_at: Option<DateTime<Utc>>) -> ExternalAccount {
        ExternalAccount {
            user_id: UserId::new(),
            provider: ProviderKind::Dropbox,
            provider_account_id: None,
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            extra_data: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_id_creation() {
        let id1 = UserId::new();
        let id2 = UserId::new();
        assert_ne!(id1, id2, "User IDs should be unique");
    }

    #[test]
    fn test_user_id_from_string() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = UserId::from_string(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_user_id_from_string_invalid() {
        let result = UserId::from_string("invalid-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn test_user_id_serialization() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_provider_kind_display_name() {
        assert_eq!(ProviderKind::Dropbox.display_name(), "Dropbox");
        assert_eq!(ProviderKind::GoogleDrive.display_name(), "Google Drive");
        assert_eq!(ProviderKind::OneDrive.display_name(), "OneDrive");
    }

    #[test]
    fn test_provider_kind_as_str() {
        assert_eq!(ProviderKind::Dropbox.as_str(), "dropbox");
        assert_eq!(ProviderKind::GoogleDrive.as_str(), "google_drive");
        assert_eq!(ProviderKind::OneDrive.as_str(), "one_drive");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("dropbox"), Some(ProviderKind::Dropbox));
        assert_eq!(
            ProviderKind::parse("google_drive"),
            Some(ProviderKind::GoogleDrive)
        );
        assert_eq!(
            ProviderKind::parse("GoogleDrive"),
            Some(ProviderKind::GoogleDrive)
        );
        assert_eq!(
            ProviderKind::parse("one_drive"),
            Some(ProviderKind::OneDrive)
        );
        assert_eq!(ProviderKind::parse("onedrive"), Some(ProviderKind::OneDrive));
        assert_eq!(ProviderKind::parse("invalid"), None);
    }

    #[test]
    fn test_provider_kind_envelope_order() {
        assert_eq!(
            ProviderKind::ALL,
            [
                ProviderKind::Dropbox,
                ProviderKind::OneDrive,
                ProviderKind::GoogleDrive,
            ]
        );
    }

    #[test]
    fn test_provider_kind_supports_refresh() {
        assert!(ProviderKind::Dropbox.supports_refresh());
        assert!(ProviderKind::GoogleDrive.supports_refresh());
        assert!(!ProviderKind::OneDrive.supports_refresh());
    }

    #[test]
    fn test_provider_kind_serialization_uses_wire_keys() {
        let json = serde_json::to_string(&ProviderKind::OneDrive).unwrap();
        assert_eq!(json, "\"one_drive\"");
        let json = serde_json::to_string(&ProviderKind::GoogleDrive).unwrap();
        assert_eq!(json, "\"google_drive\"");

        let parsed: ProviderKind = serde_json::from_str("\"dropbox\"").unwrap();
        assert_eq!(parsed, ProviderKind::Dropbox);
    }

    #[test]
    fn test_token_is_current_fresh() {
        let account = account_expiring_at(Some(Utc::now() + Duration::hours(1)));
        assert!(account.token_is_current());
    }

    #[test]
    fn test_token_is_current_expired() {
        let account = account_expiring_at(Some(Utc::now() - Duration::hours(1)));
        assert!(!account.token_is_current());
    }

    #[test]
    fn test_token_is_current_unknown_expiry() {
        let account = account_expiring_at(None);
        assert!(!account.token_is_current());
    }

    #[test]
    fn test_has_refresh_token() {
        let mut account = account_expiring_at(None);
        assert!(account.has_refresh_token());

        account.refresh_token = Some(String::new());
        assert!(!account.has_refresh_token());

        account.refresh_token = None;
        assert!(!account.has_refresh_token());
    }

    #[test]
    fn test_external_account_debug_redacts() {
        let mut account = account_expiring_at(Some(Utc::now()));
        account.access_token = "super-secret-access".to_string();
        account.refresh_token = Some("super-secret-refresh".to_string());
        let debug_str = format!("{:?}", account);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-access"));
        assert!(!debug_str.contains("super-secret-refresh"));
    }

    #[test]
    fn test_new_account_builder() {
        let user = UserId::new();
        let expires = Utc::now() + Duration::hours(4);
        let payload = NewAccount::new(user, ProviderKind::Dropbox, "tok")
            .with_refresh_token("ref")
            .with_expires_at(expires)
            .with_provider_account_id("dbid:abc")
            .with_extra_data(serde_json::json!({ "email": "a@b.c" }));

        assert_eq!(payload.user_id, user);
        assert_eq!(payload.access_token, "tok");
        assert_eq!(payload.refresh_token.as_deref(), Some("ref"));
        assert_eq!(payload.expires_at, Some(expires));
        assert_eq!(payload.provider_account_id.as_deref(), Some("dbid:abc"));
        assert!(payload.extra_data.is_some());
    }

    #[test]
    fn test_new_account_debug_redacts() {
        let payload = NewAccount::new(UserId::new(), ProviderKind::GoogleDrive, "secret_token")
            .with_refresh_token("secret_refresh");
        let debug_str = format!("{:?}", payload);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_token"));
        assert!(!debug_str.contains("secret_refresh"));
    }
}
