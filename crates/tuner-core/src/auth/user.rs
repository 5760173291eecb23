//! Account records

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("Invalid email regex")
});

/// Whether an address looks like a deliverable email
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// How an account signs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email and password
    Email,
    /// Google sign-in
    Google,
}

/// Stored account, keyed by email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable account id
    pub user_id: String,
    /// Sign-in email
    pub email: String,
    /// Display name
    #[serde(default)]
    pub full_name: String,
    /// Encoded password hash (email accounts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Sign-in method
    pub provider: AuthProvider,
    /// Account creation time
    pub created_at: DateTime<Utc>,
    /// Most recent sign-in
    pub last_login: DateTime<Utc>,
    /// Provider subject for Google accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

/// Account as returned to clients (never includes the password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable account id
    pub user_id: String,
    /// Sign-in email
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Sign-in method
    pub provider: AuthProvider,
    /// Account creation time
    pub created_at: DateTime<Utc>,
    /// Most recent sign-in
    pub last_login: DateTime<Utc>,
    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            provider: record.provider,
            created_at: record.created_at,
            last_login: record.last_login,
            profile_picture: record.profile_picture.clone(),
        }
    }
}
