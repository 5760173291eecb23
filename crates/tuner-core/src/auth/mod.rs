//! Accounts, sign-in and bearer tokens
//!
//! User records live in the key-value store keyed by email. Sessions are
//! stateless signed tokens; see [`TokenIssuer`].

use crate::error::{AuthError, AuthResult};
use crate::store::{self, KvStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod oauth;
mod password;
mod token;
mod user;

pub use oauth::{ExternalIdentity, IdentityProvider, OAuthIdentityProvider};
pub use password::PasswordHasher;
pub use token::{TokenClaims, TokenIssuer};
pub use user::{is_valid_email, AuthProvider, UserProfile, UserRecord};

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Sign-in email
    pub email: String,
    /// Plain-text password
    pub password: String,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Sign-in email
    pub email: String,
    /// Plain-text password
    pub password: String,
}

/// Issued session
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    /// Bearer token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: &'static str,
    /// Signed-in account
    pub user: UserProfile,
}

/// Account manager
pub struct AuthManager {
    store: Arc<dyn KvStore>,
    table: String,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("backend", &self.store.backend())
            .field("table", &self.table)
            .field("tokens", &self.tokens)
            .field("oauth", &self.identity.is_some())
            .finish()
    }
}

impl AuthManager {
    /// Create manager over a user table
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        table: impl Into<String>,
        tokens: TokenIssuer,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            tokens,
            hasher,
            identity: None,
        }
    }

    /// Enable third-party sign-in
    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    /// Create an email account and sign it in
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidInput`] for a malformed email or empty password,
    /// [`AuthError::UserExists`] when the email is taken.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthSession> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidInput(format!("invalid email: {email}")));
        }
        if request.password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let now = Utc::now();
        let record = UserRecord {
            user_id: format!("user_{}", uuid::Uuid::new_v4().simple()),
            email: email.to_string(),
            full_name: request.full_name.unwrap_or_default(),
            password_hash: Some(self.hasher.hash(&request.password)),
            provider: AuthProvider::Email,
            created_at: now,
            last_login: now,
            google_id: None,
            profile_picture: None,
        };
        let inserted = self
            .store
            .put_if_absent(&self.table, email, serde_json::to_value(&record)?)
            .await?;
        if !inserted {
            return Err(AuthError::UserExists);
        }

        tracing::info!(user_id = %record.user_id, "registered user");
        self.session(&record)
    }

    /// Sign in with email and password
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] for an unknown email, a Google-only
    /// account or a wrong password.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthSession> {
        let email = request.email.trim();
        let mut record: UserRecord = store::load(self.store.as_ref(), &self.table, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let verified = record
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(&request.password, hash));
        if !verified {
            tracing::debug!("login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        record.last_login = Utc::now();
        store::save(self.store.as_ref(), &self.table, email, &record).await?;
        tracing::info!(user_id = %record.user_id, "user logged in");
        self.session(&record)
    }

    /// Provider redirect URL for third-party sign-in
    ///
    /// # Errors
    ///
    /// [`AuthError::OAuthNotConfigured`] when no provider is set.
    pub fn authorize_url(&self, state: &str) -> AuthResult<String> {
        self.identity()?.authorize_url(state)
    }

    /// Complete third-party sign-in
    ///
    /// The provider must mark the email as verified. Existing accounts (any
    /// provider) with the same email are then signed in and their last login
    /// updated; otherwise a `google_{sub}` account is created.
    ///
    /// # Errors
    ///
    /// [`AuthError::OAuthNotConfigured`], [`AuthError::Provider`] for an
    /// unverified email, or provider and store failures.
    pub async fn oauth_callback(&self, code: &str) -> AuthResult<AuthSession> {
        let identity = self.identity()?.exchange(code).await?;
        if !identity.email_verified {
            tracing::warn!(sub = %identity.sub, "identity provider returned an unverified email");
            return Err(AuthError::Provider("provider did not verify the account email".into()));
        }
        let now = Utc::now();

        let existing: Option<UserRecord> =
            store::load(self.store.as_ref(), &self.table, &identity.email).await?;
        let record = match existing {
            Some(mut record) => {
                record.last_login = now;
                record
            }
            None => {
                tracing::info!(sub = %identity.sub, "creating account from identity provider");
                UserRecord {
                    user_id: format!("google_{}", identity.sub),
                    email: identity.email.clone(),
                    full_name: identity.name,
                    password_hash: None,
                    provider: AuthProvider::Google,
                    created_at: now,
                    last_login: now,
                    google_id: Some(identity.sub),
                    profile_picture: identity.picture,
                }
            }
        };
        store::save(self.store.as_ref(), &self.table, &identity.email, &record).await?;
        self.session(&record)
    }

    /// Verify a bearer token
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidToken`] or [`AuthError::TokenExpired`].
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        self.tokens.verify(token)
    }

    /// Account behind verified claims
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`] if the account was removed.
    pub async fn current_user(&self, claims: &TokenClaims) -> AuthResult<UserProfile> {
        let record: UserRecord = store::load(self.store.as_ref(), &self.table, &claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserProfile::from(&record))
    }

    fn identity(&self) -> AuthResult<&Arc<dyn IdentityProvider>> {
        self.identity.as_ref().ok_or(AuthError::OAuthNotConfigured)
    }

    fn session(&self, record: &UserRecord) -> AuthResult<AuthSession> {
        Ok(AuthSession {
            access_token: self.tokens.issue(&record.email, &record.user_id)?,
            token_type: "bearer",
            user: UserProfile::from(record),
        })
    }
}
