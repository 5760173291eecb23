//! Third-party sign-in via the OAuth authorization-code flow

use crate::config::OAuthConfig;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

/// Identity asserted by a provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalIdentity {
    /// Provider subject
    pub sub: String,
    /// Email claimed by the provider
    pub email: String,
    /// Whether the provider verified `email`; absent means unverified
    #[serde(default)]
    pub email_verified: bool,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL
    #[serde(default)]
    pub picture: Option<String>,
}

/// Identity provider seam
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// URL the browser is redirected to
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Provider`] if the configured endpoint is invalid.
    fn authorize_url(&self, state: &str) -> AuthResult<String>;

    /// Exchange an authorization code for the user's identity
    async fn exchange(&self, code: &str) -> AuthResult<ExternalIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Standard OAuth 2.0 / OpenID Connect provider over reqwest
#[derive(Debug, Clone)]
pub struct OAuthIdentityProvider {
    client: Client,
    config: OAuthConfig,
}

impl OAuthIdentityProvider {
    /// Create provider client
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Provider`] if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    fn authorize_url(&self, state: &str) -> AuthResult<String> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Provider(format!("authorize url: {e}")))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> AuthResult<ExternalIdentity> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "token exchange returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "userinfo returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OAuthIdentityProvider {
        OAuthIdentityProvider::new(OAuthConfig {
            client_id: "client-123".into(),
            client_secret: "s".into(),
            redirect_uri: "http://localhost:5000/api/auth/oauth/callback".into(),
            ..OAuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn authorize_url_carries_parameters() {
        let url = Url::parse(&provider().authorize_url("xyz").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["redirect_uri"], "http://localhost:5000/api/auth/oauth/callback");
    }

    #[test]
    fn identity_parses_userinfo() {
        let identity: ExternalIdentity = serde_json::from_str(
            r#"{"sub": "42", "email": "g@example.com", "name": "G", "picture": "http://p", "email_verified": true}"#,
        )
        .unwrap();
        assert_eq!(identity.sub, "42");
        assert_eq!(identity.picture.as_deref(), Some("http://p"));
        assert!(identity.email_verified);

        let identity: ExternalIdentity =
            serde_json::from_str(r#"{"sub": "43", "email": "h@example.com"}"#).unwrap();
        assert!(!identity.email_verified);
    }
}
