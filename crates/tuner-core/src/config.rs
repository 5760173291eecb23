//! Platform configuration
//!
//! Loaded from an optional TOML file, then overridden by `TUNER_*` environment
//! variables. Every section has working defaults so an empty file (or none)
//! yields a runnable single-process setup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Minimum length of a configured token secret
pub const MIN_SECRET_LEN: usize = 16;

/// Longest accepted token lifetime (30 days)
pub const MAX_TOKEN_TTL_MINUTES: i64 = 30 * 24 * 60;

const REDACTED: &str = "<redacted>";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// HTTP server
    pub server: ServerConfig,
    /// Accounts and tokens
    pub auth: AuthConfig,
    /// Upload storage
    pub storage: StorageConfig,
    /// Key-value store for users and job records
    pub kv: KvConfig,
    /// Managed training service
    pub training: TrainingConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl TunerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an optional file, then apply process environment overrides
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if a
    /// value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `TUNER_*` overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `TUNER_BIND` is not a socket address.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TUNER_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|e| ConfigError::invalid("TUNER_BIND", format!("{bind}: {e}")))?;
        }
        if let Some(secret) = lookup("TUNER_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Some(endpoint) = lookup("TUNER_KV_ENDPOINT") {
            self.kv.endpoint = Some(endpoint);
        }
        if let Some(endpoint) = lookup("TUNER_TRAINING_ENDPOINT") {
            self.training.endpoint = Some(endpoint);
        }
        if let Some(bucket) = lookup("TUNER_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(dir) = lookup("TUNER_UPLOADS_DIR") {
            self.storage.uploads_dir = PathBuf::from(dir);
        }

        let client_id = lookup("TUNER_OAUTH_CLIENT_ID");
        let client_secret = lookup("TUNER_OAUTH_CLIENT_SECRET");
        let redirect_uri = lookup("TUNER_OAUTH_REDIRECT_URI");
        if client_id.is_some() || client_secret.is_some() || redirect_uri.is_some() {
            let oauth = self.auth.oauth.get_or_insert_with(OAuthConfig::default);
            if let Some(id) = client_id {
                oauth.client_id = id;
            }
            if let Some(secret) = client_secret {
                oauth.client_secret = secret;
            }
            if let Some(uri) = redirect_uri {
                oauth.redirect_uri = uri;
            }
        }
        Ok(self)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = &self.auth.token_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::invalid(
                    "auth.token_secret",
                    format!("must be at least {MIN_SECRET_LEN} characters"),
                ));
            }
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::invalid("auth.token_ttl_minutes", "must be positive"));
        }
        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::invalid(
                "auth.token_ttl_minutes",
                format!("must be at most {MAX_TOKEN_TTL_MINUTES}"),
            ));
        }
        if self.auth.password_iterations == 0 {
            return Err(ConfigError::invalid("auth.password_iterations", "must be positive"));
        }
        if let Some(oauth) = &self.auth.oauth {
            for (field, value) in [
                ("auth.oauth.client_id", &oauth.client_id),
                ("auth.oauth.redirect_uri", &oauth.redirect_uri),
            ] {
                if value.is_empty() {
                    return Err(ConfigError::invalid(field, "must not be empty"));
                }
            }
            for (field, url) in [
                ("auth.oauth.authorize_url", &oauth.authorize_url),
                ("auth.oauth.token_url", &oauth.token_url),
                ("auth.oauth.userinfo_url", &oauth.userinfo_url),
            ] {
                check_url(field, url)?;
            }
        }
        if let Some(endpoint) = &self.kv.endpoint {
            check_url("kv.endpoint", endpoint)?;
        }
        if let Some(endpoint) = &self.training.endpoint {
            check_url("training.endpoint", endpoint)?;
        }
        if self.storage.bucket.is_empty() {
            return Err(ConfigError::invalid("storage.bucket", "must not be empty"));
        }
        Ok(())
    }

    /// Render as TOML with secrets replaced
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut copy = self.clone();
        if copy.auth.token_secret.is_some() {
            copy.auth.token_secret = Some(REDACTED.to_string());
        }
        if let Some(oauth) = copy.auth.oauth.as_mut() {
            if !oauth.client_secret.is_empty() {
                oauth.client_secret = REDACTED.to_string();
            }
        }
        Ok(toml::to_string_pretty(&copy)?)
    }

    /// With bind address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.server.bind = bind;
        self
    }

    /// With uploads directory
    #[inline]
    #[must_use]
    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.uploads_dir = dir.into();
        self
    }

    /// With token secret
    #[inline]
    #[must_use]
    pub fn with_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth.token_secret = Some(secret.into());
        self
    }

    /// With demo fallback on or off
    #[inline]
    #[must_use]
    pub fn with_demo_fallback(mut self, enabled: bool) -> Self {
        self.training.demo_fallback = enabled;
        self
    }
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid(field, format!("{value}: {e}")))
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Directory served for non-API paths, if it exists
    pub static_dir: Option<PathBuf>,
    /// Maximum multipart body size in bytes
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            static_dir: Some(PathBuf::from("dist/public")),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Account and token settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret the token signing key is derived from; random when absent
    pub token_secret: Option<String>,
    /// Token lifetime
    pub token_ttl_minutes: i64,
    /// PBKDF2-HMAC-SHA256 rounds for password hashing
    pub password_iterations: u32,
    /// Third-party sign-in
    pub oauth: Option<OAuthConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_minutes: 30,
            password_iterations: 100_000,
            oauth: None,
        }
    }
}

/// OAuth authorization-code settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Client identifier
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Callback registered with the provider
    pub redirect_uri: String,
    /// Provider authorization endpoint
    pub authorize_url: String,
    /// Provider token endpoint
    pub token_url: String,
    /// Provider userinfo endpoint
    pub userinfo_url: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Upload storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored objects
    pub uploads_dir: PathBuf,
    /// Bucket name used in object URIs handed to the training service
    pub bucket: String,
    /// Sample cache capacity (entries)
    pub sample_cache_entries: u64,
    /// Seconds a cached sample list lives; 0 keeps entries until evicted
    pub sample_cache_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            bucket: "llm-tuner-platform".to_string(),
            sample_cache_entries: 1_000,
            sample_cache_ttl_secs: 3_600,
        }
    }
}

/// Key-value store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// REST endpoint; in-memory store when absent
    pub endpoint: Option<String>,
    /// Table holding user records (keyed by email)
    pub users_table: String,
    /// Table holding training job records
    pub jobs_table: String,
    /// Table holding endpoint records
    pub endpoints_table: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            users_table: "LLM_Tuning_User_Login_info".to_string(),
            jobs_table: "LLM_Tuning_Training_Jobs".to_string(),
            endpoints_table: "LLM_Tuning_Endpoints".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Managed training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Training service gateway; simulated service when absent
    pub endpoint: Option<String>,
    /// Role the service assumes for jobs
    pub execution_role: String,
    /// Instance type when the request names none
    pub default_instance_type: String,
    /// Answer with flagged demo data when the service fails
    pub demo_fallback: bool,
    /// How long a simulated job stays `InProgress`
    pub simulated_runtime_secs: u64,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            execution_role: "arn:aws:iam::000000000000:role/LLMTunerExecutionRole".to_string(),
            default_instance_type: "ml.g5.2xlarge".to_string(),
            demo_fallback: true,
            simulated_runtime_secs: 600,
            timeout_secs: 30,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
