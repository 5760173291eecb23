//! Error types for LLM Tuner core
//!
//! One enum per concern, folded into [`TunerError`] at the API boundary:
//! - Store failures (key-value and object storage)
//! - Authentication failures
//! - Upload validation
//! - Managed training failures
//! - Configuration errors

use std::path::PathBuf;
use tuner_dataset::DatasetError;

/// Main platform error type
#[derive(Debug, thiserror::Error)]
pub enum TunerError {
    /// Dataset decoding/serialization failed
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Storage backend failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Authentication failed
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Upload rejected
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Training operation failed
    #[error("training error: {0}")]
    Training(#[from] TrainingError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TunerError {
    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Dataset(e) => dataset_status(e),
            Self::Store(e) => e.status_code(),
            Self::Auth(e) => e.status_code(),
            Self::Upload(e) => e.status_code(),
            Self::Training(e) => e.status_code(),
            Self::Config(_) => 500,
        }
    }

    /// Short machine-readable error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.status_code() {
            400 => "bad_request",
            401 => "unauthorized",
            404 => "not_found",
            409 => "conflict",
            413 => "payload_too_large",
            501 => "not_implemented",
            502 => "service_error",
            _ => "internal_error",
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Training(e) => e.is_retryable(),
            Self::Auth(AuthError::Store(e)) => e.is_retryable(),
            _ => false,
        }
    }
}

fn dataset_status(err: &DatasetError) -> u16 {
    match err {
        DatasetError::InvalidEncoding { .. } => 400,
        DatasetError::Serialization(_) => 500,
    }
}

/// Result type alias for platform operations
pub type TunerResult<T> = Result<T, TunerError>;

/// Key-value and object storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Remote backend failed or returned an unexpected status
    #[error("backend error: {0}")]
    Backend(String),

    /// Stored document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object key is empty or escapes the store root
    #[error("invalid key: '{0}'")]
    InvalidKey(String),

    /// Filesystem error
    #[error("io error at {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Backend(_) => 502,
            Self::InvalidKey(_) => 400,
            Self::Serialization(_) | Self::Io { .. } => 500,
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email already registered
    #[error("user already exists")]
    UserExists,

    /// Unknown email or wrong password
    #[error("incorrect email or password")]
    InvalidCredentials,

    /// No bearer token on the request
    #[error("missing bearer token")]
    MissingToken,

    /// Token malformed or signature invalid
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token past its expiry
    #[error("token expired")]
    TokenExpired,

    /// Token valid but the account is gone
    #[error("user not found")]
    UserNotFound,

    /// Request field failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Third-party sign-in is not configured
    #[error("oauth sign-in is not configured")]
    OAuthNotConfigured,

    /// Identity provider rejected the exchange or was unreachable
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Claims could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// User store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UserExists => 409,
            Self::InvalidCredentials
            | Self::MissingToken
            | Self::InvalidToken(_)
            | Self::TokenExpired
            | Self::UserNotFound => 401,
            Self::InvalidInput(_) => 400,
            Self::OAuthNotConfigured => 501,
            Self::Provider(_) => 502,
            Self::Serialization(_) => 500,
            Self::Store(e) => e.status_code(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Result type alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Request carried no files
    #[error("no files uploaded")]
    NoFiles,

    /// File name missing or unsafe
    #[error("invalid filename: '{0}'")]
    InvalidFileName(String),

    /// Body larger than the configured limit
    #[error("upload exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit
        limit: u64,
    },

    /// File content rejected
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Object store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadError {
    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoFiles | Self::InvalidFileName(_) => 400,
            Self::TooLarge { .. } => 413,
            Self::Dataset(e) => dataset_status(e),
            Self::Store(e) => e.status_code(),
        }
    }
}

/// Result type alias for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Managed training errors
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    /// Job unknown or owned by someone else
    #[error("training job not found: {0}")]
    JobNotFound(String),

    /// Endpoint unknown or owned by someone else
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// A job record with this name already exists
    #[error("training job {0} already exists")]
    JobExists(String),

    /// Job cannot be deployed in its current state
    #[error("training job {job_name} is {status}, not Completed")]
    NotReady {
        /// Job name
        job_name: String,
        /// Current status
        status: String,
    },

    /// Request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced files produced no samples
    #[error("no training samples found in the selected files")]
    NoTrainingData,

    /// External training service failed
    #[error("training service failed during {operation}: {message}")]
    Service {
        /// Operation being attempted
        operation: &'static str,
        /// Error detail
        message: String,
    },

    /// Upload access failed while preparing data
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Training data could not be serialized
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Job record store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrainingError {
    /// Create service error for an operation
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            operation,
            message: message.into(),
        }
    }

    /// Whether this error came from the external service
    #[inline]
    #[must_use]
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::JobNotFound(_) | Self::EndpointNotFound(_) => 404,
            Self::NotReady { .. } | Self::JobExists(_) => 409,
            Self::InvalidRequest(_) | Self::NoTrainingData => 400,
            Self::Service { .. } => 502,
            Self::Upload(e) => e.status_code(),
            Self::Dataset(e) => dataset_status(e),
            Self::Store(e) => e.status_code(),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service { .. } => true,
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias for training operations
pub type TrainingResult<T> = Result<T, TrainingError>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Effective config could not be rendered
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range or malformed
    #[error("invalid value for {field}: {message}")]
    Invalid {
        /// Dotted field path or env var
        field: String,
        /// What is wrong
        message: String,
    },
}

impl ConfigError {
    /// Create invalid value error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
