//! API errors and rejection handling
//!
//! Every failure leaves the server as `{"error": <kind>, "message": <text>}`
//! with the status code of its kind.

use serde::Serialize;
use std::convert::Infallible;
use tuner_core::{AuthError, TrainingError, TunerError, UploadError};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Error raised by a handler
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Platform operation failed
    #[error(transparent)]
    Tuner(#[from] TunerError),

    /// Request could not be interpreted
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// Request body over its limit
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Limit in bytes
        limit: u64,
    },
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Tuner(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Machine-readable error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tuner(e) => e.kind(),
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Tuner(err.into())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self::Tuner(err.into())
    }
}

impl From<TrainingError> for ApiError {
    fn from(err: TrainingError) -> Self {
        Self::Tuner(err.into())
    }
}

/// Wrap an error as a warp rejection
pub fn reject(err: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(err.into())
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    /// Error kind
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

fn error_reply(status: StatusCode, kind: &str, message: String) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = ErrorBody {
        error: kind.to_string(),
        message,
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

/// Convert any rejection into a JSON error response
///
/// # Errors
///
/// Never fails.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(api) = err.find::<ApiError>() {
        let status = api.status();
        if status.is_server_error() {
            tracing::error!(error = %api, %status, "request failed");
        } else {
            tracing::debug!(error = %api, %status, "request rejected");
        }
        return Ok(error_reply(status, api.kind(), api.to_string()));
    }

    let (status, kind, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "resource not found".to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::LengthRequired>() {
        (StatusCode::LENGTH_REQUIRED, "bad_request", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "bad_request", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", e.to_string())
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error".to_string(),
        )
    };
    Ok(error_reply(status, kind, message))
}
