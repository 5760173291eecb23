//! HTTP request handlers
//!
//! Thin adapters: extract, call the platform, reply with JSON.

use crate::error::{reject, ApiError};
use crate::state::AppState;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tuner_core::training::InvokeRequest;
use tuner_core::{
    AuthError, CreateJobRequest, DeployRequest, LoginRequest, RegisterRequest, StartTrainingRequest,
    TokenClaims, UploadError,
};
use warp::multipart::{FormData, Part};
use warp::{Buf, Rejection, Reply};

/// Multipart field carrying uploaded files
pub const FILES_FIELD: &str = "files";

/// Health response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since start
    pub uptime_secs: u64,
    /// `simulated` or `gateway`
    pub training_backend: String,
    /// Whether service failures degrade to demo data
    pub demo_fallback: bool,
}

/// OAuth redirect query
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallback {
    /// Authorization code
    pub code: String,
    /// Opaque state echoed by the provider
    #[serde(default)]
    pub state: Option<String>,
}

/// Cost estimate request
#[derive(Debug, Clone, Deserialize)]
pub struct CostEstimateRequest {
    /// Instance type; configured default when absent
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Training hours
    #[serde(default = "default_hours")]
    pub hours: f64,
}

fn default_hours() -> f64 {
    1.0
}

/// Health check
pub async fn health(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        uptime_secs: state.uptime_secs(),
        training_backend: state.platform.jobs.backend().to_string(),
        demo_fallback: state.platform.jobs.has_fallback(),
    }))
}

/// Create an account
pub async fn register(request: RegisterRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let session = state.platform.auth.register(request).await.map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&session),
        warp::http::StatusCode::CREATED,
    ))
}

/// Sign in with email and password
pub async fn login(request: LoginRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let session = state.platform.auth.login(request).await.map_err(reject)?;
    Ok(warp::reply::json(&session))
}

/// Signed-in account
pub async fn me(claims: TokenClaims, state: AppState) -> Result<impl Reply, Rejection> {
    let user = state.platform.auth.current_user(&claims).await.map_err(reject)?;
    Ok(warp::reply::json(&user))
}

/// Redirect to the identity provider
pub async fn oauth_authorize(state: AppState) -> Result<impl Reply, Rejection> {
    let csrf = uuid::Uuid::new_v4().simple().to_string();
    let url = state.platform.auth.authorize_url(&csrf).map_err(reject)?;
    let uri: warp::http::Uri = url
        .parse()
        .map_err(|e| reject(AuthError::Provider(format!("authorize url: {e}"))))?;
    Ok(warp::redirect::found(uri))
}

/// Complete third-party sign-in
pub async fn oauth_callback(query: OAuthCallback, state: AppState) -> Result<impl Reply, Rejection> {
    tracing::debug!(has_state = query.state.is_some(), "oauth callback");
    let session = state.platform.auth.oauth_callback(&query.code).await.map_err(reject)?;
    Ok(warp::reply::json(&session))
}

async fn read_part(part: Part) -> Result<Vec<u8>, ApiError> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, mut chunk| async move {
            while chunk.has_remaining() {
                let slice = chunk.chunk();
                let len = slice.len();
                bytes.extend_from_slice(slice);
                chunk.advance(len);
            }
            Ok(bytes)
        })
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart body: {e}")))
}

/// Collect `(file name, bytes)` from a multipart form
///
/// Each part is read to the end before the next one is requested.
///
/// # Errors
///
/// [`UploadError::InvalidFileName`] for a file part without a name and
/// [`ApiError::BadRequest`] for a malformed body.
pub async fn read_files(mut form: FormData) -> Result<Vec<(String, Vec<u8>)>, ApiError> {
    let mut files = Vec::new();
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart body: {e}")))?
    {
        let Some(name) = part.filename().map(str::to_string) else {
            if part.name() == FILES_FIELD {
                return Err(UploadError::InvalidFileName(String::new()).into());
            }
            read_part(part).await?;
            continue;
        };
        files.push((name, read_part(part).await?));
    }
    Ok(files)
}

/// Store uploaded files
pub async fn upload(claims: TokenClaims, form: FormData, state: AppState) -> Result<impl Reply, Rejection> {
    let files = read_files(form).await.map_err(reject)?;
    let summary = state
        .platform
        .uploads
        .upload(&claims.uid, files)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&summary))
}

/// Normalize uploaded files and report what was found
pub async fn start_training(
    claims: TokenClaims,
    request: StartTrainingRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let run = state
        .platform
        .uploads
        .start_training(&claims.uid, request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&run))
}

/// Base-model catalog
pub async fn models(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.platform.jobs.catalog()))
}

/// Submit a managed fine-tuning job
pub async fn create_job(
    claims: TokenClaims,
    request: CreateJobRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let created = state.platform.jobs.create(&claims.uid, request).await.map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&created),
        warp::http::StatusCode::CREATED,
    ))
}

/// Caller's jobs
pub async fn list_jobs(claims: TokenClaims, state: AppState) -> Result<impl Reply, Rejection> {
    let jobs = state.platform.jobs.list(&claims.uid).await.map_err(reject)?;
    Ok(warp::reply::json(&jobs))
}

/// Job status
pub async fn job_status(job_name: String, claims: TokenClaims, state: AppState) -> Result<impl Reply, Rejection> {
    let status = state
        .platform
        .jobs
        .status(&claims.uid, &job_name)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&status))
}

/// Stop a job
pub async fn stop_job(job_name: String, claims: TokenClaims, state: AppState) -> Result<impl Reply, Rejection> {
    let stopped = state
        .platform
        .jobs
        .stop(&claims.uid, &job_name)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&stopped))
}

/// Deploy a completed job
pub async fn deploy_job(
    job_name: String,
    claims: TokenClaims,
    request: DeployRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let deployment = state
        .platform
        .jobs
        .deploy(&claims.uid, &job_name, request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&deployment))
}

/// Price a training run
pub async fn cost_estimate(request: CostEstimateRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let estimate = state
        .platform
        .jobs
        .cost_estimate(request.instance_type.as_deref(), request.hours)
        .map_err(reject)?;
    Ok(warp::reply::json(&estimate))
}

/// Endpoint status
pub async fn endpoint_status(
    endpoint_name: String,
    claims: TokenClaims,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let status = state
        .platform
        .jobs
        .endpoint_status(&claims.uid, &endpoint_name)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&status))
}

/// Generate text on an endpoint
pub async fn invoke_endpoint(
    endpoint_name: String,
    claims: TokenClaims,
    request: InvokeRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let result = state
        .platform
        .jobs
        .invoke(&claims.uid, &endpoint_name, request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&result))
}
