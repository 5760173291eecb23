//! Route table
//!
//! ```text
//! GET  /api/health                         health
//! POST /api/auth/register                  register
//! POST /api/auth/login                     login
//! GET  /api/auth/me                        current user        (bearer)
//! GET  /api/auth/oauth/authorize           302 to provider
//! GET  /api/auth/oauth/callback            exchange code
//! POST /api/upload                         multipart upload    (bearer)
//! POST /api/start-training                 ingestion run       (bearer)
//! GET  /api/models                         base-model catalog
//! POST /api/training/jobs                  create job          (bearer)
//! GET  /api/training/jobs                  list jobs           (bearer)
//! GET  /api/training/jobs/{name}           job status          (bearer)
//! POST /api/training/jobs/{name}/stop      stop job            (bearer)
//! POST /api/training/jobs/{name}/deploy    deploy job          (bearer)
//! POST /api/training/cost-estimate         cost estimate
//! GET  /api/endpoints/{name}               endpoint status     (bearer)
//! POST /api/endpoints/{name}/invoke        generate text       (bearer)
//! GET  /*                                  static frontend
//! ```

use crate::error::{handle_rejection, reject, ApiError};
use crate::handlers;
use crate::state::AppState;
use futures::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tuner_core::{AuthError, TokenClaims};
use warp::filters::BoxedFilter;
use warp::{Buf, Filter, Rejection, Reply};

/// Largest accepted JSON body
pub const JSON_BODY_LIMIT: u64 = 1024 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// Read at most `limit` bytes of a body stream
async fn read_limited<S, B>(body: S, limit: u64) -> Result<Vec<u8>, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    let mut body = Box::pin(body);
    let mut bytes = Vec::new();
    while let Some(mut chunk) = body
        .try_next()
        .await
        .map_err(|e| reject(ApiError::BadRequest(format!("request body: {e}"))))?
    {
        if (bytes.len() + chunk.remaining()) as u64 > limit {
            return Err(reject(ApiError::PayloadTooLarge { limit }));
        }
        while chunk.has_remaining() {
            let slice = chunk.chunk();
            let len = slice.len();
            bytes.extend_from_slice(slice);
            chunk.advance(len);
        }
    }
    Ok(bytes)
}

/// JSON body that may be absent; an empty body yields `T::default()`
///
/// No `Content-Length` is required. A declared length over the limit is
/// refused up front and a streamed body stops being read once it passes it.
fn optional_json_body<T: DeserializeOwned + Default + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(|length: Option<u64>, body| async move {
            if length.is_some_and(|len| len > JSON_BODY_LIMIT) {
                return Err(reject(ApiError::PayloadTooLarge { limit: JSON_BODY_LIMIT }));
            }
            let body = read_limited(body, JSON_BODY_LIMIT).await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(T::default());
            }
            serde_json::from_slice(&body).map_err(|e| reject(ApiError::BadRequest(e.to_string())))
        })
}

/// Extract the `Bearer` token from an `Authorization` header value
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verified claims of the request's bearer token
pub fn authenticated(state: AppState) -> impl Filter<Extract = (TokenClaims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            let token = header
                .as_deref()
                .and_then(bearer_token)
                .ok_or_else(|| reject(AuthError::MissingToken))?;
            state.platform.auth.verify(token).map_err(reject)
        }
    })
}

fn auth_routes(state: &AppState) -> BoxedFilter<(impl Reply,)> {
    let register = warp::path!("api" / "auth" / "register")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::register);

    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::login);

    let me = warp::path!("api" / "auth" / "me")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::me);

    let authorize = warp::path!("api" / "auth" / "oauth" / "authorize")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::oauth_authorize);

    let callback = warp::path!("api" / "auth" / "oauth" / "callback")
        .and(warp::get())
        .and(warp::query::<handlers::OAuthCallback>())
        .and(with_state(state.clone()))
        .and_then(handlers::oauth_callback);

    register.or(login).or(me).or(authorize).or(callback).boxed()
}

fn dataset_routes(state: &AppState) -> BoxedFilter<(impl Reply,)> {
    let upload = warp::path!("api" / "upload")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(warp::multipart::form().max_length(state.config.server.max_upload_bytes))
        .and(with_state(state.clone()))
        .and_then(handlers::upload);

    let start_training = warp::path!("api" / "start-training")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::start_training);

    upload.or(start_training).boxed()
}

fn training_routes(state: &AppState) -> BoxedFilter<(impl Reply,)> {
    let models = warp::path!("api" / "models")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::models);

    let create = warp::path!("api" / "training" / "jobs")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::create_job);

    let list = warp::path!("api" / "training" / "jobs")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_jobs);

    let status = warp::path!("api" / "training" / "jobs" / String)
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::job_status);

    let stop = warp::path!("api" / "training" / "jobs" / String / "stop")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::stop_job);

    let deploy = warp::path!("api" / "training" / "jobs" / String / "deploy")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(optional_json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::deploy_job);

    let cost = warp::path!("api" / "training" / "cost-estimate")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::cost_estimate);

    let endpoint = warp::path!("api" / "endpoints" / String)
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::endpoint_status);

    let invoke = warp::path!("api" / "endpoints" / String / "invoke")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::invoke_endpoint);

    models
        .or(create)
        .or(list)
        .or(status)
        .or(stop)
        .or(deploy)
        .or(cost)
        .or(endpoint)
        .or(invoke)
        .boxed()
}

/// Frontend files, with `index.html` for client-side routes
fn static_files(dir: Option<PathBuf>) -> BoxedFilter<(Box<dyn Reply>,)> {
    let Some(dir) = dir else {
        return warp::any()
            .and_then(|| async { Err::<Box<dyn Reply>, _>(warp::reject::not_found()) })
            .boxed();
    };
    let index = dir.join("index.html");
    let not_api = warp::path::full()
        .and_then(|path: warp::path::FullPath| async move {
            if path.as_str().starts_with("/api") {
                Err(warp::reject::not_found())
            } else {
                Ok(())
            }
        })
        .untuple_one();

    warp::get()
        .and(not_api)
        .and(warp::fs::dir(dir).or(warp::fs::file(index)).unify())
        .map(|file: warp::fs::File| Box::new(file) as Box<dyn Reply>)
        .boxed()
}

/// Every route, with error rendering and request logging
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::health);

    health
        .or(auth_routes(&state))
        .or(dataset_routes(&state))
        .or(training_routes(&state))
        .or(static_files(state.config.server.static_dir.clone()))
        .recover(handle_rejection)
        .with(warp::log("llm_tuner::http"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::hyper::body::Bytes;

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Bytes, warp::Error>> {
        let chunks: Vec<Result<Bytes, warp::Error>> = sizes.iter().map(|n| Ok(Bytes::from(vec![b' '; *n]))).collect();
        futures::stream::iter(chunks)
    }

    #[tokio::test]
    async fn streamed_body_within_limit_is_collected() {
        let body = read_limited(chunks(&[4, 4, 2]), 10).await.unwrap();
        assert_eq!(body.len(), 10);
    }

    #[tokio::test]
    async fn streamed_body_stops_past_limit() {
        let err = read_limited(chunks(&[6, 6, 6]), 10).await.unwrap_err();
        let api = err.find::<ApiError>().unwrap();
        assert_eq!(api.status(), warp::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
