//! Service wiring
//!
//! Chooses a backend for every seam from [`TunerConfig`]: remote backends when
//! an endpoint is configured, local stand-ins otherwise.

use crate::auth::{AuthManager, OAuthIdentityProvider, PasswordHasher, TokenIssuer};
use crate::config::{TunerConfig, MAX_TOKEN_TTL_MINUTES};
use crate::error::{ConfigError, TunerResult};
use crate::objects::LocalObjectStore;
use crate::store::{HttpKvStore, KvStore, MemoryKvStore};
use crate::training::{HttpTrainingService, JobManager, SimulatedTrainingService, TrainingService};
use crate::uploads::UploadService;
use std::sync::Arc;
use std::time::Duration;
use tuner_dataset::SampleCache;

/// Fully wired platform services
#[derive(Debug, Clone)]
pub struct Platform {
    /// Accounts and sessions
    pub auth: Arc<AuthManager>,
    /// Uploads and local ingestion
    pub uploads: Arc<UploadService>,
    /// Managed training
    pub jobs: Arc<JobManager>,
}

impl Platform {
    /// Assemble from already built services
    #[must_use]
    pub fn new(auth: Arc<AuthManager>, uploads: Arc<UploadService>, jobs: Arc<JobManager>) -> Self {
        Self { auth, uploads, jobs }
    }

    /// Build every service from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configured endpoint is invalid or an HTTP client
    /// cannot be built.
    pub fn from_config(config: &TunerConfig) -> TunerResult<Self> {
        let store: Arc<dyn KvStore> = match &config.kv.endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "using remote key-value store");
                Arc::new(HttpKvStore::new(endpoint, Duration::from_secs(config.kv.timeout_secs))?)
            }
            None => {
                tracing::warn!("no key-value endpoint configured, users and jobs are kept in process memory");
                Arc::new(MemoryKvStore::new())
            }
        };

        let ttl = token_ttl(config.auth.token_ttl_minutes)?;
        let tokens = match &config.auth.token_secret {
            Some(secret) => TokenIssuer::from_secret(secret, ttl),
            None => {
                tracing::warn!("no token secret configured, sessions will not survive a restart");
                TokenIssuer::generate(ttl)
            }
        };
        let mut auth = AuthManager::new(
            store.clone(),
            config.kv.users_table.clone(),
            tokens,
            PasswordHasher::new(config.auth.password_iterations),
        );
        if let Some(oauth) = &config.auth.oauth {
            auth = auth.with_identity_provider(Arc::new(OAuthIdentityProvider::new(oauth.clone())?));
        }

        let objects = LocalObjectStore::new(&config.storage.uploads_dir, config.storage.bucket.clone());
        let uploads = Arc::new(UploadService::new(
            Arc::new(objects),
            sample_cache(config.storage.sample_cache_entries, config.storage.sample_cache_ttl_secs),
        ));

        let runtime = Duration::from_secs(config.training.simulated_runtime_secs);
        let simulated = Arc::new(SimulatedTrainingService::new(store.clone(), runtime));
        let service: Arc<dyn TrainingService> = match &config.training.endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "using training service gateway");
                Arc::new(HttpTrainingService::new(
                    endpoint,
                    Duration::from_secs(config.training.timeout_secs),
                )?)
            }
            None => {
                tracing::warn!("no training endpoint configured, all jobs are simulated");
                simulated.clone()
            }
        };
        let mut jobs = JobManager::new(service.clone(), store, uploads.clone(), config.training.clone())
            .with_tables(config.kv.jobs_table.clone(), config.kv.endpoints_table.clone());
        if config.training.demo_fallback && !service.is_simulated() {
            jobs = jobs.with_fallback(simulated);
        }

        tracing::info!(
            uploads_dir = %config.storage.uploads_dir.display(),
            bucket = %config.storage.bucket,
            demo_fallback = jobs.has_fallback(),
            "platform services ready"
        );
        Ok(Self::new(Arc::new(auth), uploads, Arc::new(jobs)))
    }
}

fn token_ttl(minutes: i64) -> Result<chrono::Duration, ConfigError> {
    if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        return Err(ConfigError::invalid(
            "auth.token_ttl_minutes",
            format!("{minutes} is outside 1..={MAX_TOKEN_TTL_MINUTES}"),
        ));
    }
    chrono::Duration::try_minutes(minutes)
        .ok_or_else(|| ConfigError::invalid("auth.token_ttl_minutes", format!("{minutes} overflows")))
}

fn sample_cache(entries: u64, ttl_secs: u64) -> SampleCache {
    if ttl_secs == 0 {
        SampleCache::new(entries)
    } else {
        SampleCache::with_ttl(entries, Duration::from_secs(ttl_secs))
    }
}
