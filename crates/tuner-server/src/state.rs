//! Shared application state

use std::sync::Arc;
use std::time::Instant;
use tuner_core::{Platform, TunerConfig, TunerResult};

/// State handed to every request; cheap to clone
#[derive(Debug, Clone)]
pub struct AppState {
    /// Platform services
    pub platform: Platform,
    /// Effective configuration
    pub config: Arc<TunerConfig>,
    started: Instant,
}

impl AppState {
    /// Create state around built services
    #[must_use]
    pub fn new(platform: Platform, config: TunerConfig) -> Self {
        Self {
            platform,
            config: Arc::new(config),
            started: Instant::now(),
        }
    }

    /// Build services from configuration
    ///
    /// # Errors
    ///
    /// See [`Platform::from_config`].
    pub fn from_config(config: TunerConfig) -> TunerResult<Self> {
        let platform = Platform::from_config(&config)?;
        Ok(Self::new(platform, config))
    }

    /// Seconds since start
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
