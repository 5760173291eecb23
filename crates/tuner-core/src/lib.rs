//! LLM Tuner core - accounts, uploads and managed fine-tuning
//!
//! The platform is a thin layer over external services:
//! - Accounts and stateless signed sessions ([`auth`])
//! - Dataset uploads and local ingestion runs ([`uploads`])
//! - Managed fine-tuning jobs and inference endpoints ([`training`])
//!
//! Each external dependency sits behind an async trait ([`KvStore`],
//! [`ObjectStore`], [`TrainingService`], [`IdentityProvider`]) and
//! [`Platform::from_config`] picks the implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use tuner_core::{Platform, TunerConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TunerConfig::load(None)?;
//! let platform = Platform::from_config(&config)?;
//! println!("{} base models", platform.jobs.catalog().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod auth;
pub mod config;
pub mod error;
pub mod hyperparameters;
pub mod objects;
pub mod platform;
pub mod store;
pub mod training;
pub mod uploads;

pub use auth::{
    AuthManager, AuthProvider, AuthSession, IdentityProvider, LoginRequest, RegisterRequest,
    TokenClaims, TokenIssuer, UserProfile,
};
pub use config::{LogFormat, TunerConfig};
pub use error::{
    AuthError, ConfigError, StoreError, TrainingError, TunerError, TunerResult, UploadError,
};
pub use hyperparameters::Hyperparameters;
pub use objects::{LocalObjectStore, ObjectStore};
pub use platform::Platform;
pub use store::{HttpKvStore, KvStore, MemoryKvStore};
pub use training::{
    CreateJobRequest, DeployRequest, InvokeRequest, JobManager, JobStatus, SimulatedTrainingService,
    TrainingService,
};
pub use uploads::{StartTrainingRequest, UploadService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with LLM Tuner core
    pub use crate::{
        AuthManager, CreateJobRequest, Hyperparameters, JobManager, JobStatus, Platform,
        StartTrainingRequest, TunerConfig, TunerError, TunerResult, UploadService,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn register_upload_and_train() {
        let dir = tempfile::tempdir().unwrap();
        let config = TunerConfig::default()
            .with_uploads_dir(dir.path())
            .with_token_secret("integration-test-secret");
        let platform = Platform::from_config(&config).unwrap();

        let session = platform
            .auth
            .register(RegisterRequest {
                email: "trainer@example.com".into(),
                password: "hunter22".into(),
                full_name: Some("Trainer".into()),
            })
            .await
            .unwrap();
        let claims = platform.auth.verify(&session.access_token).unwrap();

        platform
            .uploads
            .store(&claims.uid, "corpus.txt", b"a line that is long enough to keep\n".to_vec())
            .await
            .unwrap();
        let created = platform
            .jobs
            .create(
                &claims.uid,
                CreateJobRequest {
                    base_model: "huggingface-llm-llama-2-7b-f".into(),
                    hyperparameters: Hyperparameters::default(),
                    files: vec!["corpus.txt".into()],
                    instance_type: None,
                },
            )
            .await
            .unwrap();

        // No gateway configured: every job is simulated and flagged
        assert!(created.demo);
        assert_eq!(platform.jobs.list(&claims.uid).await.unwrap().len(), 1);
    }

    #[test]
    fn errors_map_to_status_codes() {
        let err: TunerError = TrainingError::JobNotFound("x".into()).into();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.kind(), "not_found");

        let err: TunerError = AuthError::UserExists.into();
        assert_eq!(err.kind(), "conflict");
    }
}
