//! Testing utilities for the LLM Tuner workspace
//!
//! Shared fixtures: sample dataset files and a locally wired platform.

#![allow(missing_docs)]

use std::path::Path;
use tempfile::TempDir;
use tuner_core::{Platform, RegisterRequest, TunerConfig};

pub const TEST_SECRET: &str = "test-secret-for-signing-tokens";
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Unreachable gateway; every request fails with a connection error
pub const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9/api";

pub const SAMPLE_TXT: &str = "short\nThe quick brown fox jumps over the lazy dog.\n\n   \nA second line that is long enough.\n";
pub const SAMPLE_CSV: &str = "id,text\n1,first row of data\n\n2,second row of data\n";
pub const SAMPLE_JSON: &str = r#"[{"text": "hello"}, {"content": "world"}, {"description": "described"}, "plain"]"#;
pub const SAMPLE_JSONL: &str = "{\"text\": \"jsonl text\"}\n{\"content\": \"jsonl content\"}\nnot json at all\n";

/// Configuration for a fully local platform rooted at `dir`
///
/// Simulated jobs complete immediately.
pub fn test_config(dir: &Path) -> TunerConfig {
    let mut config = TunerConfig::default()
        .with_uploads_dir(dir.join("uploads"))
        .with_token_secret(TEST_SECRET);
    config.training.simulated_runtime_secs = 0;
    config
}

/// Configuration whose training gateway is unreachable
pub fn failing_gateway_config(dir: &Path, demo_fallback: bool) -> TunerConfig {
    let mut config = test_config(dir).with_demo_fallback(demo_fallback);
    config.training.endpoint = Some(UNREACHABLE_GATEWAY.to_string());
    config.training.timeout_secs = 1;
    config
}

/// Platform plus the temporary directory backing its uploads
pub struct TestPlatform {
    pub platform: Platform,
    pub config: TunerConfig,
    pub dir: TempDir,
}

impl TestPlatform {
    pub fn new() -> Self {
        Self::with_config(test_config)
    }

    pub fn with_config(build: impl FnOnce(&Path) -> TunerConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = build(dir.path());
        let platform = Platform::from_config(&config).unwrap();
        Self {
            platform,
            config,
            dir,
        }
    }

    /// Register an account; returns `(token, user_id)`
    pub async fn register(&self, email: &str) -> (String, String) {
        let session = self
            .platform
            .auth
            .register(RegisterRequest {
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
                full_name: None,
            })
            .await
            .unwrap();
        (session.access_token, session.user.user_id)
    }

    /// Store a file for a user
    pub async fn upload(&self, user_id: &str, name: &str, content: &str) {
        self.platform
            .uploads
            .store(user_id, name, content.as_bytes().to_vec())
            .await
            .unwrap();
    }
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self::new()
    }
}
