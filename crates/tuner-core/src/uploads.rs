//! Dataset uploads and local ingestion runs
//!
//! Files are stored per user at `users/{uid}/uploads/{name}`. Content is
//! decoded once at upload time so non-UTF-8 files never reach storage.

use crate::error::{UploadError, UploadResult};
use crate::hyperparameters::Hyperparameters;
use crate::objects::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tuner_dataset::{
    decode_utf8, extension_tag, preview, DatasetFormat, DatasetReport, SampleCache,
    CONTENT_PREVIEW_CHARS,
};

/// Message returned after a successful upload
pub const UPLOAD_MESSAGE: &str = "Files uploaded and processed successfully";

/// Message returned after a local ingestion run
pub const TRAINING_MESSAGE: &str = "Training completed successfully";

/// Tool reported as having processed each file
pub const TUNING_SCRIPT: &str = "llm-tuner normalize";

/// Object key of an uploaded file
#[must_use]
pub fn upload_key(user_id: &str, file_name: &str) -> String {
    format!("users/{user_id}/uploads/{file_name}")
}

/// Reject names that are empty or could address another object
///
/// # Errors
///
/// Returns [`UploadError::InvalidFileName`].
pub fn validate_file_name(name: &str) -> UploadResult<&str> {
    let trimmed = name.trim();
    let unsafe_name = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(UploadError::InvalidFileName(name.to_string()));
    }
    Ok(trimmed)
}

/// Per-file upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Name as uploaded
    pub original_name: String,
    /// Size in bytes
    pub size: usize,
    /// Lowercased extension with leading dot
    #[serde(rename = "type")]
    pub file_type: String,
    /// First 200 characters
    pub content_preview: String,
    /// Object key
    pub storage_key: String,
    /// Samples the normalizer extracts
    pub sample_count: usize,
}

/// Upload response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Status message
    pub message: String,
    /// One entry per stored file
    pub files: Vec<UploadedFile>,
}

/// Local ingestion request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StartTrainingRequest {
    /// Echoed hyperparameters
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    /// Names of previously uploaded files
    #[serde(default)]
    pub files: Vec<String>,
}

/// How a file was processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningInfo {
    /// Processing tool
    pub tuning_script: String,
    /// File name
    pub file_name: String,
    /// Lowercased extension with leading dot
    pub file_type: String,
}

/// Per-file ingestion result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    /// File name
    pub file_name: String,
    /// Processing details
    pub tuning_info: TuningInfo,
    /// Extracted samples
    pub sample_count: usize,
    /// Previews of the first samples
    pub samples_preview: Vec<String>,
}

/// Local ingestion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    /// Status message
    pub message: String,
    /// Echoed hyperparameters
    pub hyperparameters: Hyperparameters,
    /// Files that were found and processed
    pub files: Vec<ProcessedFile>,
}

/// Upload storage and dataset ingestion
pub struct UploadService {
    objects: Arc<dyn ObjectStore>,
    cache: SampleCache,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl UploadService {
    /// Create service over an object store
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>, cache: SampleCache) -> Self {
        Self { objects, cache }
    }

    /// Underlying object store
    #[inline]
    #[must_use]
    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Sample cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// Store one file for a user
    ///
    /// # Errors
    ///
    /// [`UploadError::InvalidFileName`] for unsafe names,
    /// [`UploadError::Dataset`] for non-UTF-8 content, and store failures.
    pub async fn store(&self, user_id: &str, name: &str, bytes: Vec<u8>) -> UploadResult<UploadedFile> {
        let name = validate_file_name(name)?;
        let text = decode_utf8(name, &bytes)?;
        let format = DatasetFormat::from_file_name(name);
        let samples = self.cache.get_or_normalize(&text, format).await;

        let key = upload_key(user_id, name);
        let size = bytes.len();
        self.objects.put(&key, bytes).await?;

        let file_type = extension_tag(name);
        tracing::info!(
            user_id,
            file = name,
            %format,
            size,
            lines = text.split('\n').count(),
            samples = samples.len(),
            "upload stored"
        );

        Ok(UploadedFile {
            original_name: name.to_string(),
            size,
            file_type,
            content_preview: preview(&text, CONTENT_PREVIEW_CHARS),
            storage_key: key,
            sample_count: samples.len(),
        })
    }

    /// Store every file of an upload request
    ///
    /// # Errors
    ///
    /// [`UploadError::NoFiles`] for an empty request, otherwise the first
    /// failing file aborts the request.
    pub async fn upload(&self, user_id: &str, files: Vec<(String, Vec<u8>)>) -> UploadResult<UploadSummary> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        let mut stored = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            stored.push(self.store(user_id, &name, bytes).await?);
        }
        Ok(UploadSummary {
            message: UPLOAD_MESSAGE.to_string(),
            files: stored,
        })
    }

    /// Decoded content of an uploaded file, `None` when absent
    ///
    /// # Errors
    ///
    /// Invalid names, undecodable content and store failures.
    pub async fn load_text(&self, user_id: &str, name: &str) -> UploadResult<Option<String>> {
        let name = validate_file_name(name)?;
        match self.objects.get(&upload_key(user_id, name)).await? {
            Some(bytes) => Ok(Some(decode_utf8(name, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Normalized samples of an uploaded file, `None` when absent
    ///
    /// # Errors
    ///
    /// See [`UploadService::load_text`].
    pub async fn load_samples(&self, user_id: &str, name: &str) -> UploadResult<Option<Arc<Vec<String>>>> {
        let Some(text) = self.load_text(user_id, name).await? else {
            return Ok(None);
        };
        let format = DatasetFormat::from_file_name(name);
        Ok(Some(self.cache.get_or_normalize(&text, format).await))
    }

    /// Normalize previously uploaded files and report what was found
    ///
    /// Files that are missing or have unsafe names are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Store failures and undecodable content.
    pub async fn start_training(&self, user_id: &str, request: StartTrainingRequest) -> UploadResult<TrainingRun> {
        tracing::info!(
            user_id,
            hyperparameters = ?request.hyperparameters,
            files = ?request.files,
            "starting ingestion run"
        );

        let mut processed = Vec::with_capacity(request.files.len());
        for name in &request.files {
            if validate_file_name(name).is_err() {
                tracing::warn!(user_id, file = %name, "skipping file with unsafe name");
                continue;
            }
            let Some(text) = self.load_text(user_id, name).await? else {
                tracing::warn!(user_id, file = %name, "content not found, skipping");
                continue;
            };

            let format = DatasetFormat::from_file_name(name);
            let samples = self.cache.get_or_normalize(&text, format).await;
            let report = DatasetReport::from_samples(&text, format, &samples);
            tracing::info!(user_id, file = %name, "dataset report\n{report}");

            let file_type = extension_tag(name);
            processed.push(ProcessedFile {
                file_name: name.clone(),
                tuning_info: TuningInfo {
                    tuning_script: TUNING_SCRIPT.to_string(),
                    file_name: name.clone(),
                    file_type,
                },
                sample_count: report.sample_count,
                samples_preview: report.samples_preview,
            });
        }

        Ok(TrainingRun {
            message: TRAINING_MESSAGE.to_string(),
            hyperparameters: request.hyperparameters,
            files: processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::LocalObjectStore;
    use pretty_assertions::assert_eq;

    fn service(dir: &tempfile::TempDir) -> UploadService {
        UploadService::new(
            Arc::new(LocalObjectStore::new(dir.path(), "bucket")),
            SampleCache::new(16),
        )
    }

    #[test]
    fn file_name_validation() {
        assert_eq!(validate_file_name(" data.csv ").unwrap(), "data.csv");
        for bad in ["", "  ", ".", "..", "a/b.txt", "a\\b.txt", "../x"] {
            assert!(validate_file_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn store_reports_file_info() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(&dir);

        let content = "name,text\n1,hello there\n2,general kenobi\n";
        let file = uploads
            .store("user_1", "Data.CSV", content.as_bytes().to_vec())
            .await
            .unwrap();

        assert_eq!(file.original_name, "Data.CSV");
        assert_eq!(file.file_type, ".csv");
        assert_eq!(file.size, content.len());
        assert_eq!(file.sample_count, 2);
        assert_eq!(file.storage_key, "users/user_1/uploads/Data.CSV");
        assert!(dir.path().join("users/user_1/uploads/Data.CSV").exists());
    }

    #[tokio::test]
    async fn preview_truncates_long_content() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(&dir);

        let content = "x".repeat(250);
        let file = uploads.store("u", "long.txt", content.into_bytes()).await.unwrap();
        assert_eq!(file.content_preview.chars().count(), CONTENT_PREVIEW_CHARS + 3);
        assert!(file.content_preview.ends_with("..."));
    }

    #[tokio::test]
    async fn invalid_utf8_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(&dir);

        let err = uploads.store("u", "bad.txt", vec![0x66, 0xff, 0xfe]).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(!dir.path().join("users/u/uploads/bad.txt").exists());
    }

    #[tokio::test]
    async fn empty_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(&dir).upload("u", Vec::new()).await.unwrap_err();
        assert!(matches!(err, UploadError::NoFiles));
    }

    #[tokio::test]
    async fn start_training_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(&dir);
        uploads
            .store("u", "notes.txt", b"short\nthis line is long enough\n".to_vec())
            .await
            .unwrap();

        let run = uploads
            .start_training(
                "u",
                StartTrainingRequest {
                    hyperparameters: Hyperparameters::default(),
                    files: vec!["notes.txt".into(), "missing.json".into(), "../etc".into()],
                },
            )
            .await
            .unwrap();

        assert_eq!(run.message, TRAINING_MESSAGE);
        assert_eq!(run.files.len(), 1);
        let file = &run.files[0];
        assert_eq!(file.sample_count, 1);
        assert_eq!(file.samples_preview, vec!["this line is long enough".to_string()]);
        assert_eq!(file.tuning_info.file_type, ".txt");
    }

    #[tokio::test]
    async fn uploads_are_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(&dir);
        uploads.store("alice", "a.txt", b"some private text here".to_vec()).await.unwrap();

        assert!(uploads.load_samples("bob", "a.txt").await.unwrap().is_none());
        assert_eq!(uploads.load_samples("alice", "a.txt").await.unwrap().unwrap().len(), 1);
    }

    #[test]
    fn response_field_names() {
        let json = serde_json::to_value(UploadedFile {
            original_name: "a.txt".into(),
            size: 1,
            file_type: ".txt".into(),
            content_preview: "a".into(),
            storage_key: "k".into(),
            sample_count: 0,
        })
        .unwrap();
        assert_eq!(json["originalName"], "a.txt");
        assert_eq!(json["type"], ".txt");
        assert_eq!(json["contentPreview"], "a");
    }
}
