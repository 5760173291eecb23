//! Job orchestration over a [`TrainingService`]

use super::simulated::{
    simulated_description, simulated_endpoint, simulated_generation, SimulatedEndpoint, SimulatedJob,
};
use super::{
    algorithm_for, catalog, hourly_cost, training_cost, BaseModel, CostEstimate, EndpointDescription,
    EndpointSpec, EndpointState, InvokeRequest, JobDescription, JobStatus, MetricPoint,
    ResourceConfig, SimulatedTrainingService, Tag, TrainingJobSpec, TrainingService, DEMO_NOTE,
};
use crate::config::TrainingConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::hyperparameters::Hyperparameters;
use crate::store::{self, KvStore};
use crate::uploads::UploadService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tuner_dataset::{to_jsonl, InstructionRecord};

/// Most jobs returned by [`JobManager::list`]
pub const MAX_LISTED_JOBS: usize = 50;

const PROJECT_TAG: &str = "LLM-Tuner-Platform";
const TRAINING_CONTENT_TYPE: &str = "application/jsonlines";
const VOLUME_SIZE_GB: u32 = 30;
const MAX_RUNTIME_SECONDS: u64 = 10_800;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Job name `llm-tune-{uid[..8]}-{model}-{YYYYmmdd-HHMMSS}-{suffix}`
#[must_use]
pub fn generate_job_name(user_id: &str, base_model: &str, now: DateTime<Utc>, suffix: &str) -> String {
    let user: String = user_id.chars().take(8).collect();
    let model = base_model.replace(['/', '_'], "-");
    format!("llm-tune-{user}-{model}-{}-{suffix}", now.format("%Y%m%d-%H%M%S"))
}

fn name_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

/// Managed fine-tuning request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// Base model id or short name
    pub base_model: String,
    /// Hyperparameters; missing fields use defaults
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    /// Names of previously uploaded files
    pub files: Vec<String>,
    /// Instance type; configured default when absent
    #[serde(default)]
    pub instance_type: Option<String>,
}

/// Stored job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job name (record key)
    pub job_name: String,
    /// Service ARN
    pub job_arn: String,
    /// Owning user
    pub user_id: String,
    /// Base model
    pub base_model: String,
    /// Instance type
    pub instance_type: String,
    /// Last observed status
    pub status: JobStatus,
    /// USD/hour at submission
    pub hourly_cost: f64,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Submitted hyperparameters
    pub hyperparameters: Hyperparameters,
    /// Training data prefix
    pub training_data_uri: String,
    /// Artifact prefix
    pub output_uri: String,
    /// Fabricated by the simulated service
    #[serde(default)]
    pub demo: bool,
    /// When a stop was requested
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn as_simulated(&self) -> SimulatedJob {
        SimulatedJob {
            job_name: self.job_name.clone(),
            instance_type: self.instance_type.clone(),
            output_uri: self.output_uri.clone(),
            epochs: self.hyperparameters.epochs,
            created_at: self.created_at,
            stopped_at: self.stopped_at,
        }
    }
}

/// Stored endpoint record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Endpoint name (record key)
    pub endpoint_name: String,
    /// Service ARN
    pub endpoint_arn: String,
    /// Owning user
    pub user_id: String,
    /// Job the model came from
    pub job_name: String,
    /// Instance type
    pub instance_type: String,
    /// Served model archive
    pub model_artifacts_uri: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Fabricated by the simulated service
    #[serde(default)]
    pub demo: bool,
}

/// Response to a job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreated {
    /// Job name
    pub job_name: String,
    /// Service ARN
    pub job_arn: String,
    /// Initial status
    pub status: JobStatus,
    /// Training data prefix
    pub training_data_uri: String,
    /// Artifact prefix
    pub output_uri: String,
    /// Instance type
    pub instance_type: String,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// USD/hour
    pub estimated_cost_per_hour: f64,
    /// Fabricated response
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Why the response is fabricated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Job status response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    /// Job name
    pub job_name: String,
    /// Current status
    pub status: JobStatus,
    /// Submission time
    pub creation_time: DateTime<Utc>,
    /// Training start
    pub start_time: Option<DateTime<Utc>>,
    /// Training end
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds since start (until end when finished)
    pub duration_seconds: Option<i64>,
    /// Instance type
    pub instance_type: String,
    /// Error detail for failed jobs
    pub failure_reason: Option<String>,
    /// Model archive once complete
    pub model_artifacts_uri: Option<String>,
    /// Final metrics
    pub training_metrics: Vec<MetricPoint>,
    /// USD so far, rounded to cents
    pub estimated_cost: f64,
    /// Fabricated response
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Why the response is fabricated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl JobStatusReport {
    fn new(description: JobDescription, demo: bool, now: DateTime<Utc>) -> Self {
        let duration_seconds = description
            .start_time
            .map(|start| (description.end_time.unwrap_or(now) - start).num_seconds().max(0));
        #[allow(clippy::cast_precision_loss)]
        let estimated_cost = duration_seconds
            .map_or(0.0, |secs| training_cost(&description.instance_type, secs as f64));
        Self {
            job_name: description.job_name,
            status: description.status,
            creation_time: description.creation_time,
            start_time: description.start_time,
            end_time: description.end_time,
            duration_seconds,
            instance_type: description.instance_type,
            failure_reason: description.failure_reason,
            model_artifacts_uri: description.model_artifacts_uri,
            training_metrics: description.final_metrics,
            estimated_cost,
            demo,
            note: demo.then(|| DEMO_NOTE.to_string()),
        }
    }
}

/// Entry in a job listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job name
    pub job_name: String,
    /// Last observed status
    pub status: JobStatus,
    /// Base model
    pub base_model: String,
    /// Instance type
    pub instance_type: String,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Fabricated job
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_name: record.job_name.clone(),
            status: record.status,
            base_model: record.base_model.clone(),
            instance_type: record.instance_type.clone(),
            created_at: record.created_at,
            demo: record.demo,
        }
    }
}

/// Response to a stop request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStopped {
    /// Job name
    pub job_name: String,
    /// Always `Stopping`
    pub status: JobStatus,
    /// When the stop was requested
    pub stopped_at: DateTime<Utc>,
}

/// Deployment request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Endpoint instance type; the job's when absent
    #[serde(default)]
    pub instance_type: Option<String>,
}

/// Response to a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Endpoint name
    pub endpoint_name: String,
    /// Service ARN
    pub endpoint_arn: String,
    /// Always `Creating`
    pub status: EndpointState,
    /// Served model archive
    pub model_artifacts_uri: String,
    /// Instance type
    pub instance_type: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Fabricated response
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Why the response is fabricated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Endpoint status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    /// Endpoint name
    pub endpoint_name: String,
    /// Current state
    pub status: EndpointState,
    /// Instance type
    pub instance_type: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub last_modified: DateTime<Utc>,
    /// Fabricated response
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Why the response is fabricated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EndpointStatus {
    fn new(description: EndpointDescription, demo: bool) -> Self {
        Self {
            endpoint_name: description.endpoint_name,
            status: description.status,
            instance_type: description.instance_type,
            created_at: description.created_at,
            last_modified: description.last_modified,
            demo,
            note: demo.then(|| DEMO_NOTE.to_string()),
        }
    }
}

/// Generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Endpoint name
    pub endpoint_name: String,
    /// Model output
    pub generated_text: String,
    /// Fabricated response
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Why the response is fabricated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Managed training orchestration
///
/// Owns no job state: every record lives in the key-value store so any
/// process sharing the store sees the same jobs.
pub struct JobManager {
    service: Arc<dyn TrainingService>,
    fallback: Option<Arc<SimulatedTrainingService>>,
    store: Arc<dyn KvStore>,
    jobs_table: String,
    endpoints_table: String,
    uploads: Arc<UploadService>,
    config: TrainingConfig,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("simulated", &self.service.is_simulated())
            .field("fallback", &self.fallback.is_some())
            .field("backend", &self.store.backend())
            .field("jobs_table", &self.jobs_table)
            .field("endpoints_table", &self.endpoints_table)
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Create manager with default table names and no fallback
    #[must_use]
    pub fn new(
        service: Arc<dyn TrainingService>,
        store: Arc<dyn KvStore>,
        uploads: Arc<UploadService>,
        config: TrainingConfig,
    ) -> Self {
        let tables = crate::config::KvConfig::default();
        Self {
            service,
            fallback: None,
            store,
            jobs_table: tables.jobs_table,
            endpoints_table: tables.endpoints_table,
            uploads,
            config,
        }
    }

    /// Use custom record tables
    #[must_use]
    pub fn with_tables(mut self, jobs_table: impl Into<String>, endpoints_table: impl Into<String>) -> Self {
        self.jobs_table = jobs_table.into();
        self.endpoints_table = endpoints_table.into();
        self
    }

    /// Answer with flagged demo data when the service fails
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<SimulatedTrainingService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Whether service failures degrade to demo responses
    #[inline]
    #[must_use]
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// `simulated` or `gateway`
    #[must_use]
    pub fn backend(&self) -> &'static str {
        if self.service.is_simulated() {
            "simulated"
        } else {
            "gateway"
        }
    }

    /// Fine-tunable base models
    #[must_use]
    pub fn catalog(&self) -> Vec<BaseModel> {
        catalog()
    }

    /// Price `hours` of training on an instance type
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidRequest`] for negative or non-finite hours.
    pub fn cost_estimate(&self, instance_type: Option<&str>, hours: f64) -> TrainingResult<CostEstimate> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(TrainingError::InvalidRequest(format!("invalid hours: {hours}")));
        }
        let instance_type = instance_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.config.default_instance_type);
        Ok(CostEstimate::new(instance_type, hours))
    }

    fn fallback_for(&self, err: &TrainingError) -> Option<&SimulatedTrainingService> {
        if err.is_service_failure() {
            self.fallback.as_deref()
        } else {
            None
        }
    }

    fn service_for(&self, demo: bool) -> &dyn TrainingService {
        match &self.fallback {
            Some(fallback) if demo => fallback.as_ref(),
            _ => self.service.as_ref(),
        }
    }

    async fn prepare_training_data(&self, user_id: &str, job_name: &str, files: &[String]) -> TrainingResult<String> {
        let mut records = Vec::new();
        for name in files {
            let samples = self
                .uploads
                .load_samples(user_id, name)
                .await?
                .ok_or_else(|| TrainingError::InvalidRequest(format!("file not found: {name}")))?;
            records.extend(samples.iter().map(|s| InstructionRecord::from_sample(s)));
        }
        if records.is_empty() {
            return Err(TrainingError::NoTrainingData);
        }

        let objects = self.uploads.objects();
        let prefix = format!("users/{user_id}/training-data/{job_name}/");
        let key = format!("{prefix}train.jsonl");
        objects.put(&key, to_jsonl(&records)?.into_bytes()).await?;
        tracing::info!(user_id, records = records.len(), key = %key, "training data prepared");
        Ok(objects.uri(&prefix))
    }

    /// Prepare data and submit a fine-tuning job
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidRequest`] for an empty model or file list or a
    /// missing file, [`TrainingError::NoTrainingData`] when the files hold no
    /// samples, [`TrainingError::JobExists`] when a record already holds the
    /// generated name, and service failures when no fallback is configured.
    pub async fn create(&self, user_id: &str, request: CreateJobRequest) -> TrainingResult<JobCreated> {
        let base_model = request.base_model.trim();
        if base_model.is_empty() {
            return Err(TrainingError::InvalidRequest("base_model must not be empty".into()));
        }
        if request.files.is_empty() {
            return Err(TrainingError::InvalidRequest("no files selected".into()));
        }

        let now = Utc::now();
        let job_name = generate_job_name(user_id, base_model, now, &name_suffix());
        let instance_type = request
            .instance_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.config.default_instance_type.clone());
        let training_data_uri = self.prepare_training_data(user_id, &job_name, &request.files).await?;
        let output_uri = self
            .uploads
            .objects()
            .uri(&format!("users/{user_id}/models/{job_name}/"));

        let spec = TrainingJobSpec {
            job_name: job_name.clone(),
            role_arn: self.config.execution_role.clone(),
            algorithm_specification: algorithm_for(base_model),
            training_data_uri: training_data_uri.clone(),
            content_type: TRAINING_CONTENT_TYPE.to_string(),
            output_uri: output_uri.clone(),
            resource_config: ResourceConfig {
                instance_type: instance_type.clone(),
                instance_count: 1,
                volume_size_gb: VOLUME_SIZE_GB,
            },
            max_runtime_in_seconds: MAX_RUNTIME_SECONDS,
            hyper_parameters: request.hyperparameters.to_service_parameters(base_model),
            tags: vec![
                Tag::new("Project", PROJECT_TAG),
                Tag::new("UserId", user_id),
                Tag::new("BaseModel", base_model),
            ],
        };

        let (job_arn, demo) = match self.service.create_job(&spec).await {
            Ok(arn) => (arn, self.service.is_simulated()),
            Err(err) => match self.fallback_for(&err) {
                Some(fallback) => {
                    tracing::warn!(job_name = %job_name, error = %err, "training service failed, creating demo job");
                    (fallback.create_job(&spec).await?, true)
                }
                None => return Err(err),
            },
        };

        let hourly = hourly_cost(&instance_type);
        let record = JobRecord {
            job_name: job_name.clone(),
            job_arn: job_arn.clone(),
            user_id: user_id.to_string(),
            base_model: base_model.to_string(),
            instance_type: instance_type.clone(),
            status: JobStatus::InProgress,
            hourly_cost: hourly,
            created_at: now,
            hyperparameters: request.hyperparameters,
            training_data_uri: training_data_uri.clone(),
            output_uri: output_uri.clone(),
            demo,
            stopped_at: None,
        };
        if !store::insert(self.store.as_ref(), &self.jobs_table, &job_name, &record).await? {
            return Err(TrainingError::JobExists(job_name));
        }
        tracing::info!(job_name = %job_name, user_id, base_model, instance_type = %instance_type, demo, "training job created");

        Ok(JobCreated {
            job_name,
            job_arn,
            status: JobStatus::InProgress,
            training_data_uri,
            output_uri,
            instance_type,
            created_at: now,
            estimated_cost_per_hour: hourly,
            demo,
            note: demo.then(|| DEMO_NOTE.to_string()),
        })
    }

    async fn owned_job(&self, user_id: &str, job_name: &str) -> TrainingResult<JobRecord> {
        let record: Option<JobRecord> = store::load(self.store.as_ref(), &self.jobs_table, job_name).await?;
        record
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| TrainingError::JobNotFound(job_name.to_string()))
    }

    async fn owned_endpoint(&self, user_id: &str, endpoint_name: &str) -> TrainingResult<EndpointRecord> {
        let record: Option<EndpointRecord> =
            store::load(self.store.as_ref(), &self.endpoints_table, endpoint_name).await?;
        record
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| TrainingError::EndpointNotFound(endpoint_name.to_string()))
    }

    async fn describe(&self, record: &JobRecord) -> TrainingResult<(JobDescription, bool)> {
        let service = self.service_for(record.demo);
        match service.describe_job(&record.job_name).await {
            Ok(description) => Ok((description, record.demo || service.is_simulated())),
            Err(err) if !record.demo => match self.fallback_for(&err) {
                Some(fallback) => {
                    tracing::warn!(job_name = %record.job_name, error = %err, "training service failed, reporting demo status");
                    Ok((
                        simulated_description(&record.as_simulated(), Utc::now(), fallback.runtime()),
                        true,
                    ))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Current state of a caller's job
    ///
    /// # Errors
    ///
    /// [`TrainingError::JobNotFound`] for unknown jobs and jobs owned by
    /// someone else, and service failures when no fallback is configured.
    pub async fn status(&self, user_id: &str, job_name: &str) -> TrainingResult<JobStatusReport> {
        let mut record = self.owned_job(user_id, job_name).await?;
        let (description, demo) = self.describe(&record).await?;

        if description.status != record.status {
            tracing::info!(job_name, from = %record.status, to = %description.status, "job status changed");
            record.status = description.status;
            store::save(self.store.as_ref(), &self.jobs_table, job_name, &record).await?;
        }
        Ok(JobStatusReport::new(description, demo, Utc::now()))
    }

    /// Caller's jobs, newest first
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self, user_id: &str) -> TrainingResult<Vec<JobSummary>> {
        let mut jobs: Vec<JobRecord> = store::scan_as(self.store.as_ref(), &self.jobs_table)
            .await?
            .into_iter()
            .filter(|job: &JobRecord| job.user_id == user_id)
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(MAX_LISTED_JOBS);
        Ok(jobs.iter().map(JobSummary::from).collect())
    }

    /// Request a job stop
    ///
    /// # Errors
    ///
    /// [`TrainingError::JobNotFound`] and service failures. Stops never fall
    /// back to demo data.
    pub async fn stop(&self, user_id: &str, job_name: &str) -> TrainingResult<JobStopped> {
        let mut record = self.owned_job(user_id, job_name).await?;
        self.service_for(record.demo).stop_job(job_name).await?;

        let now = Utc::now();
        record.status = JobStatus::Stopping;
        record.stopped_at = Some(now);
        store::save(self.store.as_ref(), &self.jobs_table, job_name, &record).await?;
        tracing::info!(job_name, user_id, "training job stop requested");

        Ok(JobStopped {
            job_name: job_name.to_string(),
            status: JobStatus::Stopping,
            stopped_at: now,
        })
    }

    /// Deploy a completed job's model to an inference endpoint
    ///
    /// # Errors
    ///
    /// [`TrainingError::NotReady`] unless the job is `Completed` with
    /// artifacts, plus the errors of [`JobManager::status`].
    pub async fn deploy(&self, user_id: &str, job_name: &str, request: DeployRequest) -> TrainingResult<Deployment> {
        let record = self.owned_job(user_id, job_name).await?;
        let (description, demo) = self.describe(&record).await?;
        let model_artifacts_uri = match (description.status, description.model_artifacts_uri) {
            (JobStatus::Completed, Some(uri)) => uri,
            (status, _) => {
                return Err(TrainingError::NotReady {
                    job_name: job_name.to_string(),
                    status: status.to_string(),
                })
            }
        };

        let instance_type = request
            .instance_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| record.instance_type.clone());
        let spec = EndpointSpec {
            endpoint_name: format!("{job_name}-ep"),
            model_artifacts_uri,
            instance_type,
            initial_instance_count: 1,
            role_arn: self.config.execution_role.clone(),
            tags: vec![
                Tag::new("Project", PROJECT_TAG),
                Tag::new("UserId", user_id),
                Tag::new("JobName", job_name),
            ],
        };

        let service = self.service_for(demo);
        let (endpoint_arn, demo) = match service.create_endpoint(&spec).await {
            Ok(arn) => (arn, demo || service.is_simulated()),
            Err(err) => match self.fallback_for(&err) {
                Some(fallback) if !demo => {
                    tracing::warn!(job_name, error = %err, "training service failed, creating demo endpoint");
                    (fallback.create_endpoint(&spec).await?, true)
                }
                _ => return Err(err),
            },
        };

        let now = Utc::now();
        let record = EndpointRecord {
            endpoint_name: spec.endpoint_name.clone(),
            endpoint_arn: endpoint_arn.clone(),
            user_id: user_id.to_string(),
            job_name: job_name.to_string(),
            instance_type: spec.instance_type.clone(),
            model_artifacts_uri: spec.model_artifacts_uri.clone(),
            created_at: now,
            demo,
        };
        store::save(self.store.as_ref(), &self.endpoints_table, &record.endpoint_name, &record).await?;
        tracing::info!(job_name, endpoint_name = %record.endpoint_name, demo, "endpoint deployment started");

        Ok(Deployment {
            endpoint_name: spec.endpoint_name,
            endpoint_arn,
            status: EndpointState::Creating,
            model_artifacts_uri: spec.model_artifacts_uri,
            instance_type: spec.instance_type,
            created_at: now,
            demo,
            note: demo.then(|| DEMO_NOTE.to_string()),
        })
    }

    /// Current state of a caller's endpoint
    ///
    /// # Errors
    ///
    /// [`TrainingError::EndpointNotFound`] for unknown endpoints and endpoints
    /// owned by someone else, and service failures without fallback.
    pub async fn endpoint_status(&self, user_id: &str, endpoint_name: &str) -> TrainingResult<EndpointStatus> {
        let record = self.owned_endpoint(user_id, endpoint_name).await?;
        let service = self.service_for(record.demo);
        match service.describe_endpoint(endpoint_name).await {
            Ok(description) => Ok(EndpointStatus::new(description, record.demo || service.is_simulated())),
            Err(err) => match self.fallback_for(&err) {
                Some(fallback) if !record.demo => {
                    tracing::warn!(endpoint_name, error = %err, "training service failed, reporting demo endpoint status");
                    let endpoint = SimulatedEndpoint {
                        endpoint_name: record.endpoint_name,
                        instance_type: record.instance_type,
                        created_at: record.created_at,
                    };
                    Ok(EndpointStatus::new(
                        simulated_endpoint(&endpoint, Utc::now(), fallback.runtime()),
                        true,
                    ))
                }
                _ => Err(err),
            },
        }
    }

    /// Generate text on a caller's endpoint
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidRequest`] for an empty prompt, plus the errors
    /// of [`JobManager::endpoint_status`].
    pub async fn invoke(
        &self,
        user_id: &str,
        endpoint_name: &str,
        request: InvokeRequest,
    ) -> TrainingResult<InvocationResult> {
        if request.prompt.trim().is_empty() {
            return Err(TrainingError::InvalidRequest("prompt must not be empty".into()));
        }
        let record = self.owned_endpoint(user_id, endpoint_name).await?;
        let service = self.service_for(record.demo);
        let (generated_text, demo) = match service.invoke_endpoint(endpoint_name, &request).await {
            Ok(text) => (text, record.demo || service.is_simulated()),
            Err(err) => match self.fallback_for(&err) {
                Some(_) if !record.demo => {
                    tracing::warn!(endpoint_name, error = %err, "training service failed, returning demo generation");
                    (simulated_generation(&request.prompt), true)
                }
                _ => return Err(err),
            },
        };
        Ok(InvocationResult {
            endpoint_name: endpoint_name.to_string(),
            generated_text,
            demo,
            note: demo.then(|| DEMO_NOTE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::LocalObjectStore;
    use crate::store::MemoryKvStore;
    use crate::training::MockTrainingService;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tuner_dataset::SampleCache;

    struct Fixture {
        manager: JobManager,
        uploads: Arc<UploadService>,
        store: Arc<MemoryKvStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture(service: Arc<dyn TrainingService>, with_fallback: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryKvStore::new());
        let uploads = Arc::new(UploadService::new(
            Arc::new(LocalObjectStore::new(dir.path(), "bucket")),
            SampleCache::new(16),
        ));
        let mut manager = JobManager::new(service, store.clone(), uploads.clone(), TrainingConfig::default());
        if with_fallback {
            manager = manager.with_fallback(Arc::new(SimulatedTrainingService::new(store.clone(), Duration::ZERO)));
        }
        Fixture {
            manager,
            uploads,
            store,
            _dir: dir,
        }
    }

    fn failing_service() -> MockTrainingService {
        let mut mock = MockTrainingService::new();
        mock.expect_is_simulated().return_const(false);
        mock.expect_create_job()
            .returning(|_| Err(TrainingError::service("create_job", "connection refused")));
        mock.expect_describe_job()
            .returning(|_| Err(TrainingError::service("describe_job", "connection refused")));
        mock.expect_create_endpoint()
            .returning(|_| Err(TrainingError::service("create_endpoint", "connection refused")));
        mock.expect_describe_endpoint()
            .returning(|_| Err(TrainingError::service("describe_endpoint", "connection refused")));
        mock.expect_invoke_endpoint()
            .returning(|_, _| Err(TrainingError::service("invoke_endpoint", "connection refused")));
        mock
    }

    fn request(files: &[&str]) -> CreateJobRequest {
        CreateJobRequest {
            base_model: "meta/llama_2".into(),
            hyperparameters: Hyperparameters::default(),
            files: files.iter().map(|f| (*f).to_string()).collect(),
            instance_type: None,
        }
    }

    async fn upload(fixture: &Fixture, user: &str) {
        fixture
            .uploads
            .store(user, "data.jsonl", b"{\"text\": \"first training sample\"}\n{\"content\": \"second\"}\n".to_vec())
            .await
            .unwrap();
    }

    fn description(status: JobStatus, artifacts: Option<&str>) -> JobDescription {
        let start = Utc::now() - chrono::Duration::hours(2);
        JobDescription {
            job_name: "job".into(),
            status,
            creation_time: start,
            start_time: Some(start),
            end_time: Some(start + chrono::Duration::hours(1)),
            instance_type: "ml.p3.2xlarge".into(),
            failure_reason: None,
            model_artifacts_uri: artifacts.map(String::from),
            final_metrics: Vec::new(),
        }
    }

    #[test]
    fn job_name_format() {
        let now = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            generate_job_name("user_0123456789", "meta/llama_2", now, "0a1b2c3d"),
            "llm-tune-user_012-meta-llama-2-20240305-070809-0a1b2c3d"
        );
        assert_eq!(generate_job_name("ab", "m", now, "ff"), "llm-tune-ab-m-20240305-070809-ff");

        let suffix = name_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn create_submits_and_records() {
        let mut mock = MockTrainingService::new();
        mock.expect_is_simulated().return_const(false);
        mock.expect_create_job()
            .withf(|spec: &TrainingJobSpec| {
                spec.resource_config.instance_type == "ml.g5.2xlarge"
                    && spec.resource_config.instance_count == 1
                    && spec.max_runtime_in_seconds == 10_800
                    && spec.tag("UserId") == Some("user_1")
                    && spec.hyper_parameters["peft_type"] == "lora"
                    && spec.training_data_uri
                        == format!("s3://bucket/users/user_1/training-data/{}/", spec.job_name)
            })
            .times(1)
            .returning(|spec| Ok(format!("arn:test:{}", spec.job_name)));
        let fixture = fixture(Arc::new(mock), false);
        upload(&fixture, "user_1").await;

        let created = fixture.manager.create("user_1", request(&["data.jsonl"])).await.unwrap();
        assert!(!created.demo);
        assert!(created.note.is_none());
        assert_eq!(created.status, JobStatus::InProgress);
        assert_eq!(created.estimated_cost_per_hour, 1.21);
        assert!(created.output_uri.ends_with(&format!("/models/{}/", created.job_name)));

        let prepared = fixture
            .uploads
            .objects()
            .get(&format!("users/user_1/training-data/{}/train.jsonl", created.job_name))
            .await
            .unwrap()
            .unwrap();
        let prepared = String::from_utf8(prepared).unwrap();
        assert_eq!(prepared.lines().count(), 2);
        assert!(prepared.contains("Continue the following text:"));

        let jobs = fixture.manager.list("user_1").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_name, created.job_name);
    }

    #[tokio::test]
    async fn create_falls_back_when_service_fails() {
        let fixture = fixture(Arc::new(failing_service()), true);
        upload(&fixture, "user_1").await;

        let created = fixture.manager.create("user_1", request(&["data.jsonl"])).await.unwrap();
        assert!(created.demo);
        assert_eq!(created.note.as_deref(), Some(DEMO_NOTE));

        let status = fixture.manager.status("user_1", &created.job_name).await.unwrap();
        assert!(status.demo);
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.training_metrics.len(), 10);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["demo"], true);
    }

    #[tokio::test]
    async fn rejected_second_create_keeps_first_record() {
        let mut mock = MockTrainingService::new();
        mock.expect_is_simulated().return_const(false);
        let mut calls = 0;
        mock.expect_create_job().times(2).returning(move |spec| {
            calls += 1;
            if calls == 1 {
                Ok(format!("arn:test:{}", spec.job_name))
            } else {
                Err(TrainingError::service("create_job", "409 job name already in use"))
            }
        });
        let fixture = fixture(Arc::new(mock), true);
        upload(&fixture, "user_1").await;

        let first = fixture.manager.create("user_1", request(&["data.jsonl"])).await.unwrap();
        let second = fixture.manager.create("user_1", request(&["data.jsonl"])).await.unwrap();
        assert_ne!(first.job_name, second.job_name);
        assert_ne!(first.training_data_uri, second.training_data_uri);
        assert!(!first.demo);
        assert!(second.demo);

        let jobs_table = crate::config::KvConfig::default().jobs_table;
        let stored: JobRecord = store::load(fixture.store.as_ref(), &jobs_table, &first.job_name)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.demo);
        assert_eq!(stored.job_arn, first.job_arn);
        assert_eq!(fixture.manager.list("user_1").await.unwrap().len(), 2);

        for created in [&first, &second] {
            let key = format!("users/user_1/training-data/{}/train.jsonl", created.job_name);
            assert!(fixture.uploads.objects().get(&key).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn create_without_fallback_surfaces_service_error() {
        let fixture = fixture(Arc::new(failing_service()), false);
        upload(&fixture, "user_1").await;

        let err = fixture.manager.create("user_1", request(&["data.jsonl"])).await.unwrap_err();
        assert!(err.is_service_failure());
        assert_eq!(err.status_code(), 502);
        assert!(fixture.manager.list("user_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_validates_files() {
        let fixture = fixture(Arc::new(failing_service()), true);

        let missing = fixture.manager.create("u", request(&["nope.txt"])).await.unwrap_err();
        assert!(matches!(missing, TrainingError::InvalidRequest(_)));

        let none = fixture.manager.create("u", request(&[])).await.unwrap_err();
        assert!(matches!(none, TrainingError::InvalidRequest(_)));

        fixture.uploads.store("u", "tiny.txt", b"short\n".to_vec()).await.unwrap();
        let empty = fixture.manager.create("u", request(&["tiny.txt"])).await.unwrap_err();
        assert!(matches!(empty, TrainingError::NoTrainingData));
    }

    #[tokio::test]
    async fn status_reports_cost_and_hides_other_users_jobs() {
        let mut mock = MockTrainingService::new();
        mock.expect_is_simulated().return_const(false);
        mock.expect_create_job().returning(|_| Ok("arn".into()));
        mock.expect_describe_job()
            .returning(|_| Ok(description(JobStatus::Completed, Some("s3://bucket/model.tar.gz"))));
        let fixture = fixture(Arc::new(mock), true);
        upload(&fixture, "owner").await;
        let created = fixture.manager.create("owner", request(&["data.jsonl"])).await.unwrap();

        let status = fixture.manager.status("owner", &created.job_name).await.unwrap();
        assert_eq!(status.duration_seconds, Some(3600));
        assert_eq!(status.estimated_cost, 3.06);
        assert!(!status.demo);

        let summary = fixture.manager.list("owner").await.unwrap();
        assert_eq!(summary[0].status, JobStatus::Completed);

        let err = fixture.manager.status("intruder", &created.job_name).await.unwrap_err();
        assert!(matches!(err, TrainingError::JobNotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn deploy_requires_completed_job() {
        let mut mock = MockTrainingService::new();
        mock.expect_is_simulated().return_const(false);
        mock.expect_create_job().returning(|_| Ok("arn".into()));
        mock.expect_describe_job()
            .returning(|_| Ok(description(JobStatus::InProgress, None)));
        let fixture = fixture(Arc::new(mock), true);
        upload(&fixture, "u").await;
        let created = fixture.manager.create("u", request(&["data.jsonl"])).await.unwrap();

        let err = fixture
            .manager
            .deploy("u", &created.job_name, DeployRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::NotReady { .. }));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn demo_job_deploys_and_invokes() {
        let fixture = fixture(Arc::new(failing_service()), true);
        upload(&fixture, "u").await;
        let created = fixture.manager.create("u", request(&["data.jsonl"])).await.unwrap();

        let deployment = fixture
            .manager
            .deploy("u", &created.job_name, DeployRequest { instance_type: Some("ml.g5.4xlarge".into()) })
            .await
            .unwrap();
        assert!(deployment.demo);
        assert_eq!(deployment.status, EndpointState::Creating);
        assert_eq!(deployment.endpoint_name, format!("{}-ep", created.job_name));
        assert_eq!(deployment.instance_type, "ml.g5.4xlarge");

        let status = fixture.manager.endpoint_status("u", &deployment.endpoint_name).await.unwrap();
        assert_eq!(status.status, EndpointState::InService);
        assert!(status.demo);

        let invoke = InvokeRequest {
            prompt: "Once upon a time".into(),
            max_new_tokens: 20,
            temperature: 0.7,
        };
        let result = fixture
            .manager
            .invoke("u", &deployment.endpoint_name, invoke.clone())
            .await
            .unwrap();
        assert!(result.demo);
        assert!(result.generated_text.starts_with("Once upon a time"));

        let err = fixture
            .manager
            .invoke("someone-else", &deployment.endpoint_name, invoke)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::EndpointNotFound(_)));
    }

    #[tokio::test]
    async fn stop_updates_record() {
        let fixture = fixture(Arc::new(failing_service()), true);
        upload(&fixture, "u").await;
        let created = fixture.manager.create("u", request(&["data.jsonl"])).await.unwrap();

        let stopped = fixture.manager.stop("u", &created.job_name).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopping);

        let record: JobRecord = store::load(fixture.store.as_ref(), &fixture.manager.jobs_table, &created.job_name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, JobStatus::Stopping);
        assert_eq!(record.stopped_at, Some(stopped.stopped_at));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_capped() {
        let fixture = fixture(Arc::new(failing_service()), true);
        let base = Utc::now();
        for i in 0..(MAX_LISTED_JOBS + 5) {
            let record = JobRecord {
                job_name: format!("job-{i:03}"),
                job_arn: "arn".into(),
                user_id: "u".into(),
                base_model: "m".into(),
                instance_type: "ml.g5.2xlarge".into(),
                status: JobStatus::Completed,
                hourly_cost: 1.21,
                created_at: base + chrono::Duration::seconds(i64::try_from(i).unwrap()),
                hyperparameters: Hyperparameters::default(),
                training_data_uri: String::new(),
                output_uri: String::new(),
                demo: false,
                stopped_at: None,
            };
            store::save(fixture.store.as_ref(), &fixture.manager.jobs_table, &record.job_name, &record)
                .await
                .unwrap();
        }
        let mut other = JobRecord {
            job_name: "other".into(),
            ..store::load::<JobRecord>(fixture.store.as_ref(), &fixture.manager.jobs_table, "job-000")
                .await
                .unwrap()
                .unwrap()
        };
        other.user_id = "v".into();
        store::save(fixture.store.as_ref(), &fixture.manager.jobs_table, "other", &other)
            .await
            .unwrap();

        let jobs = fixture.manager.list("u").await.unwrap();
        assert_eq!(jobs.len(), MAX_LISTED_JOBS);
        assert_eq!(jobs[0].job_name, "job-054");
        assert!(jobs.iter().all(|j| j.job_name != "other"));
    }

    #[test]
    fn cost_estimate_validates_hours() {
        let fixture = fixture(Arc::new(failing_service()), false);
        let estimate = fixture.manager.cost_estimate(None, 2.0).unwrap();
        assert_eq!(estimate.instance_type, "ml.g5.2xlarge");
        assert_eq!(estimate.estimated_total, 2.42);
        assert!(fixture.manager.cost_estimate(Some("ml.p3.2xlarge"), -1.0).is_err());
        assert!(fixture.manager.cost_estimate(None, f64::NAN).is_err());
    }
}
