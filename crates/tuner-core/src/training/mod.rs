//! Managed fine-tuning
//!
//! Training runs on an external managed service behind the
//! [`TrainingService`] seam. [`JobManager`] prepares the data, shapes the
//! requests, keeps job and endpoint records in the key-value store and, when
//! enabled, degrades to clearly flagged demo responses if the service fails.

use crate::error::TrainingResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod catalog;
mod http;
mod manager;
mod simulated;

pub use catalog::{
    algorithm_for, catalog, hourly_cost, training_cost, AlgorithmSpec, BaseModel, CostEstimate,
    MetricDefinition, DEFAULT_HOURLY_COST,
};
pub use http::HttpTrainingService;
pub use manager::{
    generate_job_name, CreateJobRequest, DeployRequest, Deployment, EndpointRecord, EndpointStatus,
    InvocationResult, JobCreated, JobManager, JobRecord, JobStatusReport, JobStopped, JobSummary,
    MAX_LISTED_JOBS,
};
pub use simulated::{SimulatedTrainingService, DEMO_NOTE};

/// Training job lifecycle state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued or running
    InProgress,
    /// Finished with model artifacts
    Completed,
    /// Finished with an error
    Failed,
    /// Stop requested
    Stopping,
    /// Stopped before completion
    Stopped,
}

impl JobStatus {
    /// Whether the job will not change state again
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Inference endpoint state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointState {
    /// Being provisioned
    Creating,
    /// Accepting requests
    InService,
    /// Being updated
    Updating,
    /// Being torn down
    Deleting,
    /// Provisioning failed
    Failed,
}

/// Key/value tag attached to service resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create tag
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Compute resources for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceConfig {
    /// Instance type
    pub instance_type: String,
    /// Number of instances
    pub instance_count: u32,
    /// Attached volume size
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_gb: u32,
}

/// Full job submission sent to the training service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingJobSpec {
    /// Unique job name
    #[serde(rename = "TrainingJobName")]
    pub job_name: String,
    /// Role the service assumes
    pub role_arn: String,
    /// Container and metrics
    pub algorithm_specification: AlgorithmSpec,
    /// Per-job prefix holding `train.jsonl`
    pub training_data_uri: String,
    /// Content type of the training channel
    pub content_type: String,
    /// Where model artifacts are written
    pub output_uri: String,
    /// Compute resources
    pub resource_config: ResourceConfig,
    /// Hard runtime limit
    pub max_runtime_in_seconds: u64,
    /// Stringified hyperparameters
    pub hyper_parameters: BTreeMap<String, String>,
    /// Ownership and bookkeeping tags
    pub tags: Vec<Tag>,
}

impl TrainingJobSpec {
    /// Value of a tag, if present
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }
}

/// Final metric value reported for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric name
    pub metric_name: String,
    /// Value
    pub value: f64,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
}

/// Job state as described by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    /// Job name
    pub job_name: String,
    /// Current state
    pub status: JobStatus,
    /// Submission time
    pub creation_time: DateTime<Utc>,
    /// When training started
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// When training ended
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Instance type
    pub instance_type: String,
    /// Error detail for failed jobs
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Model archive location once complete
    #[serde(default)]
    pub model_artifacts_uri: Option<String>,
    /// Final metrics
    #[serde(default)]
    pub final_metrics: Vec<MetricPoint>,
}

/// Endpoint creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Endpoint name
    pub endpoint_name: String,
    /// Model archive to serve
    pub model_artifacts_uri: String,
    /// Instance type
    pub instance_type: String,
    /// Initial instance count
    pub initial_instance_count: u32,
    /// Role the service assumes
    pub role_arn: String,
    /// Ownership tags
    pub tags: Vec<Tag>,
}

/// Endpoint state as described by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescription {
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
}

/// Text generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Prompt text
    pub prompt: String,
    /// Generation length limit
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_new_tokens() -> u32 {
    100
}

fn default_temperature() -> f64 {
    0.7
}

/// Managed training service seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrainingService: Send + Sync + 'static {
    /// Submit a job; returns its ARN
    async fn create_job(&self, spec: &TrainingJobSpec) -> TrainingResult<String>;

    /// Describe a job
    async fn describe_job(&self, job_name: &str) -> TrainingResult<JobDescription>;

    /// Request a job stop
    async fn stop_job(&self, job_name: &str) -> TrainingResult<()>;

    /// Create an inference endpoint; returns its ARN
    async fn create_endpoint(&self, spec: &EndpointSpec) -> TrainingResult<String>;

    /// Describe an endpoint
    async fn describe_endpoint(&self, endpoint_name: &str) -> TrainingResult<EndpointDescription>;

    /// Generate text on an endpoint
    async fn invoke_endpoint(&self, endpoint_name: &str, request: &InvokeRequest) -> TrainingResult<String>;

    /// Whether responses are fabricated rather than from a real service
    fn is_simulated(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(JobStatus::InProgress).unwrap(), "InProgress");
        assert_eq!(JobStatus::Stopping.to_string(), "Stopping");
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Stopping.is_terminal());
    }

    #[test]
    fn invoke_defaults() {
        let request: InvokeRequest = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(request.max_new_tokens, 100);
        assert_eq!(request.temperature, 0.7);
    }

    #[test]
    fn resource_config_volume_name() {
        let json = serde_json::to_value(ResourceConfig {
            instance_type: "ml.g5.2xlarge".into(),
            instance_count: 1,
            volume_size_gb: 30,
        })
        .unwrap();
        assert_eq!(json["VolumeSizeInGB"], 30);
        assert_eq!(json["InstanceCount"], 1);
    }
}
