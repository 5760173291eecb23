//! Simulated training service
//!
//! Used when no gateway is configured and as the demo fallback when the real
//! service fails. Jobs and endpoints are recorded in the key-value store; their
//! state is derived from elapsed time so no background task is needed.

use super::{
    EndpointDescription, EndpointSpec, EndpointState, InvokeRequest, JobDescription, JobStatus,
    MetricPoint, TrainingJobSpec, TrainingService,
};
use crate::error::{StoreError, TrainingError, TrainingResult};
use crate::store::{self, KvStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Note attached to every fabricated response
pub const DEMO_NOTE: &str =
    "Demo training job: the managed training service is unavailable, so this job is simulated and no model is trained";

const JOBS_TABLE: &str = "simulated_training_jobs";
const ENDPOINTS_TABLE: &str = "simulated_endpoints";
const ARN_PREFIX: &str = "arn:aws:sagemaker:us-east-1:000000000000";
const DEFAULT_EPOCHS: u32 = 10;
const MAX_REPORTED_EPOCHS: u32 = 100;
const MAX_ENDPOINT_STARTUP: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SimulatedJob {
    pub(crate) job_name: String,
    pub(crate) instance_type: String,
    pub(crate) output_uri: String,
    pub(crate) epochs: u32,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) stopped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SimulatedEndpoint {
    pub(crate) endpoint_name: String,
    pub(crate) instance_type: String,
    pub(crate) created_at: DateTime<Utc>,
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Loss after `epoch` epochs of the simulated run
pub(crate) fn simulated_loss(epoch: u32) -> f64 {
    (2.0 - f64::from(epoch) * 0.3).max(0.1)
}

/// Job state at `now` for a job that trains for `runtime`
pub(crate) fn simulated_description(
    job: &SimulatedJob,
    now: DateTime<Utc>,
    runtime: Duration,
) -> JobDescription {
    let runtime = chrono_duration(runtime);
    let finished_at = job.created_at + runtime;
    let (status, end_time) = match job.stopped_at {
        Some(stopped_at) if stopped_at < finished_at => (JobStatus::Stopped, Some(stopped_at)),
        _ if now >= finished_at => (JobStatus::Completed, Some(finished_at)),
        _ => (JobStatus::InProgress, None),
    };

    let (model_artifacts_uri, final_metrics) = if status == JobStatus::Completed {
        let epochs = job.epochs.clamp(1, MAX_REPORTED_EPOCHS);
        let metrics = (1..=epochs)
            .map(|epoch| MetricPoint {
                metric_name: "train_loss".to_string(),
                value: simulated_loss(epoch),
                timestamp: job.created_at
                    + chrono::Duration::milliseconds(
                        runtime.num_milliseconds() * i64::from(epoch) / i64::from(epochs),
                    ),
            })
            .collect();
        (
            Some(format!("{}{}/output/model.tar.gz", job.output_uri, job.job_name)),
            metrics,
        )
    } else {
        (None, Vec::new())
    };

    JobDescription {
        job_name: job.job_name.clone(),
        status,
        creation_time: job.created_at,
        start_time: Some(job.created_at),
        end_time,
        instance_type: job.instance_type.clone(),
        failure_reason: None,
        model_artifacts_uri,
        final_metrics,
    }
}

pub(crate) fn simulated_endpoint(
    endpoint: &SimulatedEndpoint,
    now: DateTime<Utc>,
    runtime: Duration,
) -> EndpointDescription {
    let ready_at = endpoint.created_at + chrono_duration(runtime.min(MAX_ENDPOINT_STARTUP));
    let (status, last_modified) = if now >= ready_at {
        (EndpointState::InService, ready_at)
    } else {
        (EndpointState::Creating, endpoint.created_at)
    };
    EndpointDescription {
        endpoint_name: endpoint.endpoint_name.clone(),
        status,
        instance_type: endpoint.instance_type.clone(),
        created_at: endpoint.created_at,
        last_modified,
    }
}

/// Placeholder completion for a demo endpoint
pub(crate) fn simulated_generation(prompt: &str) -> String {
    format!("{prompt} [demo response: no fine-tuned model is deployed]")
}

/// [`TrainingService`] that fabricates plausible, clearly flagged results
pub struct SimulatedTrainingService {
    store: Arc<dyn KvStore>,
    runtime: Duration,
}

impl std::fmt::Debug for SimulatedTrainingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTrainingService")
            .field("backend", &self.store.backend())
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl SimulatedTrainingService {
    /// Create service; simulated jobs complete after `runtime`
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, runtime: Duration) -> Self {
        Self { store, runtime }
    }

    /// Simulated training duration
    #[inline]
    #[must_use]
    pub fn runtime(&self) -> Duration {
        self.runtime
    }

    async fn job(&self, job_name: &str) -> TrainingResult<SimulatedJob> {
        store::load(self.store.as_ref(), JOBS_TABLE, job_name)
            .await?
            .ok_or_else(|| TrainingError::JobNotFound(job_name.to_string()))
    }

    async fn endpoint(&self, endpoint_name: &str) -> TrainingResult<SimulatedEndpoint> {
        store::load(self.store.as_ref(), ENDPOINTS_TABLE, endpoint_name)
            .await?
            .ok_or_else(|| TrainingError::EndpointNotFound(endpoint_name.to_string()))
    }
}

#[async_trait]
impl TrainingService for SimulatedTrainingService {
    async fn create_job(&self, spec: &TrainingJobSpec) -> TrainingResult<String> {
        let job = SimulatedJob {
            job_name: spec.job_name.clone(),
            instance_type: spec.resource_config.instance_type.clone(),
            output_uri: spec.output_uri.clone(),
            epochs: spec
                .hyper_parameters
                .get("epochs")
                .and_then(|e| e.parse().ok())
                .unwrap_or(DEFAULT_EPOCHS),
            created_at: Utc::now(),
            stopped_at: None,
        };
        let inserted = self
            .store
            .put_if_absent(JOBS_TABLE, &job.job_name, serde_json::to_value(&job).map_err(StoreError::from)?)
            .await?;
        if !inserted {
            return Err(TrainingError::JobExists(job.job_name));
        }
        tracing::info!(job_name = %job.job_name, epochs = job.epochs, "simulated training job created");
        Ok(format!("{ARN_PREFIX}:training-job/{}", job.job_name))
    }

    async fn describe_job(&self, job_name: &str) -> TrainingResult<JobDescription> {
        let job = self.job(job_name).await?;
        Ok(simulated_description(&job, Utc::now(), self.runtime))
    }

    async fn stop_job(&self, job_name: &str) -> TrainingResult<()> {
        let mut job = self.job(job_name).await?;
        if job.stopped_at.is_none() {
            job.stopped_at = Some(Utc::now());
            store::save(self.store.as_ref(), JOBS_TABLE, job_name, &job).await?;
        }
        Ok(())
    }

    async fn create_endpoint(&self, spec: &EndpointSpec) -> TrainingResult<String> {
        let endpoint = SimulatedEndpoint {
            endpoint_name: spec.endpoint_name.clone(),
            instance_type: spec.instance_type.clone(),
            created_at: Utc::now(),
        };
        store::save(self.store.as_ref(), ENDPOINTS_TABLE, &endpoint.endpoint_name, &endpoint).await?;
        tracing::info!(endpoint_name = %endpoint.endpoint_name, "simulated endpoint created");
        Ok(format!("{ARN_PREFIX}:endpoint/{}", endpoint.endpoint_name))
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> TrainingResult<EndpointDescription> {
        let endpoint = self.endpoint(endpoint_name).await?;
        Ok(simulated_endpoint(&endpoint, Utc::now(), self.runtime))
    }

    async fn invoke_endpoint(&self, endpoint_name: &str, request: &InvokeRequest) -> TrainingResult<String> {
        self.endpoint(endpoint_name).await?;
        Ok(simulated_generation(&request.prompt))
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use crate::training::{algorithm_for, ResourceConfig};
    use std::collections::BTreeMap;

    fn job(created_at: DateTime<Utc>) -> SimulatedJob {
        SimulatedJob {
            job_name: "llm-tune-job".into(),
            instance_type: "ml.g5.2xlarge".into(),
            output_uri: "s3://bucket/users/u/models/llm-tune-job/".into(),
            epochs: 3,
            created_at,
            stopped_at: None,
        }
    }

    fn spec(name: &str) -> TrainingJobSpec {
        TrainingJobSpec {
            job_name: name.into(),
            role_arn: "role".into(),
            algorithm_specification: algorithm_for("llama-2-7b"),
            training_data_uri: "s3://bucket/data/".into(),
            content_type: "application/jsonlines".into(),
            output_uri: "s3://bucket/out/".into(),
            resource_config: ResourceConfig {
                instance_type: "ml.g5.4xlarge".into(),
                instance_count: 1,
                volume_size_gb: 30,
            },
            max_runtime_in_seconds: 10_800,
            hyper_parameters: BTreeMap::from([("epochs".to_string(), "2".to_string())]),
            tags: Vec::new(),
        }
    }

    #[test]
    fn loss_floor() {
        assert!((simulated_loss(1) - 1.7).abs() < 1e-9);
        assert!((simulated_loss(6) - 0.2).abs() < 1e-9);
        assert_eq!(simulated_loss(10), 0.1);
        assert_eq!(simulated_loss(40), 0.1);
    }

    #[test]
    fn in_progress_then_completed() {
        let created = Utc::now();
        let runtime = Duration::from_secs(600);

        let running = simulated_description(&job(created), created + chrono::Duration::seconds(60), runtime);
        assert_eq!(running.status, JobStatus::InProgress);
        assert!(running.model_artifacts_uri.is_none());
        assert!(running.final_metrics.is_empty());

        let done = simulated_description(&job(created), created + chrono::Duration::seconds(601), runtime);
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.end_time, Some(created + chrono::Duration::seconds(600)));
        assert_eq!(
            done.model_artifacts_uri.as_deref(),
            Some("s3://bucket/users/u/models/llm-tune-job/llm-tune-job/output/model.tar.gz")
        );
        assert_eq!(done.final_metrics.len(), 3);
        assert_eq!(done.final_metrics[2].timestamp, created + chrono::Duration::seconds(600));
    }

    #[test]
    fn stopped_before_completion() {
        let created = Utc::now();
        let mut stopped = job(created);
        stopped.stopped_at = Some(created + chrono::Duration::seconds(5));

        let description = simulated_description(&stopped, created + chrono::Duration::hours(1), Duration::from_secs(600));
        assert_eq!(description.status, JobStatus::Stopped);
        assert_eq!(description.end_time, stopped.stopped_at);
    }

    #[tokio::test]
    async fn job_lifecycle_through_store() {
        let service = SimulatedTrainingService::new(Arc::new(MemoryKvStore::new()), Duration::ZERO);
        assert!(service.is_simulated());

        let arn = service.create_job(&spec("job-a")).await.unwrap();
        assert!(arn.ends_with(":training-job/job-a"));

        let described = service.describe_job("job-a").await.unwrap();
        assert_eq!(described.status, JobStatus::Completed);
        assert_eq!(described.instance_type, "ml.g5.4xlarge");
        assert_eq!(described.final_metrics.len(), 2);

        let duplicate = service.create_job(&spec("job-a")).await.unwrap_err();
        assert!(matches!(duplicate, TrainingError::JobExists(_)));

        let missing = service.describe_job("nope").await.unwrap_err();
        assert!(matches!(missing, TrainingError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn stop_marks_running_job() {
        let service =
            SimulatedTrainingService::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(3600));
        service.create_job(&spec("job-b")).await.unwrap();
        service.stop_job("job-b").await.unwrap();

        assert_eq!(service.describe_job("job-b").await.unwrap().status, JobStatus::Stopped);
    }

    #[tokio::test]
    async fn endpoint_and_invoke() {
        let service = SimulatedTrainingService::new(Arc::new(MemoryKvStore::new()), Duration::ZERO);
        let endpoint = EndpointSpec {
            endpoint_name: "job-a-ep".into(),
            model_artifacts_uri: "s3://bucket/model.tar.gz".into(),
            instance_type: "ml.g5.2xlarge".into(),
            initial_instance_count: 1,
            role_arn: "role".into(),
            tags: Vec::new(),
        };
        service.create_endpoint(&endpoint).await.unwrap();

        let described = service.describe_endpoint("job-a-ep").await.unwrap();
        assert_eq!(described.status, EndpointState::InService);

        let request = InvokeRequest {
            prompt: "Hello".into(),
            max_new_tokens: 10,
            temperature: 0.5,
        };
        let text = service.invoke_endpoint("job-a-ep", &request).await.unwrap();
        assert!(text.starts_with("Hello"));

        let missing = service.invoke_endpoint("other", &request).await.unwrap_err();
        assert!(matches!(missing, TrainingError::EndpointNotFound(_)));
    }
}
