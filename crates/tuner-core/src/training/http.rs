//! Training service gateway client
//!
//! ```text
//! POST {base}/training-jobs                      → {"job_arn": ...}
//! GET  {base}/training-jobs/{name}               → JobDescription, 404 when unknown
//! POST {base}/training-jobs/{name}/stop          → 200/202
//! POST {base}/endpoints                          → {"endpoint_arn": ...}
//! GET  {base}/endpoints/{name}                   → EndpointDescription, 404 when unknown
//! POST {base}/endpoints/{name}/invocations       → [{"generated_text": ...}]
//! ```

use super::{
    EndpointDescription, EndpointSpec, InvokeRequest, JobDescription, TrainingJobSpec,
    TrainingService,
};
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct JobCreatedResponse {
    job_arn: String,
}

#[derive(Debug, Deserialize)]
struct EndpointCreatedResponse {
    endpoint_arn: String,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// [`TrainingService`] over the REST gateway in front of the managed service
#[derive(Debug, Clone)]
pub struct HttpTrainingService {
    client: Client,
    base: Url,
}

impl HttpTrainingService {
    /// Create client for a gateway base URL
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Service`] if the URL is invalid or the client
    /// cannot be built.
    pub fn new(base: &str, timeout: Duration) -> TrainingResult<Self> {
        let base = Url::parse(base).map_err(|e| TrainingError::service("configure", format!("{base}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrainingError::service("configure", e.to_string()))?;
        Ok(Self { client, base })
    }

    fn url(&self, operation: &'static str, segments: &[&str]) -> TrainingResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TrainingError::service(operation, format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> TrainingResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| TrainingError::service(operation, e.to_string()))?;
        tracing::debug!(operation, status = %response.status(), "training service response");
        Ok(response)
    }
}

async fn body<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> TrainingResult<T> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(TrainingError::service(operation, format!("{status}: {detail}")));
    }
    response
        .json()
        .await
        .map_err(|e| TrainingError::service(operation, format!("malformed response: {e}")))
}

#[async_trait]
impl TrainingService for HttpTrainingService {
    async fn create_job(&self, spec: &TrainingJobSpec) -> TrainingResult<String> {
        let url = self.url("create_job", &["training-jobs"])?;
        let response = self.send("create_job", self.client.post(url).json(spec)).await?;
        let created: JobCreatedResponse = body("create_job", response).await?;
        Ok(created.job_arn)
    }

    async fn describe_job(&self, job_name: &str) -> TrainingResult<JobDescription> {
        let url = self.url("describe_job", &["training-jobs", job_name])?;
        let response = self.send("describe_job", self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrainingError::JobNotFound(job_name.to_string()));
        }
        body("describe_job", response).await
    }

    async fn stop_job(&self, job_name: &str) -> TrainingResult<()> {
        let url = self.url("stop_job", &["training-jobs", job_name, "stop"])?;
        let response = self.send("stop_job", self.client.post(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(TrainingError::JobNotFound(job_name.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(TrainingError::service("stop_job", status.to_string())),
        }
    }

    async fn create_endpoint(&self, spec: &EndpointSpec) -> TrainingResult<String> {
        let url = self.url("create_endpoint", &["endpoints"])?;
        let response = self.send("create_endpoint", self.client.post(url).json(spec)).await?;
        let created: EndpointCreatedResponse = body("create_endpoint", response).await?;
        Ok(created.endpoint_arn)
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> TrainingResult<EndpointDescription> {
        let url = self.url("describe_endpoint", &["endpoints", endpoint_name])?;
        let response = self.send("describe_endpoint", self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrainingError::EndpointNotFound(endpoint_name.to_string()));
        }
        body("describe_endpoint", response).await
    }

    async fn invoke_endpoint(&self, endpoint_name: &str, request: &InvokeRequest) -> TrainingResult<String> {
        let url = self.url("invoke_endpoint", &["endpoints", endpoint_name, "invocations"])?;
        let payload = json!({
            "inputs": request.prompt,
            "parameters": {
                "max_new_tokens": request.max_new_tokens,
                "temperature": request.temperature,
            },
        });
        let response = self
            .send("invoke_endpoint", self.client.post(url).json(&payload))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrainingError::EndpointNotFound(endpoint_name.to_string()));
        }
        let generations: Vec<Generation> = body("invoke_endpoint", response).await?;
        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| TrainingError::service("invoke_endpoint", "empty generation list"))
    }
}
