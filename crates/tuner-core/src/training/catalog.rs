//! Base-model catalog, algorithm specifications and instance pricing

use serde::{Deserialize, Serialize};

/// Hourly price used for instance types missing from the table
pub const DEFAULT_HOURLY_COST: f64 = 1.21;

const INSTANCE_COSTS: [(&str, f64); 6] = [
    ("ml.g5.2xlarge", 1.21),
    ("ml.g5.4xlarge", 1.83),
    ("ml.g5.8xlarge", 2.42),
    ("ml.p3.2xlarge", 3.06),
    ("ml.p3.8xlarge", 12.24),
    ("ml.p4d.24xlarge", 37.69),
];

const TRAINING_IMAGE: &str = "763104351884.dkr.ecr.us-east-1.amazonaws.com/huggingface-pytorch-training:2.0.0-transformers4.28.1-gpu-py310-cu118-ubuntu20.04";

/// Approximate USD/hour for an instance type
#[must_use]
pub fn hourly_cost(instance_type: &str) -> f64 {
    INSTANCE_COSTS
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map_or(DEFAULT_HOURLY_COST, |(_, cost)| *cost)
}

/// Cost of running `instance_type` for `duration_seconds`, rounded to cents
#[must_use]
pub fn training_cost(instance_type: &str, duration_seconds: f64) -> f64 {
    round_cents(hourly_cost(instance_type) * duration_seconds / 3600.0)
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cost estimate response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Instance type priced
    pub instance_type: String,
    /// USD per hour
    pub hourly_cost: f64,
    /// Hours requested
    pub estimated_hours: f64,
    /// USD total, rounded to cents
    pub estimated_total: f64,
}

impl CostEstimate {
    /// Price `hours` on `instance_type`
    #[must_use]
    pub fn new(instance_type: &str, hours: f64) -> Self {
        let hourly = hourly_cost(instance_type);
        Self {
            instance_type: instance_type.to_string(),
            hourly_cost: hourly,
            estimated_hours: hours,
            estimated_total: round_cents(hourly * hours),
        }
    }
}

/// Fine-tunable base model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Service model id
    pub model_id: String,
    /// Display name
    pub model_name: String,
    /// Short description
    pub description: String,
    /// Task family
    pub task: String,
    /// Training framework
    pub framework: String,
    /// Supported instance types
    pub instance_types: Vec<String>,
    /// Smallest supported instance type
    pub min_instance: String,
}

fn base_model(
    model_id: &str,
    model_name: &str,
    description: &str,
    task: &str,
    instance_types: [&str; 3],
) -> BaseModel {
    BaseModel {
        model_id: model_id.to_string(),
        model_name: model_name.to_string(),
        description: description.to_string(),
        task: task.to_string(),
        framework: "huggingface".to_string(),
        instance_types: instance_types.iter().map(|s| (*s).to_string()).collect(),
        min_instance: instance_types[0].to_string(),
    }
}

/// Base models available for fine-tuning
#[must_use]
pub fn catalog() -> Vec<BaseModel> {
    vec![
        base_model(
            "huggingface-llm-llama-2-7b-f",
            "Llama 2 7B",
            "Meta Llama 2 7B - Fine-tuning ready",
            "text-generation",
            ["ml.g5.2xlarge", "ml.g5.4xlarge", "ml.p3.2xlarge"],
        ),
        base_model(
            "huggingface-llm-llama-2-13b-f",
            "Llama 2 13B",
            "Meta Llama 2 13B - Fine-tuning ready",
            "text-generation",
            ["ml.g5.4xlarge", "ml.g5.8xlarge", "ml.p3.8xlarge"],
        ),
        base_model(
            "huggingface-text2text-flan-t5-xl",
            "FLAN-T5 XL",
            "Google FLAN-T5 XL - Instruction-tuned",
            "text2text-generation",
            ["ml.g5.2xlarge", "ml.g5.4xlarge", "ml.p3.2xlarge"],
        ),
    ]
}

/// Regex the service uses to scrape a metric from job logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDefinition {
    /// Metric name
    pub name: String,
    /// Capture pattern
    pub regex: String,
}

/// Container and metrics for a training job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlgorithmSpec {
    /// Input mode
    pub training_input_mode: String,
    /// Container image
    pub training_image: String,
    /// Scraped metrics
    pub metric_definitions: Vec<MetricDefinition>,
}

fn metric(name: &str) -> MetricDefinition {
    MetricDefinition {
        name: name.to_string(),
        regex: format!("{name}: ([0-9\\.]+)"),
    }
}

/// Algorithm specification for a base model
///
/// Matches short names (`llama-2-13b`) and catalog ids alike. FLAN-T5 only
/// reports training loss; unknown models get the Llama 2 7B setup.
#[must_use]
pub fn algorithm_for(base_model: &str) -> AlgorithmSpec {
    let metric_definitions = if base_model.contains("flan-t5") {
        vec![metric("train_loss")]
    } else {
        vec![metric("train_loss"), metric("eval_loss")]
    };
    AlgorithmSpec {
        training_input_mode: "File".to_string(),
        training_image: TRAINING_IMAGE.to_string(),
        metric_definitions,
    }
}
