//! Training hyperparameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Warmup steps passed to every managed job
pub const WARMUP_STEPS: u32 = 100;

/// LoRA adapter settings passed to every managed job
pub const LORA_R: u32 = 16;
/// LoRA scaling factor
pub const LORA_ALPHA: u32 = 32;
/// LoRA dropout
pub const LORA_DROPOUT: f64 = 0.1;

/// Hyperparameter set
///
/// Every field defaults independently when absent. Values are not range
/// checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Optimizer step size
    pub learning_rate: f64,
    /// Samples per batch
    pub batch_size: u32,
    /// Passes over the dataset
    pub epochs: u32,
    /// Optimizer name
    pub optimizer: String,
    /// L2 penalty
    pub weight_decay: f64,
    /// Maximum tokens per sample
    pub max_sequence_length: u32,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 10,
            optimizer: "adam".to_string(),
            weight_decay: 0.01,
            max_sequence_length: 2048,
        }
    }
}

impl Hyperparameters {
    /// Stringified parameters for a managed fine-tuning job
    ///
    /// Adds the base model, warmup and the LoRA adapter settings.
    #[must_use]
    pub fn to_service_parameters(&self, base_model: &str) -> BTreeMap<String, String> {
        [
            ("base_model", base_model.to_string()),
            ("learning_rate", self.learning_rate.to_string()),
            ("batch_size", self.batch_size.to_string()),
            ("epochs", self.epochs.to_string()),
            ("max_sequence_length", self.max_sequence_length.to_string()),
            ("optimizer", self.optimizer.clone()),
            ("warmup_steps", WARMUP_STEPS.to_string()),
            ("weight_decay", self.weight_decay.to_string()),
            ("use_peft", "True".to_string()),
            ("peft_type", "lora".to_string()),
            ("lora_r", LORA_R.to_string()),
            ("lora_alpha", LORA_ALPHA.to_string()),
            ("lora_dropout", LORA_DROPOUT.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_default_independently() {
        let hp: Hyperparameters = serde_json::from_str(r#"{"epochs": 3, "optimizer": "sgd"}"#).unwrap();
        assert_eq!(hp.epochs, 3);
        assert_eq!(hp.optimizer, "sgd");
        assert_eq!(hp.learning_rate, 0.001);
        assert_eq!(hp.batch_size, 32);
        assert_eq!(hp.max_sequence_length, 2048);
    }

    #[test]
    fn empty_object_is_default() {
        let hp: Hyperparameters = serde_json::from_str("{}").unwrap();
        assert_eq!(hp, Hyperparameters::default());
    }

    #[test]
    fn no_bounds_checking() {
        let hp: Hyperparameters = serde_json::from_str(r#"{"learning_rate": -5.0, "epochs": 0}"#).unwrap();
        assert_eq!(hp.learning_rate, -5.0);
        assert_eq!(hp.epochs, 0);
    }

    #[test]
    fn service_parameters_are_strings() {
        let params = Hyperparameters::default().to_service_parameters("llama-2-7b");
        assert_eq!(params["base_model"], "llama-2-7b");
        assert_eq!(params["learning_rate"], "0.001");
        assert_eq!(params["epochs"], "10");
        assert_eq!(params["warmup_steps"], "100");
        assert_eq!(params["use_peft"], "True");
        assert_eq!(params["lora_r"], "16");
        assert_eq!(params["lora_alpha"], "32");
        assert_eq!(params["lora_dropout"], "0.1");
    }
}
