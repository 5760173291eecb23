//! `.jsonl` datasets

use super::{non_empty_lines, object_sample, scalar_sample, SampleExtractor};
use crate::format::DatasetFormat;
use serde_json::Value;

/// Field priority for JSON-Lines objects
pub const JSONL_TEXT_FIELDS: [&str; 2] = ["text", "content"];

/// Extractor for JSON-Lines files
///
/// Every line is independent; a line that is not valid JSON is kept as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesExtractor;

impl SampleExtractor for JsonLinesExtractor {
    fn format(&self) -> DatasetFormat {
        DatasetFormat::JsonLines
    }

    fn extract(&self, content: &str) -> Vec<String> {
        non_empty_lines(content)
            .filter_map(|line| match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => object_sample(&map, &JSONL_TEXT_FIELDS),
                Ok(other) => scalar_sample(&other),
                Err(_) => Some(line.to_string()),
            })
            .collect()
    }
}
