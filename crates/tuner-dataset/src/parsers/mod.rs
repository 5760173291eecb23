//! Sample extractors for the supported dataset formats
//!
//! Each format has one extractor turning file content into an ordered list of
//! non-empty training samples. [`normalize`] picks the extractor for a format.

use crate::format::DatasetFormat;
use serde_json::{Map, Value};

mod csv;
mod json;
mod jsonl;
mod text;

pub use csv::CsvExtractor;
pub use json::{JsonExtractor, JSON_TEXT_FIELDS};
pub use jsonl::{JsonLinesExtractor, JSONL_TEXT_FIELDS};
pub use text::{PlainTextExtractor, MIN_TEXT_SAMPLE_CHARS};

/// Extractor trait for turning raw file content into training samples
///
/// Implementations are pure: no IO, no logging side effects beyond tracing,
/// and never fail. Malformed input degrades to a simpler strategy.
pub trait SampleExtractor: Send + Sync + 'static {
    /// Format handled by this extractor
    fn format(&self) -> DatasetFormat;

    /// Extract samples in order of appearance
    fn extract(&self, content: &str) -> Vec<String>;
}

/// Get the extractor for a format
#[must_use]
pub fn extractor_for(format: DatasetFormat) -> &'static dyn SampleExtractor {
    match format {
        DatasetFormat::Json => &JsonExtractor,
        DatasetFormat::JsonLines => &JsonLinesExtractor,
        DatasetFormat::Csv => &CsvExtractor,
        DatasetFormat::PlainText => &PlainTextExtractor,
    }
}

/// Normalize file content into training samples
///
/// # Example
///
/// ```rust
/// use tuner_dataset::{normalize, DatasetFormat};
///
/// let samples = normalize("{\"text\": \"hi\"}\nnot json", DatasetFormat::JsonLines);
/// assert_eq!(samples, vec!["hi", "not json"]);
/// ```
#[must_use]
pub fn normalize(content: &str, format: DatasetFormat) -> Vec<String> {
    let samples = extractor_for(format).extract(content);
    tracing::debug!(
        format = %format,
        content_chars = content.chars().count(),
        samples = samples.len(),
        "normalized dataset"
    );
    samples
}

/// Non-empty trimmed lines, in order
pub(crate) fn non_empty_lines(content: &str) -> impl Iterator<Item = &str> {
    content.split('\n').map(str::trim).filter(|line| !line.is_empty())
}

/// Whether a field value counts as present
///
/// Null, `false`, zero, and empty strings/collections are absent, so the next
/// field in priority order is tried.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Sample for a JSON object: first present field, else the whole object
///
/// A selected string that trims to nothing yields no sample.
pub(crate) fn object_sample(object: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    match fields.iter().find_map(|f| object.get(*f).filter(|v| is_present(v))) {
        Some(Value::String(text)) => trimmed(text),
        Some(other) => Some(other.to_string()),
        None => Some(Value::Object(object.clone()).to_string()),
    }
}

/// String representation of a non-object value
///
/// Strings are used verbatim, surrounding whitespace included, unless they
/// are blank; everything else becomes compact JSON.
pub(crate) fn scalar_sample(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => (!text.trim().is_empty()).then(|| text.clone()),
        other => Some(other.to_string()),
    }
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
