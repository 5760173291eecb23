//! Offline commands behind the `llm-tuner` binary

use anyhow::Context;
use std::fmt::Write as _;
use std::path::Path;
use tuner_core::Hyperparameters;
use tuner_dataset::{decode_utf8, DatasetFormat, DatasetReport};

/// Outcome of parsing `--hyperparameters`
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedHyperparameters {
    /// Flag not given
    Absent,
    /// Parsed, with defaults filled in
    Parsed(Hyperparameters),
    /// Not valid JSON for a hyperparameter set
    Invalid(String),
}

impl ParsedHyperparameters {
    /// Parse the raw flag value
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Absent,
            Some(raw) => match serde_json::from_str::<Hyperparameters>(raw) {
                Ok(params) => Self::Parsed(params),
                Err(e) => Self::Invalid(e.to_string()),
            },
        }
    }
}

/// Normalize a local file and render the report
///
/// The format comes from `type_tag` when given, otherwise from the file
/// extension. Invalid hyperparameters produce a warning line, not an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not UTF-8.
pub fn normalize_file(path: &Path, type_tag: Option<&str>, hyperparameters: Option<&str>) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path.display().to_string();
    let content = decode_utf8(&name, &bytes)?;
    let format = type_tag.map_or_else(|| DatasetFormat::from_file_name(&name), DatasetFormat::from_extension);

    let report = DatasetReport::summarize(&content, format);
    tracing::info!(file = %name, format = %format, samples = report.sample_count, "normalized file");

    let mut out = format!("File: {name}\n{report}");
    match ParsedHyperparameters::parse(hyperparameters) {
        ParsedHyperparameters::Absent => {}
        ParsedHyperparameters::Parsed(params) => {
            let json = serde_json::to_string_pretty(&params)?;
            writeln!(out, "Hyperparameters:\n{json}")?;
        }
        ParsedHyperparameters::Invalid(reason) => {
            tracing::warn!(%reason, "ignoring unparseable hyperparameters");
            writeln!(out, "Warning: could not parse hyperparameters ({reason})")?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reports_samples_from_extension() {
        let file = temp_file(".jsonl", "{\"text\": \"first sample\"}\n{\"content\": \"second\"}\n");
        let out = normalize_file(file.path(), None, None).unwrap();
        assert!(out.contains("Found 2 training samples"));
        assert!(out.contains("Sample 1: first sample"));
        assert!(!out.contains("Hyperparameters"));
    }

    #[test]
    fn explicit_type_overrides_extension() {
        let file = temp_file(".txt", "question,answer\nrow one\nrow two\n");
        let out = normalize_file(file.path(), Some("csv"), None).unwrap();
        assert!(out.contains("Found 2 training samples"));
    }

    #[test]
    fn echoes_hyperparameters_with_defaults() {
        let file = temp_file(".txt", "a line that is long enough\n");
        let out = normalize_file(file.path(), None, Some(r#"{"epochs": 3}"#)).unwrap();
        assert!(out.contains("\"epochs\": 3"));
        assert!(out.contains("\"batch_size\": 32"));
    }

    #[test]
    fn bad_hyperparameters_warn_and_continue() {
        let file = temp_file(".txt", "a line that is long enough\n");
        let out = normalize_file(file.path(), None, Some("{not json")).unwrap();
        assert!(out.contains("Found 1 training samples"));
        assert!(out.contains("Warning: could not parse hyperparameters"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = normalize_file(Path::new("/nonexistent/data.txt"), None, None).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
