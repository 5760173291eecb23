//! `.json` datasets
//!
//! Uses serde_json; a document that fails to parse is treated as plain lines.

use super::{non_empty_lines, object_sample, scalar_sample, SampleExtractor};
use crate::format::DatasetFormat;
use serde_json::Value;

/// Field priority for objects inside a JSON array
pub const JSON_TEXT_FIELDS: [&str; 3] = ["text", "content", "description"];

/// Extractor for single-document JSON files
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl SampleExtractor for JsonExtractor {
    fn format(&self) -> DatasetFormat {
        DatasetFormat::Json
    }

    fn extract(&self, content: &str) -> Vec<String> {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => object_sample(map, &JSON_TEXT_FIELDS),
                    other => scalar_sample(other),
                })
                .collect(),
            Ok(other) => scalar_sample(&other).into_iter().collect(),
            Err(e) => {
                tracing::debug!(error = %e, "json parse failed, splitting lines");
                non_empty_lines(content).map(str::to_owned).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(content: &str) -> Vec<String> {
        JsonExtractor.extract(content)
    }

    #[test]
    fn array_of_objects_uses_field_priority() {
        let content = r#"[
            {"text": "t1", "content": "c1"},
            {"content": "c2", "description": "d2"},
            {"description": "d3"},
            {"label": 1}
        ]"#;
        assert_eq!(extract(content), vec!["t1", "c2", "d3", r#"{"label":1}"#]);
    }

    #[test]
    fn mixed_array() {
        let content = r#"[{"text":"hello"},{"content":"world"},"plain"]"#;
        assert_eq!(extract(content), vec!["hello", "world", "plain"]);
    }

    #[test]
    fn scalars_are_stringified() {
        assert_eq!(extract("[1, true, null, [2]]"), vec!["1", "true", "null", "[2]"]);
    }

    #[test]
    fn root_object_is_single_sample() {
        assert_eq!(extract(r#"{"text": "not unwrapped"}"#), vec![r#"{"text":"not unwrapped"}"#]);
    }

    #[test]
    fn root_string_is_single_sample() {
        assert_eq!(extract(r#""just text""#), vec!["just text"]);
    }

    #[test]
    fn object_text_is_trimmed() {
        assert_eq!(extract(r#"[{"text": "  padded  "}]"#), vec!["padded"]);
    }

    #[test]
    fn bare_strings_keep_their_padding() {
        assert_eq!(
            extract(r#"["  plain  ", {"text": "  padded  "}, "   "]"#),
            vec!["  plain  ", "padded"]
        );
    }

    #[test]
    fn invalid_json_falls_back_to_lines() {
        let content = "{not json\n\n  second line  \n";
        assert_eq!(extract(content), vec!["{not json", "second line"]);
    }

    #[test]
    fn fallback_has_no_length_threshold() {
        assert_eq!(extract("[oops\nab"), vec!["[oops", "ab"]);
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("[]").is_empty());
    }
}
