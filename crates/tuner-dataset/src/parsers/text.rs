//! Plain text datasets (`.txt` and unknown types)

use super::{non_empty_lines, SampleExtractor};
use crate::format::DatasetFormat;

/// Lines must be strictly longer than this (in characters) to be kept
pub const MIN_TEXT_SAMPLE_CHARS: usize = 10;

/// Extractor for plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl SampleExtractor for PlainTextExtractor {
    fn format(&self) -> DatasetFormat {
        DatasetFormat::PlainText
    }

    fn extract(&self, content: &str) -> Vec<String> {
        non_empty_lines(content)
            .filter(|line| line.chars().count() > MIN_TEXT_SAMPLE_CHARS)
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(content: &str) -> Vec<String> {
        PlainTextExtractor.extract(content)
    }

    #[test]
    fn threshold_is_strict() {
        // 10 chars dropped, 11 kept
        assert_eq!(extract("0123456789\n0123456789a"), vec!["0123456789a"]);
    }

    #[test]
    fn length_measured_after_trim() {
        assert_eq!(extract("     short     \n   long enough line  "), vec!["long enough line"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 10 chars, 20 bytes
        assert!(extract("éééééééééé").is_empty());
        assert_eq!(extract("ééééééééééé"), vec!["ééééééééééé"]);
    }

    #[test]
    fn trailing_newline_ignored() {
        assert_eq!(extract("a sufficiently long line\n"), vec!["a sufficiently long line"]);
    }
}
