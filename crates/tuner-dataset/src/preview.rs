//! Previews and dataset summaries

use crate::format::DatasetFormat;
use crate::parsers::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview length for individual samples
pub const SAMPLE_PREVIEW_CHARS: usize = 150;

/// Preview length for raw upload content
pub const CONTENT_PREVIEW_CHARS: usize = 200;

/// Number of samples shown in a report
pub const REPORT_SAMPLES: usize = 5;

/// First `limit` characters of `text`, with `...` appended when truncated
///
/// ```rust
/// use tuner_dataset::preview;
///
/// assert_eq!(preview("abcdef", 3), "abc...");
/// assert_eq!(preview("abc", 3), "abc");
/// ```
#[must_use]
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

/// Summary of a normalized dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport {
    /// Format the content was read as
    pub format: DatasetFormat,
    /// Content length in characters
    pub content_chars: usize,
    /// Number of `\n`-separated lines
    pub line_count: usize,
    /// Number of extracted samples
    pub sample_count: usize,
    /// Previews of the first samples
    pub samples_preview: Vec<String>,
}

impl DatasetReport {
    /// Normalize content and summarize the result
    #[must_use]
    pub fn summarize(content: &str, format: DatasetFormat) -> Self {
        Self::from_samples(content, format, &normalize(content, format))
    }

    /// Summarize already extracted samples
    #[must_use]
    pub fn from_samples(content: &str, format: DatasetFormat, samples: &[String]) -> Self {
        Self {
            format,
            content_chars: content.chars().count(),
            line_count: if content.is_empty() { 0 } else { content.split('\n').count() },
            sample_count: samples.len(),
            samples_preview: samples
                .iter()
                .take(REPORT_SAMPLES)
                .map(|s| preview(s, SAMPLE_PREVIEW_CHARS))
                .collect(),
        }
    }

    /// Whether no samples were found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Format: {}", self.format)?;
        writeln!(f, "Content: {} chars, {} lines", self.content_chars, self.line_count)?;
        writeln!(f, "Found {} training samples", self.sample_count)?;
        for (i, sample) in self.samples_preview.iter().enumerate() {
            writeln!(f, "Sample {}: {sample}", i + 1)?;
        }
        Ok(())
    }
}
