//! Declared dataset formats
//!
//! Uploads carry a type tag derived from the file extension. Only three tags
//! get special treatment; everything else is plain text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Format of an uploaded dataset file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// A single JSON document
    Json,
    /// One JSON document per line
    #[serde(rename = "jsonl")]
    JsonLines,
    /// Comma separated values with a header line
    Csv,
    /// Plain text and unknown types
    #[default]
    #[serde(rename = "txt")]
    PlainText,
}

impl DatasetFormat {
    /// Map a type tag such as `.jsonl` or `CSV` to a format
    ///
    /// The leading dot is optional and matching is case-insensitive.
    /// Unknown tags fall back to [`DatasetFormat::PlainText`].
    #[must_use]
    pub fn from_extension(tag: &str) -> Self {
        let tag = tag.trim();
        let tag = tag.strip_prefix('.').unwrap_or(tag);
        match tag.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "jsonl" => Self::JsonLines,
            "csv" => Self::Csv,
            _ => Self::PlainText,
        }
    }

    /// Derive the format from a file name
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map_or(Self::PlainText, Self::from_extension)
    }

    /// Canonical extension, with leading dot
    #[inline]
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::JsonLines => ".jsonl",
            Self::Csv => ".csv",
            Self::PlainText => ".txt",
        }
    }
}

/// Lowercased extension of a file name with leading dot, or empty
///
/// This is the `type` reported back to clients, which may be a tag the
/// normalizer treats as plain text (e.g. `.md`).
#[must_use]
pub fn extension_tag(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
