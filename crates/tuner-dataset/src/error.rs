//! Error types for dataset ingestion
//!
//! Extraction itself never fails; errors come from the edges:
//! - Decode (upload bytes → text)
//! - Serialize (records → JSON Lines)

/// Errors while turning uploaded bytes into training data
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Upload is not valid UTF-8
    #[error("file '{name}' is not valid UTF-8 (invalid byte at offset {offset})")]
    InvalidEncoding {
        /// Original file name
        name: String,
        /// Byte offset of the first invalid sequence
        offset: usize,
    },

    /// Record serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatasetError {
    /// Create encoding error for a file
    pub fn invalid_encoding(name: impl Into<String>, offset: usize) -> Self {
        Self::InvalidEncoding {
            name: name.into(),
            offset,
        }
    }
}

/// Result type alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Decode upload bytes as UTF-8 text
///
/// A leading byte-order mark is stripped.
///
/// # Errors
///
/// Returns [`DatasetError::InvalidEncoding`] with the offset of the first
/// invalid byte.
pub fn decode_utf8(name: &str, bytes: &[u8]) -> DatasetResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_owned()),
        Err(e) => Err(DatasetError::invalid_encoding(name, e.valid_up_to())),
    }
}
