//! LLM Tuner dataset normalization
//!
//! The one piece of real logic in the platform: turning the content of an
//! uploaded file into an ordered list of training samples.
//!
//! # Supported formats
//!
//! - `.json`: array of objects (`text` > `content` > `description`) or scalars
//! - `.jsonl`: one JSON document per line, malformed lines kept verbatim
//! - `.csv`: header dropped, remaining lines kept verbatim
//! - anything else: plain text, lines longer than 10 characters
//!
//! # Architecture
//!
//! ```text
//! bytes → decode_utf8 → content ─┬─ normalize(format) → Vec<String> → InstructionRecord → JSONL
//!                                └─ SampleCache (content-addressed)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tuner_dataset::{normalize, DatasetFormat};
//!
//! let samples = normalize("a: b\nc: d\n\n", DatasetFormat::Csv);
//! assert_eq!(samples, vec!["c: d".to_string()]);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod cache;
pub mod error;
pub mod format;
pub mod instruction;
pub mod parsers;
pub mod preview;

// Re-exports for convenience
pub use cache::{CacheStats, SampleCache, SampleKey};
pub use error::{decode_utf8, DatasetError, DatasetResult};
pub use format::{extension_tag, DatasetFormat};
pub use instruction::{to_jsonl, InstructionRecord, CONTINUE_INSTRUCTION};
pub use parsers::{extractor_for, normalize, SampleExtractor};
pub use preview::{preview, DatasetReport, CONTENT_PREVIEW_CHARS, SAMPLE_PREVIEW_CHARS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with datasets
    pub use crate::cache::SampleCache;
    pub use crate::error::{decode_utf8, DatasetError};
    pub use crate::format::DatasetFormat;
    pub use crate::instruction::InstructionRecord;
    pub use crate::parsers::normalize;
    pub use crate::preview::{preview, DatasetReport};
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_example_drops_header_and_blank_lines() {
        let samples = normalize("a: b\nc: d\n\n", DatasetFormat::from_extension(".csv"));
        assert_eq!(samples, vec!["c: d".to_string()]);
    }

    #[test]
    fn json_example_mixes_objects_and_scalars() {
        let content = r#"[{"text":"hello"},{"content":"world"},"plain"]"#;
        let samples = normalize(content, DatasetFormat::from_extension(".json"));
        assert_eq!(samples, vec!["hello", "world", "plain"]);
    }

    #[test]
    fn samples_feed_instruction_records() {
        let samples = normalize("this line is long enough\nshort", DatasetFormat::PlainText);
        let records: Vec<_> = samples.iter().map(|s| InstructionRecord::from_sample(s)).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input, "this line is long enough");
        assert_eq!(records[0].output, "this line is long enough");
    }
}
