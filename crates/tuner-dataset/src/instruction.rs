//! Instruction-format training records
//!
//! The managed training job consumes JSON Lines of
//! `{"instruction", "input", "output"}` objects built from plain samples.

use crate::error::DatasetResult;
use serde::{Deserialize, Serialize};

/// Instruction attached to every record
pub const CONTINUE_INSTRUCTION: &str = "Continue the following text:";

/// Characters of a sample used as the record input
pub const INPUT_CHARS: usize = 100;

/// One training record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Task instruction
    pub instruction: String,
    /// Prompt text
    pub input: String,
    /// Expected completion
    pub output: String,
}

impl InstructionRecord {
    /// Build a continuation record from a sample
    ///
    /// Input is the first 100 characters. Output is the remainder when the
    /// sample is longer than that, otherwise the whole sample.
    #[must_use]
    pub fn from_sample(sample: &str) -> Self {
        let (input, output) = match sample.char_indices().nth(INPUT_CHARS) {
            Some((cut, _)) => (&sample[..cut], &sample[cut..]),
            None => (sample, sample),
        };
        Self {
            instruction: CONTINUE_INSTRUCTION.to_owned(),
            input: input.to_owned(),
            output: output.to_owned(),
        }
    }
}

/// Serialize records as JSON Lines (no trailing newline)
///
/// # Errors
///
/// Returns [`crate::DatasetError::Serialization`] if a record fails to encode.
pub fn to_jsonl(records: &[InstructionRecord]) -> DatasetResult<String> {
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_sample_is_input_and_output() {
        let record = InstructionRecord::from_sample("short sample");
        assert_eq!(record.instruction, CONTINUE_INSTRUCTION);
        assert_eq!(record.input, "short sample");
        assert_eq!(record.output, "short sample");
    }

    #[test]
    fn exactly_100_chars_is_not_split() {
        let sample = "a".repeat(100);
        let record = InstructionRecord::from_sample(&sample);
        assert_eq!(record.input, sample);
        assert_eq!(record.output, sample);
    }

    #[test]
    fn long_sample_is_split_on_chars() {
        let sample = format!("{}tail", "é".repeat(100));
        let record = InstructionRecord::from_sample(&sample);
        assert_eq!(record.input.chars().count(), 100);
        assert_eq!(record.output, "tail");
    }

    #[test]
    fn jsonl_layout() {
        let records = vec![
            InstructionRecord::from_sample("one sample"),
            InstructionRecord::from_sample("two sample"),
        ];
        let jsonl = to_jsonl(&records).unwrap();
        let lines: Vec<_> = jsonl.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"instruction":"Continue the following text:","input":"one sample","output":"one sample"}"#
        );
        assert!(to_jsonl(&[]).unwrap().is_empty());
    }
}
