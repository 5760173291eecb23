//! `.csv` datasets
//!
//! Rows are not split into columns: each data line is one sample.

use super::{non_empty_lines, SampleExtractor};
use crate::format::DatasetFormat;

/// Extractor for CSV files
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExtractor;

impl SampleExtractor for CsvExtractor {
    fn format(&self) -> DatasetFormat {
        DatasetFormat::Csv
    }

    fn extract(&self, content: &str) -> Vec<String> {
        // Header is the raw first line, dropped even when blank.
        match content.split_once('\n') {
            Some((_header, rows)) => non_empty_lines(rows).map(str::to_owned).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(content: &str) -> Vec<String> {
        CsvExtractor.extract(content)
    }

    #[test]
    fn header_and_blank_lines_dropped() {
        assert_eq!(extract("a: b\nc: d\n\n"), vec!["c: d"]);
    }

    #[test]
    fn rows_kept_verbatim() {
        let content = "name,text\n1,\"hello, world\"\n  2,bye  \n";
        assert_eq!(extract(content), vec!["1,\"hello, world\"", "2,bye"]);
    }

    #[test]
    fn blank_header_still_dropped() {
        assert_eq!(extract("\nrow one\nrow two"), vec!["row one", "row two"]);
    }

    #[test]
    fn header_only() {
        assert!(extract("id,text").is_empty());
        assert!(extract("").is_empty());
    }
}
