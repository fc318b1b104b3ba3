//! Coverage record parsing
//!
//! Turns one profile line into a [`CoverageRecord`].

use crate::models::CoverageRecord;

use super::ProfileError;

/// How numeric parse failures are treated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leniency {
    /// Fail on the first malformed count
    Strict,
    /// Skip malformed lines and keep going
    Lenient,
}

/// Parse one data line.
///
/// Returns `Ok(None)` for lines with fewer than three whitespace separated
/// fields. Counts are signed 64-bit integers. A line with enough fields but
/// a count that doesn't parse is an error; callers decide whether to skip it.
pub fn parse_record(line: &str, line_number: usize) -> Result<Option<CoverageRecord>, ProfileError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Ok(None);
    }

    let statement_count = parse_count(parts[1], "statement", line_number)?;
    let execution_count = parse_count(parts[2], "execution", line_number)?;
    let (file_path, start_pos, end_pos) = split_position(parts[0]);

    Ok(Some(CoverageRecord {
        file_path,
        start_pos,
        end_pos,
        statement_count,
        execution_count,
    }))
}

fn parse_count(value: &str, field: &'static str, line: usize) -> Result<i64, ProfileError> {
    value.parse().map_err(|_| ProfileError::InvalidCount {
        line,
        field,
        value: value.to_string(),
    })
}

/// Split `file:start,end` on the last `:`. Descriptors that don't fit keep
/// the whole text as the file path.
fn split_position(descriptor: &str) -> (String, String, String) {
    if let Some((file, range)) = descriptor.rsplit_once(':') {
        if let Some((start, end)) = range.split_once(',') {
            return (file.to_string(), start.to_string(), end.to_string());
        }
    }
    (descriptor.to_string(), String::new(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let record = parse_record("example.com/pkg/f.go:10.34,12.2 1 4", 2)
            .unwrap()
            .unwrap();
        assert_eq!(record.file_path, "example.com/pkg/f.go");
        assert_eq!(record.start_pos, "10.34");
        assert_eq!(record.end_pos, "12.2");
        assert_eq!(record.statement_count, 1);
        assert_eq!(record.execution_count, 4);
    }

    #[test]
    fn test_short_lines_skipped() {
        assert!(parse_record("", 2).unwrap().is_none());
        assert!(parse_record("   ", 3).unwrap().is_none());
        assert!(parse_record("f.go:1.1,2.2 3", 4).unwrap().is_none());
    }

    #[test]
    fn test_invalid_count() {
        let err = parse_record("f.go:1.1,2.2 x 1", 7).unwrap_err();
        match err {
            ProfileError::InvalidCount { line, field, value } => {
                assert_eq!(line, 7);
                assert_eq!(field, "statement");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_record("f.go:1.1,2.2 1 2.5", 8).is_err());
        assert!(parse_record("f.go:1.1,2.2 9223372036854775808 1", 9).is_err());
    }

    #[test]
    fn test_negative_counts() {
        let record = parse_record("f.go:1.1,2.2 5 -1", 2).unwrap().unwrap();
        assert_eq!(record.statement_count, 5);
        assert_eq!(record.execution_count, -1);
        assert!(!record.is_covered());

        let record = parse_record("f.go:3.1,4.2 -2 1", 3).unwrap().unwrap();
        assert_eq!(record.statement_count, -2);
    }

    #[test]
    fn test_opaque_position() {
        let record = parse_record("weird 2 0", 2).unwrap().unwrap();
        assert_eq!(record.file_path, "weird");
        assert!(record.start_pos.is_empty());
        assert_eq!(record.to_string(), "weird 2 0");
    }
}
