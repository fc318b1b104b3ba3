//! Streaming profile reader and writer

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::{CoverageProfile, CoverageRecord, MODE_PREFIX};

use super::record::{parse_record, Leniency};
use super::ProfileError;

/// Mode name if `line` is a profile header
pub fn parse_header(line: &str) -> Option<String> {
    line.strip_prefix(MODE_PREFIX)
        .map(|mode| mode.trim().to_string())
}

/// Line-by-line reader over a profile file
pub struct ProfileReader<R> {
    path: PathBuf,
    lines: Lines<R>,
    line_number: usize,
}

impl ProfileReader<BufReader<File>> {
    /// Open a profile on disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ProfileError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl<R: BufRead> ProfileReader<R> {
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// 1-based number of the last line returned
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Next raw line, `None` at end of file
    pub fn next_line(&mut self) -> Option<Result<String, ProfileError>> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line.map_err(|source| ProfileError::Read {
            path: self.path.clone(),
            source,
        }))
    }

    /// Consume the first line and return its mode if it is a header.
    ///
    /// `Ok(None)` means the file was empty or the first line was not a header.
    pub fn read_header(&mut self) -> Result<Option<String>, ProfileError> {
        match self.next_line() {
            Some(line) => Ok(parse_header(&line?)),
            None => Ok(None),
        }
    }

    /// Next record after the header.
    ///
    /// Short lines are always skipped. Malformed counts end the stream with an
    /// error in strict mode and are skipped with a warning in lenient mode.
    pub fn next_record(
        &mut self,
        leniency: Leniency,
    ) -> Option<Result<CoverageRecord, ProfileError>> {
        loop {
            let line = match self.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            match parse_record(&line, self.line_number) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) if leniency == Leniency::Lenient => {
                    warn!("Skipping line in {}: {}", self.path.display(), e);
                    continue;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Read a whole profile into memory
pub fn read_profile(path: impl AsRef<Path>, leniency: Leniency) -> Result<CoverageProfile, ProfileError> {
    let mut reader = ProfileReader::open(path.as_ref())?;
    let mode = reader
        .read_header()?
        .ok_or_else(|| ProfileError::MissingHeader(path.as_ref().to_path_buf()))?;

    let mut profile = CoverageProfile::new(mode);
    while let Some(record) = reader.next_record(leniency) {
        profile.records.push(record?);
    }
    Ok(profile)
}

/// Buffered profile writer
pub struct ProfileWriter {
    writer: BufWriter<File>,
    lines_written: usize,
}

impl ProfileWriter {
    /// Create (or truncate) a profile file
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            lines_written: 0,
        })
    }

    pub fn write_header(&mut self, mode: &str) -> std::io::Result<()> {
        self.write_line(&format!("{MODE_PREFIX} {mode}"))
    }

    /// Write one line terminated by a single `\n`
    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.trim_end_matches(['\r', '\n']).as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines_written += 1;
        Ok(())
    }

    /// Flush buffered output to disk
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.writer.flush()?;
        Ok(self.lines_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("mode: atomic"), Some("atomic".to_string()));
        assert_eq!(parse_header("mode:set"), Some("set".to_string()));
        assert_eq!(parse_header("f.go:1.1,2.2 1 1"), None);
    }

    #[test]
    fn test_reader_lenient_skips_bad_lines() {
        let text = "mode: count\nf.go:1.1,2.2 3 1\nf.go:3.1,4.2 x 1\n\nf.go:5.1,6.2 2 0\n";
        let mut reader = ProfileReader::new("mem", Cursor::new(text));

        assert_eq!(reader.read_header().unwrap(), Some("count".to_string()));

        let mut records = Vec::new();
        while let Some(record) = reader.next_record(Leniency::Lenient) {
            records.push(record.unwrap());
        }
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].statement_count, 2);
    }

    #[test]
    fn test_reader_strict_fails() {
        let text = "mode: count\nf.go:1.1,2.2 3 1\nf.go:3.1,4.2 3 y\n";
        let mut reader = ProfileReader::new("mem", Cursor::new(text));
        reader.read_header().unwrap();

        assert!(reader.next_record(Leniency::Strict).unwrap().is_ok());
        let err = reader.next_record(Leniency::Strict).unwrap().unwrap_err();
        assert!(matches!(err, ProfileError::InvalidCount { line: 3, .. }));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.out");

        let mut profile = CoverageProfile::new("set");
        profile.records.push(CoverageRecord {
            file_path: "a.go".to_string(),
            start_pos: "1.1".to_string(),
            end_pos: "3.2".to_string(),
            statement_count: 2,
            execution_count: 1,
        });
        let mut writer = ProfileWriter::create(&path).unwrap();
        writer.write_header(&profile.mode).unwrap();
        writer.write_line(&profile.records[0].to_string()).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "mode: set\na.go:1.1,3.2 2 1\n");

        let loaded = read_profile(&path, Leniency::Strict).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_read_profile_missing_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.out");
        std::fs::write(&path, "a.go:1.1,3.2 2 1\n").unwrap();

        assert!(matches!(
            read_profile(&path, Leniency::Lenient),
            Err(ProfileError::MissingHeader(_))
        ));
    }
}
