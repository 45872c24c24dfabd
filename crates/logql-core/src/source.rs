//! NDJSON source reading.
//!
//! A source is a file of newline-delimited JSON objects. The reader yields
//! records lazily; whitespace-only lines are skipped, and anything that is
//! not a JSON object on a non-blank line is an `E_IO` failure. Subqueries
//! re-open sources on demand, so reading the same file twice must yield the
//! same sequence; nothing here caches across opens.

use crate::error::{Error, Result};
use crate::value::{Record, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Lazy reader over one NDJSON source file.
#[derive(Debug)]
pub struct SourceReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl SourceReader {
    /// Open a source file for streaming.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::SourceOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// The file path this reader was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for SourceReader {
    type Item = Result<(usize, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(Error::SourceRead {
                        path: self.path.clone(),
                        source,
                    }))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(record)) => Ok((self.line_no, record)),
                Ok(_) => Err(Error::NonObjectRecord {
                    path: self.path.clone(),
                    line: self.line_no,
                }),
                Err(err) => Err(Error::MalformedRecord {
                    path: self.path.clone(),
                    line: self.line_no,
                    message: err.to_string(),
                }),
            });
        }
    }
}

/// Materialize every record of a source, in file order.
///
/// Join tables and table subqueries use this; the anchor scan stays lazy.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let reader = SourceReader::open(path)?;
    let mut records = Vec::new();
    for item in reader {
        let (_, record) = item?;
        records.push(record);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "materialized source");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_records_in_order() {
        let file = write_fixture("{\"a\":1}\n{\"a\":2}\n");
        let records = read_records(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], 1);
        assert_eq!(records[1]["a"], 2);
    }

    #[test]
    fn test_skips_blank_lines_keeps_line_numbers() {
        let file = write_fixture("{\"a\":1}\n\n   \n{\"a\":2}\n");
        let reader = SourceReader::open(file.path()).unwrap();
        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();

        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[1].0, 4);
    }

    #[test]
    fn test_non_object_record_is_io_error() {
        let file = write_fixture("{\"a\":1}\n[1,2,3]\n");
        let err = read_records(file.path()).unwrap_err();
        assert_eq!(err.code(), "E_IO");
    }

    #[test]
    fn test_malformed_json_is_io_error() {
        let file = write_fixture("{\"a\":1}\n{not json\n");
        let err = read_records(file.path()).unwrap_err();
        assert_eq!(err.code(), "E_IO");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SourceReader::open(Path::new("/nonexistent/logs.ndjson")).unwrap_err();
        assert_eq!(err.code(), "E_IO");
    }

    #[test]
    fn test_reopen_yields_same_sequence() {
        let file = write_fixture("{\"a\":1}\n{\"a\":2}\n");
        let first = read_records(file.path()).unwrap();
        let second = read_records(file.path()).unwrap();
        assert_eq!(first, second);
    }
}
