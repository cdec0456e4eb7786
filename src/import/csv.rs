//! Lazy CSV record reader
//!
//! Wraps the `csv` crate so that every record remembers where it came from,
//! which lets column parse errors point at the offending file and line.

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ImportError, ImportResult};

/// Open `path` and iterate over its records, skipping the first row when
/// `skip_header` is set. Commas inside double-quoted fields do not split.
pub fn read_records(path: impl AsRef<Path>, skip_header: bool) -> ImportResult<Records> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path).map_err(|source| ImportError::Io {
        path: path.clone(),
        source,
    })?;

    let reader = ReaderBuilder::new()
        .has_headers(skip_header)
        .flexible(true)
        .from_reader(file);

    Ok(Records {
        path: Arc::new(path),
        inner: reader.into_records(),
    })
}

/// Iterator over the records of one CSV file
pub struct Records {
    path: Arc<PathBuf>,
    inner: StringRecordsIntoIter<File>,
}

impl Records {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for Records {
    type Item = ImportResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        Some(
            result
                .map(|fields| Record {
                    line: fields.position().map_or(0, |pos| pos.line()),
                    path: Arc::clone(&self.path),
                    fields,
                })
                .map_err(|source| ImportError::Csv {
                    path: self.path.to_path_buf(),
                    source,
                }),
        )
    }
}

/// One tokenized CSV row
#[derive(Debug, Clone)]
pub struct Record {
    line: u64,
    path: Arc<PathBuf>,
    fields: StringRecord,
}

impl Record {
    /// 1-based line the record starts on
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw column value
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index)
    }

    /// Column value with every double-quote character removed
    pub fn text(&self, index: usize, column: &str) -> ImportResult<String> {
        Ok(self.required(index, column)?.replace('"', ""))
    }

    /// Column value parsed as `T`
    pub fn parse<T>(&self, index: usize, column: &str) -> ImportResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required(index, column)?;
        raw.trim()
            .parse()
            .map_err(|e| self.error(format!("invalid {} '{}': {}", column, raw, e)))
    }

    fn required(&self, index: usize, column: &str) -> ImportResult<&str> {
        self.field(index)
            .ok_or_else(|| self.error(format!("missing column {} ({})", index + 1, column)))
    }

    /// Row-level parse error pointing at this record
    pub fn error(&self, message: String) -> ImportError {
        ImportError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            message,
        }
    }
}
