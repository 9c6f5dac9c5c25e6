//! CSV record reading for monthly exports.
//!
//! Turns a UTF-8 export (optionally BOM-prefixed, quoted fields allowed)
//! into a lazy sequence of header-keyed [`RawRecord`]s, plus the helpers
//! every caller needs on top of it: carry-forward of blank grouping cells
//! and lenient numeric parsing.

use crate::constants::NUMERIC_NOISE;
use crate::error::{MetricsError, Result};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One CSV row keyed by the file's header row
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    headers: Arc<Vec<String>>,
    values: Vec<String>,
}

impl RawRecord {
    /// Build a record from header/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            headers: Arc::new(headers),
            values,
        }
    }

    /// Raw value for a column, None if the file has no such header
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| self.values[i].as_str())
    }

    /// Raw value for a column, empty when absent
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    /// Replace the value of an existing column; unknown columns are ignored
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        if let Some(i) = self.headers.iter().position(|h| h == column) {
            self.values[i] = value.into();
        }
    }

    /// Value of the first column
    pub fn first(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Numeric value of a column (see [`parse_number`])
    pub fn number(&self, column: &str) -> f64 {
        parse_number(self.value(column))
    }
}

/// Lazy iterator over the data rows of one CSV source
pub struct RecordReader {
    source: String,
    headers: Arc<Vec<String>>,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    drop_blank_leading: bool,
    rows_skipped: usize,
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("source", &self.source)
            .field("headers", &self.headers)
            .field("drop_blank_leading", &self.drop_blank_leading)
            .field("rows_skipped", &self.rows_skipped)
            .finish()
    }
}

impl RecordReader {
    fn from_bytes(source: impl Into<String>, mut bytes: Vec<u8>) -> Self {
        let source = source.into();

        if bytes.starts_with(UTF8_BOM) {
            bytes.drain(..UTF8_BOM.len());
        }

        // The default terminator accepts \n, \r\n and \r
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(bytes))
            .into_records();

        let mut headers = Vec::new();
        let mut rows_skipped = 0;
        for result in records.by_ref() {
            match result {
                Ok(record) if !is_blank(&record) => {
                    headers = record.iter().map(|h| h.trim().to_string()).collect();
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable header candidate in {}: {}", source, e);
                    rows_skipped += 1;
                }
            }
        }

        if headers.is_empty() {
            warn!("No header row found in {}", source);
        }

        Self {
            source,
            headers: Arc::new(headers),
            records,
            drop_blank_leading: true,
            rows_skipped,
        }
    }

    /// Keep rows whose first column is blank (needed before carry-forward)
    pub fn keep_blank_leading(mut self) -> Self {
        self.drop_blank_leading = false;
        self
    }

    /// Rewrite header names, e.g. to canonical schema fields
    pub fn map_headers<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        let mapped: Vec<String> = self.headers.iter().map(|h| f(h)).collect();
        self.headers = Arc::new(mapped);
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rows dropped so far because they could not be decoded
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }
}

impl Iterator for RecordReader {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed row in {}: {}", self.source, e);
                    self.rows_skipped += 1;
                    continue;
                }
            };

            if is_blank(&record) {
                continue;
            }

            if record.len() != self.headers.len() {
                debug!(
                    "Ragged row in {} ({} fields, {} headers)",
                    self.source,
                    record.len(),
                    self.headers.len()
                );
            }

            let values: Vec<String> = (0..self.headers.len())
                .map(|i| record.get(i).unwrap_or("").trim().to_string())
                .collect();

            if self.drop_blank_leading && values.first().is_none_or(|v| v.is_empty()) {
                continue;
            }

            return Some(RawRecord {
                headers: Arc::clone(&self.headers),
                values,
            });
        }
    }
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Open a CSV file for reading
///
/// A missing file is a [`MetricsError::FileNotFound`]; it is never treated
/// as an empty source.
pub fn read(path: &Path) -> Result<RecordReader> {
    if !path.is_file() {
        return Err(MetricsError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(RecordReader::from_bytes(path.display().to_string(), bytes))
}

/// Parse in-memory CSV text with the same rules as [`read`]
pub fn read_str(content: &str) -> RecordReader {
    RecordReader::from_bytes("<memory>", content.as_bytes().to_vec())
}

/// Lenient numeric parsing used for every count column
///
/// Thousands separators, currency symbols and a trailing percent sign are
/// stripped. Anything that still fails to parse counts as zero.
pub fn parse_number(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !NUMERIC_NOISE.contains(c))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => {
            if !cleaned.is_empty() && cleaned != "-" {
                debug!("Treating unparsable number '{}' as 0", value);
            }
            0.0
        }
    }
}

/// Fill blank cells of grouping columns with the last value seen above
///
/// State is scoped to one stream: create a fresh value per file.
#[derive(Debug, Clone, Default)]
pub struct CarryForward {
    columns: Vec<String>,
    last_seen: HashMap<String, String>,
}

impl CarryForward {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            last_seen: HashMap::new(),
        }
    }

    /// Apply to one record, updating the remembered values
    pub fn apply(&mut self, mut record: RawRecord) -> RawRecord {
        for column in &self.columns {
            let Some(current) = record.get(column) else {
                continue;
            };

            if current.is_empty() {
                if let Some(previous) = self.last_seen.get(column) {
                    record.set(column, previous.clone());
                }
            } else {
                self.last_seen.insert(column.clone(), current.to_string());
            }
        }
        record
    }

    /// Thread the fold through a record stream
    pub fn fill<I>(self, records: I) -> impl Iterator<Item = RawRecord>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        records
            .into_iter()
            .scan(self, |state, record| Some(state.apply(record)))
    }
}
