//! Row model plus CSV read/write helpers.

use base64::Engine;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::EntityError;

/// One CSV row with its columns in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    cells: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.set(k, v);
        }
        row
    }

    /// Value of a column; `None` when absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a column when present and not blank.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.trim().is_empty())
    }

    /// Overwrite in place, or append a new column at the end.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(k, _)| *k == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<String> {
        let pos = self.cells.iter().position(|(k, _)| k == column)?;
        Some(self.cells.remove(pos).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl Serialize for CsvRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Parse a headed CSV document. Cells are trimmed and blank lines skipped.
/// An empty file, a header with no rows, or a malformed record is a
/// `BadRequest`.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<CsvRow>, EntityError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(EntityError::BadRequest("CSV file is empty".into()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| EntityError::BadRequest(format!("malformed CSV header: {e}")))?
        .clone();
    if headers.iter().all(str::is_empty) {
        return Err(EntityError::BadRequest("CSV header is empty".into()));
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| EntityError::BadRequest(format!("malformed CSV at record {}: {e}", i + 1)))?;
        let row = CsvRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .filter(|(h, _)| !h.is_empty()),
        );
        if !row.is_empty() {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        return Err(EntityError::BadRequest("CSV file has no data rows".into()));
    }
    Ok(rows)
}

/// Write rows under the union of their columns, in first-seen order.
pub fn write_csv(rows: &[CsvRow]) -> Result<Vec<u8>, EntityError> {
    let mut header: Vec<&str> = Vec::new();
    for row in rows {
        for col in row.columns() {
            if !header.contains(&col) {
                header.push(col);
            }
        }
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|e| anyhow::anyhow!(e))?;
    for row in rows {
        writer
            .write_record(header.iter().map(|h| row.get(h).unwrap_or("")))
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(bytes)
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
