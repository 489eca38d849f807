//! Row-oriented record store.
//!
//! Rows are addressed the way a spreadsheet addresses them: row 1 holds the
//! column headers, data starts at row 2. Profiles are joined to face-matcher
//! labels through the [`IDENTITY_FIELD`] column.

use crate::profile::{FieldValue, ProfileRecord, IDENTITY_FIELD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Row index of the first data row.
pub const FIRST_DATA_ROW: usize = 2;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("row {0} does not exist")]
    NoSuchRow(usize),
    #[error("no column named {0:?}")]
    NoSuchField(String),
}

/// Backing store for user profiles.
pub trait RecordStore {
    /// All data rows, in row order.
    fn fetch_all_rows(&self) -> Result<Vec<ProfileRecord>, StoreError>;

    /// Column headers (row 1).
    fn read_header_fields(&self) -> Result<Vec<String>, StoreError>;

    fn write_cell(&mut self, row: usize, field: &str, value: &FieldValue) -> Result<(), StoreError>;

    /// Store row index (≥ [`FIRST_DATA_ROW`]) of the first row whose identity
    /// column equals `label`.
    fn find_row_index(&self, label: &str) -> Result<Option<usize>, StoreError> {
        Ok(self
            .fetch_all_rows()?
            .iter()
            .position(|record| record.identity().as_deref() == Some(label))
            .map(|i| i + FIRST_DATA_ROW))
    }

    /// The profile for `label`, if a row exists.
    fn find_profile(&self, label: &str) -> Result<Option<ProfileRecord>, StoreError> {
        Ok(self
            .fetch_all_rows()?
            .into_iter()
            .find(|record| record.identity().as_deref() == Some(label)))
    }
}

/// Header row plus data rows, as held by both store adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<FieldValue>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; cells line up with `headers`.
    pub fn push_row(&mut self, cells: Vec<FieldValue>) {
        self.rows.push(cells);
    }

    /// Rows as profiles. Short rows read as empty text.
    pub fn records(&self) -> Vec<ProfileRecord> {
        self.rows
            .iter()
            .map(|cells| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_else(|| FieldValue::Text(String::new()))))
                    .collect()
            })
            .collect()
    }

    pub fn cell(&self, row: usize, field: &str) -> Option<&FieldValue> {
        let col = self.headers.iter().position(|h| h == field)?;
        self.rows.get(row.checked_sub(FIRST_DATA_ROW)?)?.get(col)
    }

    pub fn write(&mut self, row: usize, field: &str, value: &FieldValue) -> Result<(), StoreError> {
        let col = self
            .headers
            .iter()
            .position(|h| h == field)
            .ok_or_else(|| StoreError::NoSuchField(field.to_string()))?;
        let cells = row
            .checked_sub(FIRST_DATA_ROW)
            .and_then(|i| self.rows.get_mut(i))
            .ok_or(StoreError::NoSuchRow(row))?;
        if cells.len() <= col {
            cells.resize(col + 1, FieldValue::Text(String::new()));
        }
        cells[col] = value.clone();
        Ok(())
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Table,
}

impl MemoryStore {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all_rows(&self) -> Result<Vec<ProfileRecord>, StoreError> {
        Ok(self.table.records())
    }

    fn read_header_fields(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.table.headers.clone())
    }

    fn write_cell(&mut self, row: usize, field: &str, value: &FieldValue) -> Result<(), StoreError> {
        self.table.write(row, field, value)
    }
}

/// Store backed by a JSON file of the form `{"headers": [...], "rows": [[...]]}`.
///
/// The file is read on every call and rewritten on every cell write, so
/// edits made by another process between calls are picked up.
#[derive(Debug, Clone)]
pub struct SheetFile {
    path: PathBuf,
}

impl SheetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Table, StoreError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, table: &Table) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(table)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.path.display())))
    }
}

impl RecordStore for SheetFile {
    fn fetch_all_rows(&self) -> Result<Vec<ProfileRecord>, StoreError> {
        Ok(self.load()?.records())
    }

    fn read_header_fields(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.headers)
    }

    fn write_cell(&mut self, row: usize, field: &str, value: &FieldValue) -> Result<(), StoreError> {
        let mut table = self.load()?;
        table.write(row, field, value)?;
        self.save(&table)?;
        tracing::debug!(path = %self.path.display(), row, field, "cell written");
        Ok(())
    }
}
