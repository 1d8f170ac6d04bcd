//! Append-only row tables with a fixed column schema.

use serde::Serialize;

/// Table of numeric rows sharing one schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Table {
    /// Create an empty table. The caller guarantees `columns` is non-empty.
    pub(crate) const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub const fn width(&self) -> usize {
        self.columns.len()
    }

    /// All rows, in append order.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows have been appended.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column across all rows, `None` for an unknown column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let position = self.columns.iter().position(|c| c == name)?;
        self.rows.iter().map(|row| row.get(position).copied()).collect()
    }

    /// Append a row. Returns `false` (and leaves the table unchanged) if the
    /// row width does not match the schema.
    pub(crate) fn append(&mut self, row: &[f64]) -> bool {
        if row.len() != self.columns.len() {
            return false;
        }
        self.rows.push(row.to_vec());
        true
    }
}
