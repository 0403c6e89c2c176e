//! Tabular projection of instances.

use serde::Serialize;

/// Rows of rendered cells under translated headers, ready for a formatter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TableData {
    /// Table title (the translated entity name).
    pub title: String,
    /// Column headers.
    pub headers: Vec<String>,
    /// Rendered cells, one vector per instance.
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    /// Create an empty table.
    pub fn new(title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows as header/cell pairs.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }
}
