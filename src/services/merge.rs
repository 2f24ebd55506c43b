//! Uploaded table parsing and the enrichment merge.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::domain::{FlatRecord, UserId, UserRecord};

/// Column of the uploaded table holding the user identifiers.
pub const USER_ID_COLUMN: &str = "user_uid";

#[derive(Debug, Error)]
pub enum SourceTableError {
    #[error("source table has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("failed to parse source table: {0}")]
    Csv(#[from] csv::Error),
}

/// The uploaded CSV, header plus rows, every cell kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    id_column: usize,
}

impl SourceTable {
    pub fn from_csv(bytes: &[u8]) -> Result<Self, SourceTableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let id_column = columns
            .iter()
            .position(|c| c == USER_ID_COLUMN)
            .ok_or(SourceTableError::MissingColumn(USER_ID_COLUMN))?;

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        Ok(Self {
            columns,
            rows,
            id_column,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Identifiers in row order, one per row.
    #[must_use]
    pub fn user_ids(&self) -> Vec<UserId> {
        self.rows
            .iter()
            .map(|row| UserId::new(row.get(self.id_column).map_or("", String::as_str)))
            .collect()
    }
}

/// Source columns followed by the enrichment columns, ready to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

/// Appends the flattened users to the source table, aligned by row position.
///
/// User columns are the union of every record's columns in first-seen order.
/// A user column whose name already exists in the source is dropped so the
/// source values are kept untouched. Cells a user has no value for are empty.
#[must_use]
pub fn merge(source: &SourceTable, users: &[UserRecord]) -> MergedTable {
    let flat_records: Vec<FlatRecord> = users.iter().map(UserRecord::flatten).collect();

    let user_columns: Vec<String> = {
        let source_columns: HashSet<&str> = source.columns.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        flat_records
            .iter()
            .flat_map(FlatRecord::columns)
            .filter(|column| !source_columns.contains(column) && seen.insert(*column))
            .map(str::to_string)
            .collect()
    };

    let flattened: Vec<HashMap<String, String>> = flat_records
        .into_iter()
        .map(|record| record.into_fields().into_iter().collect())
        .collect();

    let width = source.columns.len();
    let row_count = source.rows.len().max(flattened.len());
    let rows = (0..row_count)
        .map(|index| {
            let mut row = source
                .rows
                .get(index)
                .cloned()
                .unwrap_or_else(|| vec![String::new(); width]);
            row.resize(width, String::new());

            let fields = flattened.get(index);
            row.extend(user_columns.iter().map(|column| {
                fields
                    .and_then(|f| f.get(column))
                    .cloned()
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    let mut columns = source.columns.clone();
    columns.extend(user_columns);

    MergedTable { columns, rows }
}
