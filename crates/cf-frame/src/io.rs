//! CSV loading: single files and one-channel-per-file directories.

use std::path::{Path, PathBuf};

use cf_core::{Error, Result, Value};
use indexmap::IndexMap;

use crate::table::ObservationTable;

fn parse_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Parse(format!("{}: {}", path.display(), err))
}

/// Read a CSV file (with header row) into a table without stratifiers.
///
/// Cells parse as numbers where possible; empty cells are null.
pub fn read_csv(path: &Path) -> Result<ObservationTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| parse_error(path, e))?;

    let headers: Vec<String> =
        rdr.headers().map_err(|e| parse_error(path, e))?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(parse_error(path, "CSV file has no columns"));
    }

    let mut columns: IndexMap<String, Vec<Value>> =
        headers.iter().map(|h| (h.clone(), Vec::new())).collect();
    if columns.len() != headers.len() {
        return Err(parse_error(path, "duplicate column names in header"));
    }
    for record in rdr.records() {
        let record = record.map_err(|e| parse_error(path, e))?;
        for (col, field) in columns.values_mut().zip(record.iter()) {
            col.push(Value::parse_cell(field));
        }
    }
    ObservationTable::new(columns, &[])
}

fn csv_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl ObservationTable {
    /// Load every `*.csv` file of `directory` (one channel per file) and
    /// outer-join them on the columns they share.
    ///
    /// Fails with `MissingRequiredData` if a requested stratifier is not a
    /// column of any file.
    pub fn from_directory(directory: &Path, stratifiers: &[&str]) -> Result<Self> {
        let files = csv_files(directory)?;
        if files.is_empty() {
            return Err(Error::MissingRequiredData(format!(
                "no CSV files found in {}",
                directory.display()
            )));
        }

        let mut merged: Option<ObservationTable> = None;
        for path in &files {
            let table = read_csv(path)?;
            tracing::debug!(file = %path.display(), rows = table.n_rows(), "loaded channel file");
            merged = Some(match merged {
                None => table,
                Some(acc) => {
                    let shared: Vec<&str> = acc
                        .column_names()
                        .into_iter()
                        .filter(|c| table.has_column(c))
                        .collect();
                    acc.outer_join(&table, &shared).map_err(|e| parse_error(path, e))?
                }
            });
        }

        let merged = merged.unwrap_or_else(ObservationTable::empty);
        merged.verify_required_items(stratifiers, None)?;
        Ok(ObservationTable::from_parts(
            merged.shared_columns().clone(),
            merged.n_rows(),
            stratifiers.iter().map(|s| s.to_string()).collect(),
        ))
    }
}
