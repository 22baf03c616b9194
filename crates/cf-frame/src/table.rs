//! Columnar stratified observation table.
//!
//! Columns are shared (`Arc`) between a table and every table derived from it;
//! a column buffer is only copied when a derived table writes to it.

use std::collections::HashMap;
use std::sync::Arc;

use cf_core::{Error, Result, Value, ValueKey};
use indexmap::IndexMap;

/// Shared column buffer.
pub type Column = Arc<Vec<Value>>;

/// Row indices grouped by stratifier tuple, in order of first appearance.
pub type Groups = IndexMap<Vec<ValueKey>, Vec<usize>>;

/// A table whose columns are split into stratifiers and channels.
///
/// Invariant: every stratifier is a column with no null cell; every other
/// column is a channel.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    columns: IndexMap<String, Column>,
    n_rows: usize,
    stratifiers: Vec<String>,
}

impl ObservationTable {
    /// Build a table from named columns.
    ///
    /// Requested stratifiers must be columns; those holding a null cell are
    /// demoted to channels.
    pub fn new(columns: IndexMap<String, Vec<Value>>, stratifiers: &[&str]) -> Result<Self> {
        let n_rows = columns.values().next().map_or(0, Vec::len);
        if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != n_rows) {
            return Err(Error::Validation(format!(
                "column '{}' has {} rows, expected {}",
                name,
                col.len(),
                n_rows
            )));
        }
        let columns: IndexMap<String, Column> =
            columns.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        let table = Self { columns, n_rows, stratifiers: Vec::new() };
        table.verify_required_items(stratifiers, None)?;
        Ok(Self::from_parts(
            table.columns,
            n_rows,
            stratifiers.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Build a table from rows of `(column, value)` cells.
    ///
    /// Columns are ordered by first appearance; cells absent from a row are null.
    pub fn from_rows<R, K>(rows: impl IntoIterator<Item = R>, stratifiers: &[&str]) -> Result<Self>
    where
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
        let mut n_rows = 0usize;
        for row in rows {
            for (name, value) in row {
                let col = columns.entry(name.into()).or_insert_with(|| vec![Value::Null; n_rows]);
                // A repeated key within one row overwrites the earlier cell.
                if col.len() > n_rows {
                    col[n_rows] = value;
                } else {
                    col.push(value);
                }
            }
            n_rows += 1;
            for col in columns.values_mut() {
                col.resize(n_rows, Value::Null);
            }
        }
        Self::new(columns, stratifiers)
    }

    /// An empty table with no columns.
    pub fn empty() -> Self {
        Self { columns: IndexMap::new(), n_rows: 0, stratifiers: Vec::new() }
    }

    /// Assemble a table from shared columns and re-derive the stratifier set.
    pub(crate) fn from_parts(
        columns: IndexMap<String, Column>,
        n_rows: usize,
        requested: Vec<String>,
    ) -> Self {
        let mut stratifiers: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if stratifiers.contains(&name) {
                continue;
            }
            match columns.get(&name) {
                Some(col) if col.iter().all(|v| !v.is_null()) => stratifiers.push(name),
                Some(_) => tracing::debug!(column = %name, "stratifier has nulls, demoted to channel"),
                None => {}
            }
        }
        Self { columns, n_rows, stratifiers }
    }

    pub(crate) fn shared_columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// `true` when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Stratifier column names.
    pub fn stratifiers(&self) -> &[String] {
        &self.stratifiers
    }

    /// Stratifier column names as borrowed strings.
    pub fn stratifier_refs(&self) -> Vec<&str> {
        self.stratifiers.iter().map(String::as_str).collect()
    }

    /// Channel (non-stratifier) column names, in column order.
    pub fn channels(&self) -> Vec<&str> {
        self.columns.keys().filter(|c| !self.stratifiers.contains(*c)).map(String::as_str).collect()
    }

    /// All column names, in column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// `true` if `name` is a column.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Cells of a column.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    /// Cells of a column, failing with `MissingRequiredData` if absent.
    pub fn require_column(&self, name: &str) -> Result<&[Value]> {
        self.column(name).ok_or_else(|| Error::MissingRequiredData(name.to_string()))
    }

    /// A single cell.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.columns.get(column).and_then(|c| c.get(row))
    }

    /// Numeric view of a column: nulls map to `None`, text cells are an error.
    pub fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>> {
        self.require_column(name)?
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::Number(x) => Ok(Some(*x)),
                Value::Null => Ok(None),
                Value::Text(s) => Err(Error::Validation(format!(
                    "column '{}' row {} is not numeric: '{}'",
                    name, i, s
                ))),
            })
            .collect()
    }

    /// Fail with `MissingRequiredData` naming every item of `needed` absent
    /// from `available` (default: this table's columns).
    pub fn verify_required_items(&self, needed: &[&str], available: Option<&[&str]>) -> Result<()> {
        let missing: Vec<&str> = needed
            .iter()
            .copied()
            .filter(|n| match available {
                Some(avail) => !avail.contains(n),
                None => !self.has_column(n),
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingRequiredData(format!(
                "required items not available: {}",
                missing.join(", ")
            )))
        }
    }

    /// Stratifier-style key of one row over `columns`.
    pub(crate) fn row_key(&self, row: usize, columns: &[&Column]) -> Vec<ValueKey> {
        columns.iter().map(|c| c[row].key()).collect()
    }

    /// Group row indices by their values in `keys`.
    pub fn group_by(&self, keys: &[&str]) -> Result<Groups> {
        self.verify_required_items(keys, None)?;
        let cols: Vec<&Column> = keys.iter().map(|k| &self.columns[*k]).collect();
        let mut groups = Groups::new();
        for row in 0..self.n_rows {
            groups.entry(self.row_key(row, &cols)).or_default().push(row);
        }
        Ok(groups)
    }

    /// A new table holding `rows` (in the given order).
    pub fn take(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), Arc::new(rows.iter().map(|&r| col[r].clone()).collect())))
            .collect();
        Self::from_parts(columns, rows.len(), self.stratifiers.clone())
    }

    /// Add or overwrite a column in place.
    ///
    /// A new column becomes a channel; overwriting a stratifier with nulls
    /// demotes it.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(Error::Validation(format!(
                "column '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.n_rows
            )));
        }
        if self.stratifiers.iter().any(|s| s == name) && values.iter().any(Value::is_null) {
            self.stratifiers.retain(|s| s != name);
        }
        self.columns.insert(name.to_string(), Arc::new(values));
        Ok(())
    }

    /// Copy of this table with `name` added or overwritten.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self> {
        let mut out = self.clone();
        out.set_column(name, values)?;
        Ok(out)
    }

    /// Same columns, with `stratifiers` as the requested stratifier set.
    pub fn with_stratifiers(&self, stratifiers: &[&str]) -> Result<Self> {
        self.verify_required_items(stratifiers, None)?;
        Ok(Self::from_parts(
            self.columns.clone(),
            self.n_rows,
            stratifiers.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Copy of this table with column `from` renamed to `to` (position kept).
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        self.require_column(from)?;
        if from != to && self.has_column(to) {
            return Err(Error::Validation(format!("cannot rename '{}': '{}' already exists", from, to)));
        }
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| (if name == from { to.to_string() } else { name.clone() }, col.clone()))
            .collect();
        let stratifiers = self
            .stratifiers
            .iter()
            .map(|s| if s == from { to.to_string() } else { s.clone() })
            .collect();
        Ok(Self::from_parts(columns, self.n_rows, stratifiers))
    }

    /// Copy of this table with every cell of `column` passed through `f`.
    pub fn map_values(&self, column: &str, f: impl Fn(&Value) -> Value) -> Result<Self> {
        let mapped = self.require_column(column)?.iter().map(f).collect();
        self.with_column(column, mapped)
    }

    /// Copy of this table with numeric `column` multiplied by `factor`.
    pub fn scale_column(&self, column: &str, factor: f64) -> Result<Self> {
        let scaled: Vec<Value> =
            self.numbers(column)?.into_iter().map(|x| x.map(|x| x * factor).into()).collect();
        self.with_column(column, scaled)
    }

    /// Stack tables with identical column sets; column order and stratifiers
    /// follow the first table.
    pub fn concat(tables: &[ObservationTable]) -> Result<Self> {
        let Some(first) = tables.first() else {
            return Err(Error::Validation("cannot concatenate zero tables".into()));
        };
        let mut columns: IndexMap<String, Vec<Value>> =
            first.columns.keys().map(|k| (k.clone(), Vec::new())).collect();
        for (i, t) in tables.iter().enumerate() {
            if t.columns.len() != first.columns.len()
                || t.columns.keys().any(|k| !first.columns.contains_key(k))
            {
                return Err(Error::Validation(format!(
                    "table {} columns [{}] differ from [{}]",
                    i,
                    t.column_names().join(", "),
                    first.column_names().join(", ")
                )));
            }
            for (name, out) in columns.iter_mut() {
                out.extend(t.columns[name].iter().cloned());
            }
        }
        let n_rows = tables.iter().map(|t| t.n_rows).sum();
        let columns = columns.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        Ok(Self::from_parts(columns, n_rows, first.stratifiers.clone()))
    }

    /// Order-independent equality: same columns, same stratifiers, same rows.
    pub fn equals(&self, other: &ObservationTable) -> bool {
        if self.n_rows != other.n_rows || self.columns.len() != other.columns.len() {
            return false;
        }
        let mut names: Vec<&String> = self.columns.keys().collect();
        names.sort();
        if names.iter().any(|n| !other.columns.contains_key(*n)) {
            return false;
        }
        let mut ours = self.stratifiers.clone();
        let mut theirs = other.stratifiers.clone();
        ours.sort();
        theirs.sort();
        if ours != theirs {
            return false;
        }
        let rows_of = |t: &ObservationTable| {
            let cols: Vec<&Column> = names.iter().map(|n| &t.columns[*n]).collect();
            let mut counts: HashMap<Vec<ValueKey>, usize> = HashMap::new();
            for row in 0..t.n_rows {
                *counts.entry(t.row_key(row, &cols)).or_default() += 1;
            }
            counts
        };
        rows_of(self) == rows_of(other)
    }
}

impl PartialEq for ObservationTable {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}
