//! Alignment of tables on stratifier columns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cf_core::{Error, Result, Value, ValueKey};
use indexmap::{IndexMap, IndexSet};

use crate::table::{Column, ObservationTable};

/// Stratifier tuples of a base table lacking a counterpart in a target table.
pub type MissingTuples = Vec<Vec<Value>>;

fn index_rows(table: &ObservationTable, cols: &[&Column]) -> HashMap<Vec<ValueKey>, Vec<usize>> {
    let mut index: HashMap<Vec<ValueKey>, Vec<usize>> = HashMap::new();
    for row in 0..table.n_rows() {
        index.entry(table.row_key(row, cols)).or_default().push(row);
    }
    index
}

fn columns_of<'a>(table: &'a ObservationTable, names: &[&str]) -> Vec<&'a Column> {
    names.iter().map(|n| &table.shared_columns()[*n]).collect()
}

impl ObservationTable {
    /// Align rows of `self` with rows of `other` having equal `index` values.
    ///
    /// Rows keep `self`'s order; a row with several matches is repeated, a row
    /// without a match is dropped. The result has exactly `index` as
    /// stratifiers and `keep_only` as channels, each channel read from `self`
    /// when present there and from `other` otherwise.
    pub fn merge(&self, other: &ObservationTable, index: &[&str], keep_only: &[&str]) -> Result<Self> {
        self.verify_required_items(index, None).map_err(|e| side_error(e, "left"))?;
        other.verify_required_items(index, None).map_err(|e| side_error(e, "right"))?;

        let mut channels: IndexSet<&str> = IndexSet::new();
        for &name in keep_only {
            if index.contains(&name) {
                continue;
            }
            if !self.has_column(name) && !other.has_column(name) {
                return Err(Error::MissingRequiredData(format!(
                    "keep_only column '{}' is in neither merged table",
                    name
                )));
            }
            channels.insert(name);
        }

        let right = index_rows(other, &columns_of(other, index));
        let left_cols = columns_of(self, index);
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(self.n_rows());
        for row in 0..self.n_rows() {
            if let Some(matches) = right.get(&self.row_key(row, &left_cols)) {
                pairs.extend(matches.iter().map(|&m| (row, m)));
            }
        }

        let mut columns: IndexMap<String, Column> = IndexMap::new();
        for name in index {
            let col = &self.shared_columns()[*name];
            columns.insert(name.to_string(), Arc::new(pairs.iter().map(|&(l, _)| col[l].clone()).collect()));
        }
        for name in channels {
            let values: Vec<Value> = match self.column(name) {
                Some(col) => pairs.iter().map(|&(l, _)| col[l].clone()).collect(),
                None => {
                    let col = other.require_column(name)?;
                    pairs.iter().map(|&(_, r)| col[r].clone()).collect()
                }
            };
            columns.insert(name.to_string(), Arc::new(values));
        }
        tracing::trace!(left = self.n_rows(), right = other.n_rows(), merged = pairs.len(), "merge");
        Ok(ObservationTable::from_parts(
            columns,
            pairs.len(),
            index.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Stratifier tuples having a non-null `value_column_base` in `self` but no
    /// row with a non-null `value_column_target` in `target`.
    ///
    /// `value_column_target` defaults to `value_column_base`. Returns `None`
    /// when nothing is missing.
    pub fn find_missing_tuples(
        &self,
        target: &ObservationTable,
        value_column_base: &str,
        value_column_target: Option<&str>,
    ) -> Result<Option<MissingTuples>> {
        let value_column_target = value_column_target.unwrap_or(value_column_base);
        let stratifiers = self.stratifier_refs();
        self.verify_required_items(&[value_column_base], None)?;
        target.verify_required_items(&stratifiers, None).map_err(|e| side_error(e, "target"))?;
        target.verify_required_items(&[value_column_target], None).map_err(|e| side_error(e, "target"))?;

        let target_cols = columns_of(target, &stratifiers);
        let target_values = target.require_column(value_column_target)?;
        let present: HashSet<Vec<ValueKey>> = (0..target.n_rows())
            .filter(|&row| !target_values[row].is_null())
            .map(|row| target.row_key(row, &target_cols))
            .collect();

        let base_cols = columns_of(self, &stratifiers);
        let base_values = self.require_column(value_column_base)?;
        let mut missing: IndexSet<Vec<ValueKey>> = IndexSet::new();
        for row in 0..self.n_rows() {
            if base_values[row].is_null() {
                continue;
            }
            let key = self.row_key(row, &base_cols);
            if !present.contains(&key) {
                missing.insert(key);
            }
        }

        if missing.is_empty() {
            return Ok(None);
        }
        Ok(Some(missing.into_iter().map(|key| key.iter().map(ValueKey::to_value).collect()).collect()))
    }

    /// Full outer join on `on`: matched rows are combined, unmatched rows of
    /// either side are kept with nulls. The result has no stratifiers.
    pub fn outer_join(&self, other: &ObservationTable, on: &[&str]) -> Result<Self> {
        if on.is_empty() {
            return Err(Error::Validation("outer join needs at least one shared column".into()));
        }
        self.verify_required_items(on, None).map_err(|e| side_error(e, "left"))?;
        other.verify_required_items(on, None).map_err(|e| side_error(e, "right"))?;
        let right_only: Vec<&str> =
            other.column_names().into_iter().filter(|c| !on.contains(c)).collect();
        if let Some(clash) = right_only.iter().find(|c| self.has_column(c)) {
            return Err(Error::Validation(format!("column '{}' present on both sides of join", clash)));
        }

        let right = index_rows(other, &columns_of(other, on));
        let left_cols = columns_of(self, on);
        let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
        let mut matched_right: HashSet<usize> = HashSet::new();
        for row in 0..self.n_rows() {
            match right.get(&self.row_key(row, &left_cols)) {
                Some(matches) => {
                    for &m in matches {
                        matched_right.insert(m);
                        pairs.push((Some(row), Some(m)));
                    }
                }
                None => pairs.push((Some(row), None)),
            }
        }
        pairs.extend((0..other.n_rows()).filter(|r| !matched_right.contains(r)).map(|r| (None, Some(r))));

        let pick = |col: Option<&Column>, idx: Option<usize>| match (col, idx) {
            (Some(col), Some(i)) => col[i].clone(),
            _ => Value::Null,
        };
        let mut columns: IndexMap<String, Column> = IndexMap::new();
        for (name, col) in self.shared_columns() {
            let right_col = on.contains(&name.as_str()).then(|| &other.shared_columns()[name]);
            let values = pairs
                .iter()
                .map(|&(l, r)| match l {
                    Some(_) => pick(Some(col), l),
                    None => pick(right_col, r),
                })
                .collect();
            columns.insert(name.clone(), Arc::new(values));
        }
        for name in right_only {
            let col = &other.shared_columns()[name];
            columns.insert(name.to_string(), Arc::new(pairs.iter().map(|&(_, r)| pick(Some(col), r)).collect()));
        }
        Ok(ObservationTable::from_parts(columns, pairs.len(), Vec::new()))
    }
}

fn side_error(err: Error, side: &str) -> Error {
    match err {
        Error::MissingRequiredData(msg) => Error::MissingRequiredData(format!("{} table: {}", side, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRAT: [&str; 3] = ["Year", "AgeBin", "Gender"];

    fn reference() -> ObservationTable {
        ObservationTable::from_rows(
            vec![
                vec![
                    ("Year", Value::from(2000)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Male")),
                    ("Prevalence", Value::from(0.05)),
                ],
                vec![
                    ("Year", Value::from(2005)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Male")),
                    ("Prevalence", Value::from(0.06)),
                ],
                vec![
                    ("Year", Value::from(2005)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Female")),
                    ("Prevalence", Value::from(0.07)),
                ],
            ],
            &STRAT,
        )
        .unwrap()
    }

    fn simulated(years: [f64; 3]) -> ObservationTable {
        let genders = ["Male", "Male", "Female"];
        ObservationTable::from_rows(
            years.iter().zip(genders).enumerate().map(|(i, (y, g))| {
                vec![
                    ("Year", Value::from(*y)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from(g)),
                    ("Sim", Value::from(0.1 * (i + 1) as f64)),
                ]
            }),
            &STRAT,
        )
        .unwrap()
    }

    #[test]
    fn test_merge_keeps_matched_rows_in_left_order() {
        let merged = reference()
            .merge(&simulated([2000.0, 2005.0, 2005.5]), &STRAT, &["Sim", "Prevalence"])
            .unwrap();
        assert_eq!(merged.n_rows(), 2);
        assert_eq!(merged.stratifier_refs(), STRAT.to_vec());
        assert_eq!(merged.channels(), vec!["Sim", "Prevalence"]);
        assert_eq!(merged.value(1, "Prevalence"), Some(&Value::from(0.06)));
        assert_eq!(merged.value(1, "Sim"), Some(&Value::from(0.2)));
    }

    #[test]
    fn test_merge_requires_index_and_keep_columns() {
        let sim = simulated([2000.0, 2005.0, 2005.0]);
        let err = reference().merge(&sim, &["Year", "Province"], &["Sim"]).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredData(msg) if msg.contains("Province")));
        assert!(reference().merge(&sim, &STRAT, &["Nothing"]).is_err());
    }

    #[test]
    fn test_find_missing_tuples() {
        let reference = reference();
        let complete = simulated([2000.0, 2005.0, 2005.0]);
        assert_eq!(reference.find_missing_tuples(&complete, "Prevalence", Some("Sim")).unwrap(), None);

        let gappy = simulated([2000.0, 2005.0, 2005.5]);
        let missing = reference.find_missing_tuples(&gappy, "Prevalence", Some("Sim")).unwrap().unwrap();
        assert_eq!(
            missing,
            vec![vec![Value::from(2005), Value::from("[0:5)"), Value::from("Female")]]
        );
    }

    #[test]
    fn test_null_target_values_count_as_missing() {
        let sim = simulated([2000.0, 2005.0, 2005.0]);
        let sim = sim.with_column("Sim", vec![Value::from(0.1), Value::Null, Value::from(0.3)]).unwrap();
        let missing = reference().find_missing_tuples(&sim, "Prevalence", Some("Sim")).unwrap().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0][2], Value::from("Male"));
    }

    #[test]
    fn test_no_gaps_means_merge_drops_nothing() {
        let reference = reference();
        let sim = simulated([2000.0, 2005.0, 2005.0]);
        assert!(reference.find_missing_tuples(&sim, "Prevalence", Some("Sim")).unwrap().is_none());
        let merged = reference.merge(&sim, &STRAT, &["Prevalence", "Sim"]).unwrap();
        assert_eq!(merged.n_rows(), reference.n_rows());
    }

    #[test]
    fn test_outer_join_keeps_both_sides() {
        let left = ObservationTable::from_rows(
            vec![
                vec![("a", Value::from(1)), ("c", Value::from("Regolith Eaters"))],
                vec![("a", Value::from(2)), ("c", Value::from("Strip Mine"))],
            ],
            &[],
        )
        .unwrap();
        let right = ObservationTable::from_rows(
            vec![vec![("a", Value::from(0)), ("b", Value::from("Rover Construction"))]],
            &[],
        )
        .unwrap();
        let joined = left.outer_join(&right, &["a"]).unwrap();
        assert_eq!(joined.n_rows(), 3);
        assert_eq!(joined.column_names(), vec!["a", "c", "b"]);
        assert_eq!(joined.value(2, "a"), Some(&Value::from(0)));
        assert_eq!(joined.value(2, "c"), Some(&Value::Null));
        assert_eq!(joined.value(0, "b"), Some(&Value::Null));
    }
}
