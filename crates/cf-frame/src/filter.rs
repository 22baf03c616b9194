//! Row predicates and column trimming.

use std::cmp::Ordering;

use cf_core::{Result, Value, ValueKey};
use indexmap::IndexMap;

use crate::table::{Column, ObservationTable};

/// Binary comparison applied to a cell and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparator {
    /// Compare `lhs` against `rhs`.
    ///
    /// Numbers compare numerically and text lexically. Null or mixed-kind
    /// operands are unordered: only `Ne` holds for them.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        let ord = match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match self {
            Comparator::Eq => ord == Some(Ordering::Equal),
            Comparator::Ne => ord != Some(Ordering::Equal),
            Comparator::Lt => ord == Some(Ordering::Less),
            Comparator::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Comparator::Gt => ord == Some(Ordering::Greater),
            Comparator::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare(Comparator, Value),
    OneOf(Vec<ValueKey>),
}

/// A `(column, comparator, value)` row predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    predicate: Predicate,
}

impl Condition {
    /// `column <op> value`.
    pub fn new(column: impl Into<String>, op: Comparator, value: impl Into<Value>) -> Self {
        Self { column: column.into(), predicate: Predicate::Compare(op, value.into()) }
    }

    /// `column` equals any of `values`.
    pub fn one_of<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let keys = values.into_iter().map(|v| v.into().key()).collect();
        Self { column: column.into(), predicate: Predicate::OneOf(keys) }
    }

    /// Column this condition reads.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// `true` if `value` satisfies the predicate.
    pub fn matches(&self, value: &Value) -> bool {
        match &self.predicate {
            Predicate::Compare(op, rhs) => op.apply(value, rhs),
            Predicate::OneOf(keys) => !value.is_null() && keys.contains(&value.key()),
        }
    }
}

impl ObservationTable {
    /// Select rows satisfying every condition and/or restrict channels to
    /// `keep_only`.
    ///
    /// Stratifiers that hold a null in the remaining rows stop being
    /// stratifiers: they become channels, or are dropped when `keep_only`
    /// does not name them.
    pub fn filter(&self, conditions: &[Condition], keep_only: Option<&[&str]>) -> Result<Self> {
        let condition_columns: Vec<&str> = conditions.iter().map(Condition::column).collect();
        self.verify_required_items(&condition_columns, None)?;
        if let Some(keep) = keep_only {
            self.verify_required_items(keep, None)?;
        }

        let rows: Vec<usize> = (0..self.n_rows())
            .filter(|&row| {
                conditions.iter().all(|c| self.value(row, c.column()).is_some_and(|v| c.matches(v)))
            })
            .collect();
        let selected = if rows.len() == self.n_rows() { self.clone() } else { self.take(&rows) };

        let Some(keep) = keep_only else {
            return Ok(selected);
        };
        let surviving = selected.stratifiers();
        let columns: IndexMap<String, Column> = selected
            .shared_columns()
            .iter()
            .filter(|(name, _)| surviving.contains(*name) || keep.contains(&name.as_str()))
            .map(|(name, col)| (name.clone(), col.clone()))
            .collect();
        Ok(ObservationTable::from_parts(columns, selected.n_rows(), surviving.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::Error;
    use proptest::prelude::*;

    fn table() -> ObservationTable {
        ObservationTable::from_rows(
            vec![
                vec![
                    ("Year", Value::from(2000)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Male")),
                    ("NationalPrevalence", Value::from(0.05)),
                ],
                vec![
                    ("Year", Value::from(2005)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Male")),
                    ("Province", Value::from("Washington")),
                    ("NationalPrevalence", Value::from(0.06)),
                    ("On_ART", Value::from(5000)),
                ],
                vec![
                    ("Year", Value::from(2005)),
                    ("AgeBin", Value::from("[0:5)")),
                    ("Gender", Value::from("Female")),
                    ("NationalPrevalence", Value::from(0.07)),
                    ("On_ART", Value::from(6000)),
                ],
            ],
            &["Year", "AgeBin", "Gender", "Province"],
        )
        .unwrap()
    }

    #[test]
    fn test_comparator_nulls_and_mixed_kinds() {
        assert!(Comparator::Ne.apply(&Value::Null, &Value::from(1)));
        assert!(!Comparator::Eq.apply(&Value::Null, &Value::Null));
        assert!(!Comparator::Lt.apply(&Value::from("a"), &Value::from(1)));
        assert!(Comparator::Ge.apply(&Value::from(2), &Value::from(2)));
        assert!(Comparator::Lt.apply(&Value::from("Female"), &Value::from("Male")));
    }

    #[test]
    fn test_filter_without_arguments_is_idempotent() {
        let t = table();
        let once = t.filter(&[], None).unwrap();
        assert_eq!(once, t);
        assert_eq!(once.filter(&[], None).unwrap(), once);
    }

    #[test]
    fn test_filter_with_keep_only() {
        let t = table();
        let filtered = t.filter(&[], Some(&["NationalPrevalence"])).unwrap();
        assert_eq!(filtered.stratifier_refs(), vec!["Year", "AgeBin", "Gender"]);
        assert_eq!(filtered.channels(), vec!["NationalPrevalence"]);
        assert_eq!(filtered.n_rows(), 3);
    }

    #[test]
    fn test_filter_with_conditions() {
        let t = table();
        let filtered = t.filter(&[Condition::new("Year", Comparator::Eq, 2005)], None).unwrap();
        assert_eq!(filtered.n_rows(), 2);
        assert_eq!(filtered.channels(), t.channels());

        let filtered = t
            .filter(
                &[
                    Condition::new("Year", Comparator::Eq, 2005),
                    Condition::new("NationalPrevalence", Comparator::Gt, 0.06),
                    Condition::new("Gender", Comparator::Ne, "Male"),
                ],
                None,
            )
            .unwrap();
        assert_eq!(filtered.n_rows(), 1);
        assert_eq!(filtered.value(0, "On_ART"), Some(&Value::from(6000)));
    }

    #[test]
    fn test_keep_only_drops_demoted_stratifier() {
        let t = ObservationTable::from_rows(
            vec![
                vec![("Year", Value::from(2000)), ("Province", Value::from("A")), ("x", Value::from(1))],
                vec![("Year", Value::from(2001)), ("Province", Value::from("B")), ("x", Value::from(2))],
            ],
            &["Year", "Province"],
        )
        .unwrap();
        let masked = t.with_column("Province", vec![Value::from("A"), Value::Null]).unwrap();
        let trimmed = masked.filter(&[], Some(&["x"])).unwrap();
        assert_eq!(trimmed.stratifier_refs(), vec!["Year"]);
        assert!(!trimmed.has_column("Province"));
    }

    #[test]
    fn test_one_of() {
        let t = table();
        let filtered =
            t.filter(&[Condition::one_of("Gender", ["Female", "Other"])], None).unwrap();
        assert_eq!(filtered.n_rows(), 1);
    }

    #[test]
    fn test_filter_missing_columns_fail() {
        let t = table();
        assert!(matches!(
            t.filter(&[], Some(&["Deimos Down"])),
            Err(Error::MissingRequiredData(_))
        ));
        assert!(matches!(
            t.filter(&[Condition::new("Nope", Comparator::Eq, 1)], None),
            Err(Error::MissingRequiredData(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_refiltering_is_a_no_op(threshold in 1999.0f64..2006.0, keep in any::<bool>()) {
            let t = table();
            let conditions = [Condition::new("Year", Comparator::Ge, threshold)];
            let keep_only: Option<&[&str]> = if keep { Some(&["NationalPrevalence"]) } else { None };
            let once = t.filter(&conditions, keep_only).unwrap();
            let twice = once.filter(&[], None).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
