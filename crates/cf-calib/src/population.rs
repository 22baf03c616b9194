//! Simulated population lookup used to rescale count channels.

use cf_core::{Error, Result, Value};
use cf_frame::{Comparator, Condition, ObservationTable};
use indexmap::IndexSet;

use crate::age_bin::AgeBin;
use crate::population_obs::{AGGREGATED_NODE, AGGREGATED_PROVINCE};

/// Ages to sum population over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeSelection {
    /// `low <= age < high`, used with a per-age `Age` column.
    Range {
        /// Inclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// A single age bin.
    Bin(AgeBin),
}

impl AgeSelection {
    fn bin(&self) -> Result<AgeBin> {
        match *self {
            AgeSelection::Range { low, high } => AgeBin::new(low, high),
            AgeSelection::Bin(bin) => Ok(bin),
        }
    }
}

/// Simulated population in mid-year `year + 0.5` and the ratio
/// `obs_population / model_population`.
///
/// `year` must be integral; the half-year shift is applied here. The table
/// must have exactly one location column (`Province` or `Node`); the
/// aggregated row is excluded from the sum. Ages are matched against an `Age`
/// column by range, or against an `AgeBin` column by exact label.
pub fn model_population_in_year(
    year: f64,
    obs_population: f64,
    ages: &AgeSelection,
    table: &ObservationTable,
    year_col: &str,
    population_col: &str,
) -> Result<(f64, f64)> {
    if year.fract() != 0.0 {
        return Err(Error::InvalidDate(format!(
            "integer year required, got {}; mid-year shifting is performed automatically",
            year
        )));
    }
    let year = year + 0.5;
    if !table.numbers(year_col)?.contains(&Some(year)) {
        return Err(Error::InvalidDate(format!("requested year {} not in table", year)));
    }

    let (node_col, aggregated) = match (table.has_column("Province"), table.has_column("Node")) {
        (true, false) => ("Province", Value::from(AGGREGATED_PROVINCE)),
        (false, true) => ("Node", Value::from(AGGREGATED_NODE)),
        _ => {
            return Err(Error::InvalidDataframeColumn(
                "Province or Node must be columns in the table, not both or neither".into(),
            ));
        }
    };

    let bin = ages.bin()?;
    let mut conditions = vec![
        Condition::new(year_col, Comparator::Eq, year),
        Condition::new(node_col, Comparator::Ne, aggregated),
    ];
    let source = if table.has_column("Age") {
        let in_bin: Vec<usize> = table
            .numbers("Age")?
            .iter()
            .enumerate()
            .filter_map(|(row, age)| age.is_some_and(|a| bin.contains(a)).then_some(row))
            .collect();
        table.take(&in_bin)
    } else if table.has_column("AgeBin") {
        let label = bin.to_string();
        let fixed = table.map_values("AgeBin", |v| match v {
            Value::Text(s) => Value::Text(AgeBin::normalize_label(s)),
            other => other.clone(),
        })?;
        let available: IndexSet<String> = fixed.require_column("AgeBin")?.iter().map(Value::to_string).collect();
        if !available.contains(&label) {
            return Err(Error::InvalidAgeBin(format!(
                "age bin {} not found in table; available: {}",
                label,
                available.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            )));
        }
        conditions.push(Condition::new("AgeBin", Comparator::Eq, label));
        fixed
    } else {
        return Err(Error::InvalidDataframeColumn("no known age column in table; must have Age or AgeBin".into()));
    };

    let selected = source.filter(&conditions, None)?;
    let model_population: f64 = selected.numbers(population_col)?.into_iter().flatten().sum();
    if model_population <= 0.0 {
        return Err(Error::Computation(format!(
            "model population is {} for the requested year and ages",
            model_population
        )));
    }
    let ratio = obs_population / model_population;
    tracing::debug!(reference = obs_population, model = model_population, ratio, "population scaling");
    Ok((model_population, ratio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn by_age_bin(location: &str, aggregated: Value, other: Value) -> ObservationTable {
        ObservationTable::from_rows(
            [
                (2010.5, "[15:50)", aggregated.clone(), 300.0),
                (2010.5, "[15, 50)", other.clone(), 100.0),
                (2010.5, "[0:15)", other.clone(), 1000.0),
                (2011.5, "[15:50)", other, 7.0),
            ]
            .into_iter()
            .map(|(year, bin, loc, pop)| {
                vec![
                    ("Year", Value::from(year)),
                    ("AgeBin", Value::from(bin)),
                    (location, loc),
                    ("Population", Value::from(pop)),
                ]
            }),
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_age_bin_lookup_by_node() {
        let table = by_age_bin("Node", Value::from(0), Value::from(3));
        let bin = AgeSelection::Bin("[15:50)".parse().unwrap());
        let (model, ratio) = model_population_in_year(2010.0, 400.0, &bin, &table, "Year", "Population").unwrap();
        assert_relative_eq!(model, 100.0);
        assert_relative_eq!(ratio, 4.0);
    }

    #[test]
    fn test_age_bin_lookup_by_province() {
        let table = by_age_bin("Province", Value::from("All"), Value::from("Atacama"));
        let range = AgeSelection::Range { low: 0.0, high: 15.0 };
        let (model, ratio) = model_population_in_year(2010.0, 500.0, &range, &table, "Year", "Population").unwrap();
        assert_relative_eq!(model, 1000.0);
        assert_relative_eq!(ratio, 0.5);
    }

    #[test]
    fn test_age_range_lookup() {
        let table = ObservationTable::from_rows(
            (0..10).map(|age| {
                vec![
                    ("Year", Value::from(2000.5)),
                    ("Age", Value::from(age)),
                    ("Node", Value::from(if age == 9 { 0 } else { 1 })),
                    ("Population", Value::from(10.0)),
                ]
            }),
            &[],
        )
        .unwrap();
        let ages = AgeSelection::Range { low: 2.0, high: 5.0 };
        let (model, _) = model_population_in_year(2000.0, 60.0, &ages, &table, "Year", "Population").unwrap();
        assert_relative_eq!(model, 30.0);
        let all = AgeSelection::Range { low: 0.0, high: 100.0 };
        let (model, ratio) = model_population_in_year(2000.0, 90.0, &all, &table, "Year", "Population").unwrap();
        assert_relative_eq!(model, 90.0);
        assert_relative_eq!(ratio, 1.0);
    }

    #[test]
    fn test_age_range_is_half_open() {
        let table = ObservationTable::from_rows(
            [Value::from(4.5), Value::from(5.0), Value::Null].into_iter().map(|age| {
                vec![
                    ("Year", Value::from(2000.5)),
                    ("Age", age),
                    ("Node", Value::from(1)),
                    ("Population", Value::from(10.0)),
                ]
            }),
            &[],
        )
        .unwrap();
        let lookup = |low: f64, high: f64| {
            model_population_in_year(2000.0, 10.0, &AgeSelection::Range { low, high }, &table, "Year", "Population")
        };
        assert_relative_eq!(lookup(0.0, 5.0).unwrap().0, 10.0);
        assert_relative_eq!(lookup(4.5, 5.5).unwrap().0, 20.0);
        assert!(matches!(lookup(5.0, 5.0), Err(Error::InvalidAgeBin(_))));
    }

    #[test]
    fn test_invalid_requests() {
        let table = by_age_bin("Node", Value::from(0), Value::from(3));
        let bin = AgeSelection::Bin("[15:50)".parse().unwrap());
        let lookup = |year: f64, ages: &AgeSelection, t: &ObservationTable| {
            model_population_in_year(year, 1.0, ages, t, "Year", "Population")
        };

        assert!(matches!(lookup(2010.5, &bin, &table), Err(Error::InvalidDate(_))));
        assert!(matches!(lookup(1990.0, &bin, &table), Err(Error::InvalidDate(_))));
        let missing_bin = AgeSelection::Bin("[50:100)".parse().unwrap());
        assert!(matches!(lookup(2010.0, &missing_bin, &table), Err(Error::InvalidAgeBin(_))));

        let both = table.with_column("Province", vec![Value::from("x"); 4]).unwrap();
        assert!(matches!(lookup(2010.0, &bin, &both), Err(Error::InvalidDataframeColumn(_))));

        let no_ages = ObservationTable::from_rows(
            vec![vec![("Year", Value::from(2010.5)), ("Node", Value::from(1)), ("Population", Value::from(1.0))]],
            &[],
        )
        .unwrap();
        assert!(matches!(lookup(2010.0, &bin, &no_ages), Err(Error::InvalidDataframeColumn(_))));
    }
}
