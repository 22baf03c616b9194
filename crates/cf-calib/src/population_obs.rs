//! Population observation tables: reference data and simulation output
//! stratified by year, age bin, province and gender.

use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result, Value, ValueKey};
use cf_frame::{Comparator, Condition, ObservationTable, Stratified};
use indexmap::IndexSet;

use crate::age_bin::AgeBin;
use crate::distribution::Distribution;

/// Reserved simulation node id of the aggregated (national) row.
pub const AGGREGATED_NODE: i64 = 0;
/// Reserved province label of the aggregated (national) row.
pub const AGGREGATED_PROVINCE: &str = "All";
/// Per-observation confidence weight column.
pub const WEIGHT_CHANNEL: &str = "weight";

/// Whether a comparison uses sub-regional rows or the aggregated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provinciality {
    /// Rows of individual provinces.
    Provincial,
    /// The single aggregated row.
    NonProvincial,
}

impl Provinciality {
    /// Label as written in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Provinciality::Provincial => "Provincial",
            Provinciality::NonProvincial => "Non-provincial",
        }
    }

    /// Row condition on `column` selecting this provinciality.
    pub fn condition(self, column: &str) -> Condition {
        let op = match self {
            Provinciality::Provincial => Comparator::Ne,
            Provinciality::NonProvincial => Comparator::Eq,
        };
        Condition::new(column, op, AGGREGATED_PROVINCE)
    }
}

impl fmt::Display for Provinciality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provinciality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Provincial" => Ok(Provinciality::Provincial),
            "Non-provincial" => Ok(Provinciality::NonProvincial),
            other => Err(Error::Provinciality(other.to_string())),
        }
    }
}

/// An [`ObservationTable`] with population-specific helpers and bookkeeping
/// of derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationObs {
    table: ObservationTable,
    derived_items: Vec<String>,
    adjusted_years: bool,
}

impl PopulationObs {
    /// Wrap a table.
    pub fn new(table: ObservationTable) -> Self {
        Self { table, derived_items: Vec::new(), adjusted_years: false }
    }

    /// The wrapped table.
    pub fn into_table(self) -> ObservationTable {
        self.table
    }

    /// Columns derived on this table (e.g. percentile columns).
    pub fn derived_items(&self) -> &[String] {
        &self.derived_items
    }

    /// `true` once [`adjust_years`](Self::adjust_years) has run.
    pub fn adjusted_years(&self) -> bool {
        self.adjusted_years
    }

    /// Copy with legacy `[a, b)` age-bin labels rewritten as `[a:b)`.
    pub fn fix_age_bins(&self) -> Result<Self> {
        let fixed = self.table.map_values("AgeBin", |v| match v {
            Value::Text(label) => Value::Text(AgeBin::normalize_label(label)),
            other => other.clone(),
        })?;
        Ok(self.rebuild(fixed))
    }

    fn unique(&self, column: &str) -> Result<Vec<Value>> {
        let cells = self.table.require_column(column)?;
        let keys: IndexSet<ValueKey> = cells.iter().map(Value::key).collect();
        Ok(keys.iter().map(ValueKey::to_value).collect())
    }

    /// Distinct age bins, in order of appearance.
    pub fn age_bins(&self) -> Result<Vec<Value>> {
        self.unique("AgeBin")
    }

    /// Distinct provinces, in order of appearance.
    pub fn provinces(&self) -> Result<Vec<Value>> {
        self.unique("Province")
    }

    /// Distinct genders, in order of appearance.
    pub fn genders(&self) -> Result<Vec<Value>> {
        self.unique("Gender")
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Result<Vec<f64>> {
        let mut years: Vec<f64> = self.table.numbers("Year")?.into_iter().flatten().collect();
        years.sort_by(f64::total_cmp);
        years.dedup();
        Ok(years)
    }

    /// Move annual observations to mid-year (`Year + 0.5`), once.
    ///
    /// Rows holding a value in any of `exclude_channels` keep their year.
    pub fn adjust_years(&mut self, exclude_channels: &[&str]) -> Result<()> {
        if self.adjusted_years {
            return Ok(());
        }
        let years = self.table.numbers("Year")?;
        let excluded: Vec<&[Value]> = exclude_channels.iter().filter_map(|c| self.table.column(c)).collect();
        let shifted: Vec<Value> = years
            .iter()
            .enumerate()
            .map(|(row, year)| {
                let keep = excluded.iter().any(|col| !col[row].is_null());
                year.map(|y| if keep { y } else { y + 0.5 }).into()
            })
            .collect();
        self.table.set_column("Year", shifted)?;
        self.adjusted_years = true;
        Ok(())
    }

    /// Add a `<channel>--<distribution>-<p>` percentile column and record it
    /// as derived. Returns the added column names.
    pub fn add_percentile_values(&mut self, channel: &str, distribution: &dyn Distribution, p: f64) -> Result<Vec<String>> {
        let (table, added) = distribution.add_percentile_values(&self.table, channel, p)?;
        self.table = table;
        self.derived_items.extend(added.iter().cloned());
        Ok(added)
    }
}

impl Stratified for PopulationObs {
    fn table(&self) -> &ObservationTable {
        &self.table
    }

    fn rebuild(&self, table: ObservationTable) -> Self {
        Self { table, derived_items: self.derived_items.clone(), adjusted_years: self.adjusted_years }
    }
}

impl From<ObservationTable> for PopulationObs {
    fn from(table: ObservationTable) -> Self {
        Self::new(table)
    }
}
