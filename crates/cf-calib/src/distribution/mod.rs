//! Distribution strategies: turn (reference, simulated, uncertainty) rows
//! into rescaled log-likelihood scores.
//!
//! Every strategy shares one score range, `[LOG_FLOOR, SCORE_CEILING]`: a
//! simulated value at the reference-implied mode scores exactly
//! `SCORE_CEILING`, and impossible values clamp to `LOG_FLOOR`.

mod beta;
mod gaussian;

use std::fmt;
use std::str::FromStr;

use cf_core::{Error, Result, Value};
use cf_frame::ObservationTable;
use cf_prob::math::{mean, rescale_log_density};

pub use beta::BetaDistribution;
pub use gaussian::GaussianDistribution;

/// A per-observation scoring law.
///
/// One instance belongs to one analyzer: `prepare` records the derived
/// columns it added, which later merges must keep.
pub trait Distribution: Send + Sync + fmt::Debug {
    /// Name used in derived column names (`<channel>--<name>-<suffix>`).
    fn name(&self) -> &'static str;

    /// Column holding the per-row uncertainty prerequisite.
    fn uncertainty_channel(&self) -> &'static str;

    /// Columns added or required by `prepare` that must survive trimming.
    fn additional_channels(&self) -> &[String];

    /// Validate prerequisites, trim `table` to
    /// `{channel, prerequisite, weight_channel?, additional_keep}` and derive
    /// parameter columns.
    ///
    /// Rows with no observation of `channel` are dropped first; every
    /// remaining row must carry a strictly positive prerequisite.
    fn prepare(
        &mut self,
        table: &ObservationTable,
        channel: &str,
        weight_channel: Option<&str>,
        additional_keep: &[&str],
    ) -> Result<ObservationTable>;

    /// Mean rescaled log-likelihood of `data_channel` under the law
    /// parameterized by each row's reference data.
    fn compare(&self, table: &ObservationTable, reference_channel: &str, data_channel: &str) -> Result<f64>;

    /// Copy of `table` with a `<channel>--<name>-<p>` quantile column, plus
    /// the names of the columns added.
    fn add_percentile_values(
        &self,
        table: &ObservationTable,
        channel: &str,
        p: f64,
    ) -> Result<(ObservationTable, Vec<String>)>;
}

/// The statically known distribution variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionKind {
    /// [`BetaDistribution`]
    Beta,
    /// [`GaussianDistribution`]
    Gaussian,
}

impl DistributionKind {
    /// Every variant.
    pub const ALL: [DistributionKind; 2] = [DistributionKind::Beta, DistributionKind::Gaussian];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            DistributionKind::Beta => BetaDistribution::NAME,
            DistributionKind::Gaussian => GaussianDistribution::NAME,
        }
    }

    /// Uncertainty column the variant reads.
    pub fn uncertainty_channel(self) -> &'static str {
        match self {
            DistributionKind::Beta => BetaDistribution::UNCERTAINTY_CHANNEL,
            DistributionKind::Gaussian => GaussianDistribution::UNCERTAINTY_CHANNEL,
        }
    }

    /// Resolve a variant by case-insensitive name.
    pub fn from_string(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownDistribution(format!("no distribution exists for: {}", name)))
    }

    /// Resolve the variant reading `channel` as its uncertainty column.
    ///
    /// Two variants sharing an uncertainty channel do not compile.
    #[deny(unreachable_patterns)]
    pub fn from_uncertainty_channel(channel: &str) -> Result<Self> {
        match channel {
            BetaDistribution::UNCERTAINTY_CHANNEL => Ok(DistributionKind::Beta),
            GaussianDistribution::UNCERTAINTY_CHANNEL => Ok(DistributionKind::Gaussian),
            other => Err(Error::UnknownDistribution(format!(
                "no distribution uses uncertainty channel: {}",
                other
            ))),
        }
    }

    /// A fresh, unprepared strategy.
    pub fn build(self) -> Box<dyn Distribution> {
        match self {
            DistributionKind::Beta => Box::new(BetaDistribution::new()),
            DistributionKind::Gaussian => Box::new(GaussianDistribution::new()),
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistributionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

/// `<channel>--<distribution>-<suffix>`.
pub fn derived_column(channel: &str, distribution: &str, suffix: &str) -> String {
    format!("{}--{}-{}", channel, distribution, suffix)
}

/// Suffix of a percentile column for probability `p`.
pub(crate) fn percentile_suffix(p: f64) -> String {
    Value::Number(p).to_string()
}

pub(crate) fn validate_probability(p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::Validation(format!("percentile probability must be in [0, 1], got {}", p)))
    }
}

/// Rows of `table` carrying an observation of `channel`.
pub(crate) fn observed_rows(table: &ObservationTable, channel: &str) -> Result<ObservationTable> {
    let values = table.require_column(channel)?;
    let rows: Vec<usize> = (0..table.n_rows()).filter(|&r| !values[r].is_null()).collect();
    Ok(if rows.len() == table.n_rows() { table.clone() } else { table.take(&rows) })
}

/// Check that `column` exists and is strictly positive on every row; `invalid`
/// builds the variant-specific error.
pub(crate) fn validate_positive(
    table: &ObservationTable,
    column: &str,
    invalid: impl Fn(String) -> Error,
) -> Result<()> {
    let message = || format!("all {} values must be present and positive (>0)", column);
    let Some(cells) = table.column(column) else {
        return Err(invalid(message()));
    };
    let n_invalid = cells.iter().filter(|v| !v.as_f64().is_some_and(|x| x > 0.0)).count();
    if n_invalid > 0 {
        return Err(invalid(format!("{} ({} invalid rows)", message(), n_invalid)));
    }
    Ok(())
}

/// Keep-only list for `prepare`, without duplicates.
pub(crate) fn kept_columns<'a>(
    channel: &'a str,
    prerequisite: &'a str,
    weight_channel: Option<&'a str>,
    additional_keep: &[&'a str],
) -> Vec<&'a str> {
    let mut keep = vec![channel, prerequisite];
    keep.extend(additional_keep.iter().copied());
    keep.extend(weight_channel);
    let mut seen = Vec::with_capacity(keep.len());
    keep.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(*c);
            true
        }
    });
    keep
}

/// Numeric cell or a `MissingData` error naming the column and row.
pub(crate) fn cell(values: &[Option<f64>], column: &str, row: usize) -> Result<f64> {
    values[row].ok_or_else(|| Error::MissingData(format!("column '{}' is null at row {}", column, row)))
}

/// Mean of per-row `(raw, best)` log-densities after rescaling.
pub(crate) fn mean_score(pairs: impl Iterator<Item = Result<(f64, f64)>>) -> Result<f64> {
    let scores = pairs.map(|p| p.map(|(raw, best)| rescale_log_density(raw, best))).collect::<Result<Vec<_>>>()?;
    mean(&scores).ok_or_else(|| Error::Computation("cannot compare an empty table".into()))
}
