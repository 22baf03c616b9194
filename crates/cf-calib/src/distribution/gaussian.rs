use cf_core::{Error, Result, Value};
use cf_frame::ObservationTable;
use cf_prob::normal;

use super::{
    Distribution, cell, derived_column, kept_columns, mean_score, observed_rows, percentile_suffix,
    validate_positive, validate_probability,
};

/// Normal law centred on the reference value.
///
/// `two_sigma` is a 95% half-width, so `sigma = two_sigma / 1.96`.
#[derive(Debug, Clone, Default)]
pub struct GaussianDistribution {
    additional_channels: Vec<String>,
}

impl GaussianDistribution {
    /// Name used in derived columns.
    pub const NAME: &'static str = "Gaussian";
    /// Prerequisite column.
    pub const UNCERTAINTY_CHANNEL: &'static str = "two_sigma";

    /// A strategy with no derived columns yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn invalid_uncertainty(msg: String) -> Error {
        Error::InvalidUncertainty(format!("{} for gaussian distributions", msg))
    }

    /// The single `two_sigma` shared by every row of `table`.
    fn common_two_sigma(table: &ObservationTable) -> Result<f64> {
        let cells = table.require_column(Self::UNCERTAINTY_CHANNEL)?;
        let first = cells.first().ok_or_else(|| Error::Computation("cannot compare an empty table".into()))?;
        if cells.iter().any(|v| v.key() != first.key()) {
            return Err(Error::InvalidUncertainty(format!(
                "cannot determine the reference uncertainty: {} varies between replicates",
                Self::UNCERTAINTY_CHANNEL
            )));
        }
        match first.as_f64() {
            Some(x) if x > 0.0 => Ok(x),
            _ => Err(Self::invalid_uncertainty(format!("{} must be positive, got {}", Self::UNCERTAINTY_CHANNEL, first))),
        }
    }
}

impl Distribution for GaussianDistribution {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn uncertainty_channel(&self) -> &'static str {
        Self::UNCERTAINTY_CHANNEL
    }

    fn additional_channels(&self) -> &[String] {
        &self.additional_channels
    }

    fn prepare(
        &mut self,
        table: &ObservationTable,
        channel: &str,
        weight_channel: Option<&str>,
        additional_keep: &[&str],
    ) -> Result<ObservationTable> {
        let observed = observed_rows(table, channel)?;
        validate_positive(&observed, Self::UNCERTAINTY_CHANNEL, Self::invalid_uncertainty)?;

        let keep = kept_columns(channel, Self::UNCERTAINTY_CHANNEL, weight_channel, additional_keep);
        let prepared = observed.filter(&[], Some(&keep))?;
        if !self.additional_channels.iter().any(|c| c == Self::UNCERTAINTY_CHANNEL) {
            self.additional_channels.push(Self::UNCERTAINTY_CHANNEL.to_string());
        }
        Ok(prepared)
    }

    fn compare(&self, table: &ObservationTable, reference_channel: &str, data_channel: &str) -> Result<f64> {
        let sigma = normal::sigma_from_two_sigma(Self::common_two_sigma(table)?);
        let mu = table.numbers(reference_channel)?;
        let x = table.numbers(data_channel)?;

        mean_score((0..table.n_rows()).map(|row| {
            let mu = cell(&mu, reference_channel, row)?;
            let x = cell(&x, data_channel, row)?;
            Ok((normal::logpdf(x, mu, sigma)?, normal::logpdf(mu, mu, sigma)?))
        }))
    }

    fn add_percentile_values(
        &self,
        table: &ObservationTable,
        channel: &str,
        p: f64,
    ) -> Result<(ObservationTable, Vec<String>)> {
        validate_probability(p)?;
        table.verify_required_items(&[channel, Self::UNCERTAINTY_CHANNEL], None)?;
        let mu = table.numbers(channel)?;
        let two_sigma = table.numbers(Self::UNCERTAINTY_CHANNEL)?;
        let quantiles = mu
            .iter()
            .zip(&two_sigma)
            .map(|(mu, two_sigma)| match (mu, two_sigma) {
                (Some(mu), Some(w)) => normal::quantile(p, *mu, normal::sigma_from_two_sigma(*w)).map(Value::from),
                _ => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?;
        let p_channel = derived_column(channel, Self::NAME, &percentile_suffix(p));
        let table = table.with_column(&p_channel, quantiles)?;
        Ok((table, vec![p_channel]))
    }
}
