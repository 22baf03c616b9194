use cf_core::{Error, Result, Value};
use cf_frame::ObservationTable;
use cf_prob::beta;

use super::{
    Distribution, cell, derived_column, kept_columns, mean_score, observed_rows, percentile_suffix,
    validate_positive, validate_probability,
};

/// Beta law over fractions, with shape derived from an effective count.
///
/// For a reference fraction `v` backed by `n` effective observations:
/// `alpha = 1 + v·n`, `beta = 1 + (1-v)·n`.
#[derive(Debug, Clone, Default)]
pub struct BetaDistribution {
    additional_channels: Vec<String>,
    alpha_channel: Option<String>,
    beta_channel: Option<String>,
}

impl BetaDistribution {
    /// Name used in derived columns.
    pub const NAME: &'static str = "Beta";
    /// Prerequisite column.
    pub const UNCERTAINTY_CHANNEL: &'static str = "effective_count";
    /// Column name rejected on input; replaced by `effective_count`.
    pub const LEGACY_COUNT_CHANNEL: &'static str = "Count";

    /// A strategy with no derived columns yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// `<channel>--Beta-alpha`.
    pub fn alpha_channel(channel: &str) -> String {
        derived_column(channel, Self::NAME, "alpha")
    }

    /// `<channel>--Beta-beta`.
    pub fn beta_channel(channel: &str) -> String {
        derived_column(channel, Self::NAME, "beta")
    }

    /// Copy of `table` with alpha/beta columns for `channel`, unless both are
    /// already present.
    pub fn add_beta_parameters(table: &ObservationTable, channel: &str) -> Result<(ObservationTable, [String; 2])> {
        table.verify_required_items(&[Self::UNCERTAINTY_CHANNEL, channel], None)?;
        let names = [Self::alpha_channel(channel), Self::beta_channel(channel)];
        if table.has_column(&names[0]) && table.has_column(&names[1]) {
            return Ok((table.clone(), names));
        }

        let values = table.numbers(channel)?;
        let counts = table.numbers(Self::UNCERTAINTY_CHANNEL)?;
        let (alpha, beta): (Vec<Value>, Vec<Value>) = values
            .iter()
            .zip(&counts)
            .map(|(v, n)| match (v, n) {
                (Some(v), Some(n)) => {
                    let (a, b) = beta::shape_from_count(*v, *n);
                    (Value::from(a), Value::from(b))
                }
                _ => (Value::Null, Value::Null),
            })
            .unzip();
        let table = table.with_column(&names[0], alpha)?.with_column(&names[1], beta)?;
        Ok((table, names))
    }

    fn record(&mut self, names: &[String]) {
        for name in names {
            if !self.additional_channels.contains(name) {
                self.additional_channels.push(name.clone());
            }
        }
    }
}

impl Distribution for BetaDistribution {
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
        if table.has_column(Self::LEGACY_COUNT_CHANNEL) {
            return Err(Error::InvalidCountChannel(format!(
                "{} is no longer used as a channel; provide {} instead",
                Self::LEGACY_COUNT_CHANNEL,
                Self::UNCERTAINTY_CHANNEL
            )));
        }
        let observed = observed_rows(table, channel)?;
        validate_positive(&observed, Self::UNCERTAINTY_CHANNEL, |msg| {
            Error::InvalidEffectiveCount(format!("{} for beta distributions", msg))
        })?;

        let keep = kept_columns(channel, Self::UNCERTAINTY_CHANNEL, weight_channel, additional_keep);
        let trimmed = observed.filter(&[], Some(&keep))?;
        let (prepared, names) = Self::add_beta_parameters(&trimmed, channel)?;
        self.alpha_channel = Some(names[0].clone());
        self.beta_channel = Some(names[1].clone());
        self.record(&names);
        tracing::debug!(channel = %channel, rows = prepared.n_rows(), "beta parameters derived");
        Ok(prepared)
    }

    fn compare(&self, table: &ObservationTable, reference_channel: &str, data_channel: &str) -> Result<f64> {
        let alpha_channel = self.alpha_channel.clone().unwrap_or_else(|| Self::alpha_channel(reference_channel));
        let beta_channel = self.beta_channel.clone().unwrap_or_else(|| Self::beta_channel(reference_channel));
        let a = table.numbers(&alpha_channel)?;
        let b = table.numbers(&beta_channel)?;
        let x = table.numbers(data_channel)?;

        mean_score((0..table.n_rows()).map(|row| {
            let a = cell(&a, &alpha_channel, row)?;
            let b = cell(&b, &beta_channel, row)?;
            let x = cell(&x, data_channel, row)?;
            let raw = beta::logpdf(x, a, b)?;
            let best = beta::logpdf(beta::mode(a, b), a, b)?;
            Ok((raw, best))
        }))
    }

    fn add_percentile_values(
        &self,
        table: &ObservationTable,
        channel: &str,
        p: f64,
    ) -> Result<(ObservationTable, Vec<String>)> {
        validate_probability(p)?;
        let (table, [alpha_channel, beta_channel]) = Self::add_beta_parameters(table, channel)?;
        let a = table.numbers(&alpha_channel)?;
        let b = table.numbers(&beta_channel)?;
        let quantiles = a
            .iter()
            .zip(&b)
            .map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => beta::quantile(p, *a, *b).map(Value::from),
                _ => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?;
        let p_channel = derived_column(channel, Self::NAME, &percentile_suffix(p));
        let table = table.with_column(&p_channel, quantiles)?;
        Ok((table, vec![p_channel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cf_prob::{LOG_FLOOR, SCORE_CEILING};
    use proptest::prelude::*;

    fn reference(rows: &[(i64, &str, f64, Option<f64>)]) -> ObservationTable {
        ObservationTable::from_rows(
            rows.iter().map(|(year, gender, prevalence, count)| {
                vec![
                    ("Year", Value::from(*year)),
                    ("Gender", Value::from(*gender)),
                    ("Prevalence", Value::from(*prevalence)),
                    ("effective_count", Value::from(*count)),
                    ("weight", Value::from(1.0)),
                ]
            }),
            &["Year", "Gender"],
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_derives_alpha_beta() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))]);
        let mut dist = BetaDistribution::new();
        let prepared = dist.prepare(&table, "Prevalence", Some("weight"), &[]).unwrap();

        assert_eq!(prepared.value(0, "Prevalence--Beta-alpha"), Some(&Value::from(6.0)));
        assert_eq!(prepared.value(0, "Prevalence--Beta-beta"), Some(&Value::from(6.0)));
        assert_eq!(
            dist.additional_channels(),
            &["Prevalence--Beta-alpha".to_string(), "Prevalence--Beta-beta".to_string()]
        );
        // Input is untouched.
        assert!(!table.has_column("Prevalence--Beta-alpha"));
        assert_eq!(prepared.stratifier_refs(), vec!["Year", "Gender"]);
    }

    #[test]
    fn test_prepare_rejects_missing_or_non_positive_counts() {
        for count in [None, Some(0.0), Some(-1.0)] {
            let table = reference(&[(2010, "Male", 0.5, Some(10.0)), (2010, "Female", 0.2, count)]);
            let err = BetaDistribution::new().prepare(&table, "Prevalence", None, &[]).unwrap_err();
            assert!(matches!(err, Error::InvalidEffectiveCount(_)), "count={:?}", count);
        }

        let no_counts = ObservationTable::from_rows(
            vec![vec![("Year", Value::from(2010)), ("Prevalence", Value::from(0.5))]],
            &["Year"],
        )
        .unwrap();
        assert!(matches!(
            BetaDistribution::new().prepare(&no_counts, "Prevalence", None, &[]),
            Err(Error::InvalidEffectiveCount(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_legacy_count_column() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))])
            .with_column("Count", vec![Value::from(10)])
            .unwrap();
        let err = BetaDistribution::new().prepare(&table, "Prevalence", None, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidCountChannel(msg) if msg.contains("effective_count")));
    }

    #[test]
    fn test_prepare_ignores_rows_without_the_channel() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))])
            .with_column("Prevalence", vec![Value::Null])
            .unwrap();
        let table = ObservationTable::concat(&[table, reference(&[(2012, "Male", 0.4, Some(5.0))])]).unwrap();
        let table = table.with_column("effective_count", vec![Value::Null, Value::from(5.0)]).unwrap();
        let prepared = BetaDistribution::new().prepare(&table, "Prevalence", None, &[]).unwrap();
        assert_eq!(prepared.n_rows(), 1);
        assert_eq!(prepared.value(0, "Year"), Some(&Value::from(2012)));
    }

    #[test]
    fn test_compare_at_mode_scores_ceiling() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0)), (2010, "Female", 0.2, Some(50.0))]);
        let mut dist = BetaDistribution::new();
        let prepared = dist.prepare(&table, "Prevalence", None, &[]).unwrap();
        // Mode of Beta(1 + v n, 1 + (1 - v) n) is v.
        let scored = prepared.with_column("Result", vec![Value::from(0.5), Value::from(0.2)]).unwrap();
        assert_eq!(dist.compare(&scored, "Prevalence", "Result").unwrap(), SCORE_CEILING);

        let off = prepared.with_column("Result", vec![Value::from(0.3), Value::from(0.2)]).unwrap();
        assert!(dist.compare(&off, "Prevalence", "Result").unwrap() < SCORE_CEILING);
    }

    #[test]
    fn test_compare_impossible_value_clamps_to_floor() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))]);
        let mut dist = BetaDistribution::new();
        let prepared = dist.prepare(&table, "Prevalence", None, &[]).unwrap();
        for x in [0.0, 1.0, 1.5] {
            let scored = prepared.with_column("Result", vec![Value::from(x)]).unwrap();
            assert_eq!(dist.compare(&scored, "Prevalence", "Result").unwrap(), *LOG_FLOOR, "x={}", x);
        }
    }

    #[test]
    fn test_compare_null_result_is_missing_data() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))]);
        let mut dist = BetaDistribution::new();
        let prepared = dist.prepare(&table, "Prevalence", None, &[]).unwrap();
        let scored = prepared.with_column("Result", vec![Value::Null]).unwrap();
        assert!(matches!(dist.compare(&scored, "Prevalence", "Result"), Err(Error::MissingData(_))));
    }

    #[test]
    fn test_percentiles() {
        let table = reference(&[(2010, "Male", 0.5, Some(10.0))]);
        let dist = BetaDistribution::new();
        let (with_p, added) = dist.add_percentile_values(&table, "Prevalence", 0.5).unwrap();
        assert_eq!(added, vec!["Prevalence--Beta-0.5"]);
        // Symmetric Beta(6, 6): median is 0.5.
        assert_relative_eq!(with_p.numbers("Prevalence--Beta-0.5").unwrap()[0].unwrap(), 0.5, epsilon = 1e-6);

        // Parameters already present are reused.
        let (again, _) = dist.add_percentile_values(&with_p, "Prevalence", 0.025).unwrap();
        let low = again.numbers("Prevalence--Beta-0.025").unwrap()[0].unwrap();
        assert!(low > 0.0 && low < 0.5);

        assert!(matches!(dist.add_percentile_values(&table, "Prevalence", 1.5), Err(Error::Validation(_))));
    }

    proptest! {
        #[test]
        fn prop_score_in_range(v in 0.0f64..=1.0, n in 0.5f64..5000.0, x in -0.5f64..1.5) {
            let table = reference(&[(2010, "Male", v, Some(n))]);
            let mut dist = BetaDistribution::new();
            let prepared = dist.prepare(&table, "Prevalence", None, &[]).unwrap();
            let scored = prepared.with_column("Result", vec![Value::from(x)]).unwrap();
            let score = dist.compare(&scored, "Prevalence", "Result").unwrap();
            prop_assert!(score >= *LOG_FLOOR && score <= SCORE_CEILING);
        }
    }
}
