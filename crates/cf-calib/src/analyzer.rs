//! Per-channel analyzer: aligns replicate output with the reference subset
//! and folds per-stratum scores into one weighted score per sample.
//!
//! The flow per calibration sample is `map` (one replicate at a time,
//! independent) followed by `reduce` (all replicates of the sample together).

use std::collections::BTreeMap;

use cf_core::{Error, Result, Value};
use cf_frame::{Comparator, Condition, ObservationTable, Stratified};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::age_bin::AgeBins;
use crate::channel::{Channel, ChannelType};
use crate::distribution::{Distribution, DistributionKind};
use crate::population::{AgeSelection, model_population_in_year};
use crate::population_obs::{AGGREGATED_NODE, PopulationObs, Provinciality, WEIGHT_CHANNEL};
use crate::site::ReferenceSite;

/// Column of replicate output holding the simulated value.
pub const SIM_RESULT_CHANNEL: &str = "Result";

/// Location column of replicate output.
pub const NODE_COLUMN: &str = "Node";

/// Location column of reference data.
pub const PROVINCE_COLUMN: &str = "Province";

/// Score per calibration sample index.
pub type SampleScores = BTreeMap<usize, f64>;

fn default_weight() -> f64 {
    1.0
}

/// Serialized analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Reference channel to score.
    pub channel: String,
    /// Multiplier applied to the final sample score.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Distribution name (case-insensitive).
    pub distribution: String,
    /// `Provincial` or `Non-provincial`.
    pub provinciality: String,
    /// Age bins to score.
    #[serde(default)]
    pub age_bins: AgeBins,
    /// Rescale simulated values to the census population (count channels).
    #[serde(default)]
    pub scale_population: bool,
}

/// Output of one simulation replicate.
#[derive(Debug, Clone)]
pub struct Replicate {
    /// Calibration sample this replicate belongs to.
    pub sample: usize,
    /// Replicate identifier, unique within the sample.
    pub id: String,
    /// Result table per channel name.
    pub channels: IndexMap<String, ObservationTable>,
    /// Simulated population table, needed by count channels.
    pub population: Option<ObservationTable>,
}

impl Replicate {
    /// A replicate with no tables yet.
    pub fn new(sample: usize, id: impl Into<String>) -> Self {
        Self { sample, id: id.into(), channels: IndexMap::new(), population: None }
    }

    /// Attach the result table of `channel`.
    pub fn with_channel(mut self, channel: impl Into<String>, table: ObservationTable) -> Self {
        self.channels.insert(channel.into(), table);
        self
    }

    /// Attach the simulated population table.
    pub fn with_population(mut self, table: ObservationTable) -> Self {
        self.population = Some(table);
        self
    }
}

/// A replicate aligned with the reference subset.
#[derive(Debug, Clone)]
pub struct MappedReplicate {
    /// Calibration sample index.
    pub sample: usize,
    /// Replicate identifier.
    pub id: String,
    /// Reference stratifiers, the reference channel, `Result`, `weight` and
    /// the distribution's additional channels.
    pub table: ObservationTable,
}

/// Scores one reference channel for one selection of provinces and ages.
#[derive(Debug)]
pub struct Analyzer {
    uid: String,
    weight: f64,
    channel: Channel,
    provinciality: Provinciality,
    age_bins: AgeBins,
    distribution: Box<dyn Distribution>,
    reference: PopulationObs,
    site: ReferenceSite,
}

impl Analyzer {
    /// Resolve the configuration and build the reference subset.
    ///
    /// Fails with `MissingData` when the reference has no rows for the
    /// requested channel, provinciality and age bins.
    pub fn new(site: &ReferenceSite, reference: &PopulationObs, config: &AnalyzerConfig) -> Result<Self> {
        let kind = if config.scale_population { ChannelType::Count } else { ChannelType::Fraction };
        let channel = Channel::with_kind(config.channel.clone(), kind);
        let mut distribution = DistributionKind::from_string(&config.distribution)?.build();
        let provinciality: Provinciality = config.provinciality.parse()?;

        let age_bins_label = config.age_bins.to_string();
        let uid = [
            site.name.as_str(),
            channel.name.as_str(),
            provinciality.as_str(),
            age_bins_label.as_str(),
            distribution.name(),
        ]
        .join("_");

        let reference = reference.fix_age_bins()?;
        let prepared = distribution.prepare(reference.table(), &channel.name, Some(WEIGHT_CHANNEL), &[])?;
        let prepared = reference.rebuild(prepared);
        let subset = prepared.filter(&selection(provinciality, &config.age_bins), None)?;
        if subset.table().is_empty() {
            return Err(Error::MissingData(format!(
                "missing reference data for channel: {}, provinciality: {}, age bins: {}",
                channel.name, provinciality, config.age_bins
            )));
        }
        tracing::debug!(uid = %uid, rows = subset.table().n_rows(), "reference subset prepared");

        Ok(Self {
            uid,
            weight: config.weight,
            channel,
            provinciality,
            age_bins: config.age_bins.clone(),
            distribution,
            reference: subset,
            site: site.clone(),
        })
    }

    /// `site_channel_provinciality_agebins_distribution`.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Multiplier applied to every sample score.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Scored channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Province selection.
    pub fn provinciality(&self) -> Provinciality {
        self.provinciality
    }

    /// Age-bin selection.
    pub fn age_bins(&self) -> &AgeBins {
        &self.age_bins
    }

    /// Distribution strategy owned by this analyzer.
    pub fn distribution(&self) -> &dyn Distribution {
        self.distribution.as_ref()
    }

    /// Reference subset scored against.
    pub fn reference(&self) -> &PopulationObs {
        &self.reference
    }

    /// Align one replicate with the reference subset.
    ///
    /// Any reference stratum without a simulated value is a `MissingData`
    /// error rather than a dropped row.
    pub fn map(&self, replicate: &Replicate) -> Result<MappedReplicate> {
        let output = replicate.channels.get(&self.channel.name).ok_or_else(|| {
            Error::MissingRequiredData(format!(
                "replicate {} of sample {} has no output for channel {}",
                replicate.id, replicate.sample, self.channel.name
            ))
        })?;

        let relabeled = output
            .map_values(NODE_COLUMN, |v| match v.as_f64() {
                Some(id) if id.fract() == 0.0 => {
                    self.site.province_of(id as i64).map_or_else(|| v.clone(), Value::from)
                }
                _ => v.clone(),
            })?
            .rename_column(NODE_COLUMN, PROVINCE_COLUMN)?;
        let relabeled = PopulationObs::new(relabeled).fix_age_bins()?.into_table();
        let mut sim = relabeled.filter(&selection(self.provinciality, &self.age_bins), None)?;

        if self.channel.needs_pop_scaling() {
            let ratio = self.population_scaling_factor(replicate)?;
            sim = sim.scale_column(SIM_RESULT_CHANNEL, ratio)?;
        }

        let stratifiers = self.reference.table().stratifier_refs();
        let sim = PopulationObs::new(sim.with_stratifiers(&stratifiers)?);

        if let Some(missing) = self.reference.find_missing_tuples(&sim, &self.channel.name, Some(SIM_RESULT_CHANNEL))? {
            let tuples: Vec<String> = missing
                .iter()
                .map(|t| format!("({})", t.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")))
                .collect();
            tracing::warn!(
                uid = %self.uid,
                replicate = %replicate.id,
                sample = replicate.sample,
                missing = tuples.len(),
                "simulation output lacks reference strata"
            );
            return Err(Error::MissingData(format!(
                "[{}] missing reference data in simulation output for [{}]: {}",
                self.uid,
                stratifiers.join(", "),
                tuples.join(", ")
            )));
        }

        let mut keep = vec![self.channel.name.as_str(), SIM_RESULT_CHANNEL, WEIGHT_CHANNEL];
        keep.extend(self.distribution.additional_channels().iter().map(String::as_str));
        let merged = self.reference.merge(&sim, &stratifiers, &keep)?;
        Ok(MappedReplicate { sample: replicate.sample, id: replicate.id.clone(), table: merged.into_table() })
    }

    fn population_scaling_factor(&self, replicate: &Replicate) -> Result<f64> {
        let population = replicate.population.as_ref().ok_or_else(|| {
            Error::MissingRequiredData(format!(
                "replicate {} has no population table, required to scale count channel {}",
                replicate.id, self.channel.name
            ))
        })?;
        let provincial = population.filter(&[Condition::new(NODE_COLUMN, Comparator::Ne, AGGREGATED_NODE)], None)?;
        let (_, ratio) = model_population_in_year(
            self.site.reference_year,
            self.site.reference_population,
            &AgeSelection::Bin(self.site.reference_age_bin),
            &provincial,
            "Year",
            SIM_RESULT_CHANNEL,
        )?;
        tracing::debug!(uid = %self.uid, replicate = %replicate.id, ratio, "population scaling factor");
        Ok(ratio)
    }

    /// Fold mapped replicates into one score per sample.
    ///
    /// Every replicate of a sample must be present: a sample is scored from
    /// exactly the replicates passed in.
    pub fn reduce(&self, mapped: Vec<MappedReplicate>) -> Result<SampleScores> {
        let mut by_sample: BTreeMap<usize, Vec<ObservationTable>> = BTreeMap::new();
        for m in mapped {
            by_sample.entry(m.sample).or_default().push(m.table);
        }
        let mut scores = SampleScores::new();
        for (sample, tables) in by_sample {
            let combined = ObservationTable::concat(&tables)?;
            tracing::trace!(uid = %self.uid, sample, rows = combined.n_rows(), "reduce input");
            let score = self.compare_sample(&combined)?;
            tracing::debug!(uid = %self.uid, sample, replicates = tables.len(), score, "sample scored");
            scores.insert(sample, score);
        }
        tracing::trace!(uid = %self.uid, ?scores, "analyzer results");
        Ok(scores)
    }

    /// Weighted score of one sample's concatenated replicate rows.
    ///
    /// Rows are grouped by the reference stratifiers; each group is scored by
    /// the distribution and weighted by its normalised reference weight. The
    /// sum is multiplied by the analyzer weight.
    pub fn compare_sample(&self, sample: &ObservationTable) -> Result<f64> {
        let stratifiers = self.reference.table().stratifier_refs();
        let groups = sample.group_by(&stratifiers)?;
        let weights = normalized_reference_weights(sample, &stratifiers)?;
        let mut total = 0.0;
        for (rows, weight) in groups.values().zip(weights) {
            let group = sample.take(rows);
            total += weight * self.distribution.compare(&group, &self.channel.name, SIM_RESULT_CHANNEL)?;
        }
        Ok(total * self.weight)
    }

    /// Map every replicate in parallel, then reduce. Any map failure aborts
    /// the call and discards the other replicates' results.
    pub fn analyze(&self, replicates: &[Replicate]) -> Result<SampleScores> {
        let mapped = replicates.par_iter().map(|r| self.map(r)).collect::<Result<Vec<_>>>()?;
        self.reduce(mapped)
    }
}

/// Row conditions selecting a provinciality and, unless `All`, age bins.
fn selection(provinciality: Provinciality, age_bins: &AgeBins) -> Vec<Condition> {
    let mut conditions = vec![provinciality.condition(PROVINCE_COLUMN)];
    if let Some(labels) = age_bins.labels() {
        conditions.push(Condition::one_of("AgeBin", labels));
    }
    conditions
}

/// Weight of each stratifier group (read from its first row) divided by the
/// sum over all groups, in group first-appearance order.
pub fn normalized_reference_weights(sample: &ObservationTable, stratifiers: &[&str]) -> Result<Vec<f64>> {
    let groups = sample.group_by(stratifiers)?;
    let weights = sample.numbers(WEIGHT_CHANNEL)?;
    let raw = groups
        .values()
        .map(|rows| {
            weights[rows[0]].ok_or_else(|| {
                Error::MissingData(format!("{} is null for a reference stratum", WEIGHT_CHANNEL))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    let total: f64 = raw.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::Computation(format!("reference weights sum to {}", total)));
    }
    Ok(raw.into_iter().map(|w| w / total).collect())
}
