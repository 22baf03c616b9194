//! Calibration site: reference data, census facts and the analyzers that
//! score simulations against them.

use std::collections::BTreeMap;
use std::path::Path;

use cf_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::age_bin::AgeBin;
use crate::analyzer::{Analyzer, AnalyzerConfig, Replicate, SampleScores};
use crate::population_obs::{AGGREGATED_NODE, AGGREGATED_PROVINCE, PopulationObs};

/// Site facts as written in configuration. Every field may be absent at
/// parse time; [`ReferenceSite::try_from`] enforces the required ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteData {
    /// Site name, used in analyzer ids.
    #[serde(default)]
    pub site_name: Option<String>,
    /// Integral census year.
    #[serde(default)]
    pub census_year: Option<f64>,
    /// Observed census population.
    #[serde(default)]
    pub census_population: Option<f64>,
    /// Age bin the census population covers.
    #[serde(default)]
    pub census_age_bin: Option<AgeBin>,
    /// Simulation node id → reference province label.
    #[serde(default)]
    pub node_map: Option<BTreeMap<i64, String>>,
}

/// Validated site facts used by analyzers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSite {
    /// Site name.
    pub name: String,
    /// Integral census year.
    pub reference_year: f64,
    /// Observed census population.
    pub reference_population: f64,
    /// Age bin the census population covers.
    pub reference_age_bin: AgeBin,
    /// Node id → province label, including the aggregated node.
    pub node_map: BTreeMap<i64, String>,
}

impl ReferenceSite {
    /// Name used when the site data does not carry one.
    pub const DEFAULT_NAME: &'static str = "CalibSite";

    /// Province label of a simulation node id, if mapped.
    pub fn province_of(&self, node: i64) -> Option<&str> {
        self.node_map.get(&node).map(String::as_str)
    }
}

impl TryFrom<&SiteData> for ReferenceSite {
    type Error = Error;

    fn try_from(data: &SiteData) -> Result<Self> {
        let mut missing = Vec::new();
        if data.census_year.is_none() {
            missing.push("census_year");
        }
        if data.census_population.is_none() {
            missing.push("census_population");
        }
        if data.census_age_bin.is_none() {
            missing.push("census_age_bin");
        }
        if data.node_map.is_none() {
            missing.push("node_map");
        }
        let (Some(year), Some(population), Some(age_bin), Some(node_map)) =
            (data.census_year, data.census_population, data.census_age_bin, data.node_map.as_ref())
        else {
            return Err(Error::InvalidSite(format!("site missing required attributes: {}", missing.join(", "))));
        };

        let mut node_map = node_map.clone();
        node_map.insert(AGGREGATED_NODE, AGGREGATED_PROVINCE.to_string());
        Ok(Self {
            name: data.site_name.clone().unwrap_or_else(|| Self::DEFAULT_NAME.to_string()),
            reference_year: year,
            reference_population: population,
            reference_age_bin: age_bin,
            node_map,
        })
    }
}

/// Serialized site document: site facts plus analyzer configurations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibSiteConfig {
    /// Site facts.
    pub site: SiteData,
    /// One entry per analyzer.
    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

impl CalibSiteConfig {
    /// Parse a YAML (or JSON) document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| Error::Parse(format!("site config: {}", e)))
    }

    /// Read and parse a YAML (or JSON) file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_yaml_ng::from_slice(&bytes).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }
}

/// A site with its shifted reference data and ready analyzers.
#[derive(Debug)]
pub struct CalibSite {
    site: ReferenceSite,
    reference: PopulationObs,
    analyzers: Vec<Analyzer>,
}

impl CalibSite {
    /// Channels whose reference years are already mid-year.
    pub const YEAR_SHIFT_EXCLUDED: [&'static str; 1] = ["Incidence"];

    /// Validate the site, shift reference years to mid-year and build one
    /// analyzer per configuration.
    pub fn new(mut reference: PopulationObs, site_data: &SiteData, analyzers: &[AnalyzerConfig]) -> Result<Self> {
        if analyzers.is_empty() {
            return Err(Error::Validation("at least one analyzer configuration must be provided".into()));
        }
        let site = ReferenceSite::try_from(site_data)?;
        reference.adjust_years(&Self::YEAR_SHIFT_EXCLUDED)?;
        let analyzers =
            analyzers.iter().map(|config| Analyzer::new(&site, &reference, config)).collect::<Result<Vec<_>>>()?;
        tracing::info!(site = %site.name, analyzers = analyzers.len(), "calibration site ready");
        Ok(Self { site, reference, analyzers })
    }

    /// Build from a parsed site document.
    pub fn from_config(reference: PopulationObs, config: &CalibSiteConfig) -> Result<Self> {
        Self::new(reference, &config.site, &config.analyzers)
    }

    /// Site name.
    pub fn name(&self) -> &str {
        &self.site.name
    }

    /// Validated site facts.
    pub fn site(&self) -> &ReferenceSite {
        &self.site
    }

    /// Reference data after the mid-year shift.
    pub fn reference(&self) -> &PopulationObs {
        &self.reference
    }

    /// The analyzers, in configuration order.
    pub fn analyzers(&self) -> &[Analyzer] {
        &self.analyzers
    }

    /// Score `replicates` with every analyzer; entries are `(uid, scores)`
    /// in analyzer order.
    pub fn analyze(&self, replicates: &[Replicate]) -> Result<Vec<(String, SampleScores)>> {
        self.analyzers.iter().map(|a| Ok((a.uid().to_string(), a.analyze(replicates)?))).collect()
    }
}
