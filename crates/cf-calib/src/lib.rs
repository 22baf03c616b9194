//! # cf-calib
//!
//! Scoring of replicate simulation output against reference observations.
//!
//! - [`distribution`]: Beta and Gaussian scoring laws behind the
//!   [`Distribution`] trait, resolved through [`DistributionKind`].
//! - [`analyzer`]: per-channel map/reduce producing one weighted score per
//!   calibration sample.
//! - [`site`]: site facts, YAML configuration and the analyzers of a site.
//! - [`population`]: simulated population lookup for count channels.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod age_bin;
pub mod analyzer;
pub mod channel;
pub mod distribution;
pub mod population;
pub mod population_obs;
pub mod site;

pub use age_bin::{AgeBin, AgeBins};
pub use analyzer::{
    Analyzer, AnalyzerConfig, MappedReplicate, Replicate, SIM_RESULT_CHANNEL, SampleScores,
    normalized_reference_weights,
};
pub use channel::{Channel, ChannelType};
pub use distribution::{BetaDistribution, Distribution, DistributionKind, GaussianDistribution};
pub use population::{AgeSelection, model_population_in_year};
pub use population_obs::{
    AGGREGATED_NODE, AGGREGATED_PROVINCE, PopulationObs, Provinciality, WEIGHT_CHANNEL,
};
pub use site::{CalibSite, CalibSiteConfig, ReferenceSite, SiteData};
