//! Error types for CalibFit

use thiserror::Error;

/// CalibFit error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text/tabular/config parsing error (CSV, YAML, Arrow)
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required column, stratifier or item is absent
    #[error("Missing required data: {0}")]
    MissingRequiredData(String),

    /// Channel type tag is not one of the allowed types
    #[error("Invalid channel type: {0}")]
    InvalidChannelType(String),

    /// No distribution matches the requested name or uncertainty channel
    #[error("Unknown distribution: {0}")]
    UnknownDistribution(String),

    /// Beta prerequisite `effective_count` absent or non-positive
    #[error("Invalid effective count: {0}")]
    InvalidEffectiveCount(String),

    /// Legacy `Count` column present in Beta input
    #[error("Invalid count channel: {0}")]
    InvalidCountChannel(String),

    /// Gaussian prerequisite `two_sigma` absent, non-positive or varying
    #[error("Invalid uncertainty: {0}")]
    InvalidUncertainty(String),

    /// Reference or simulation data missing for a requested selection
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Unrecognized provinciality selector
    #[error("Unknown provinciality: {0}")]
    Provinciality(String),

    /// Calibration site lacks required attributes
    #[error("Invalid site: {0}")]
    InvalidSite(String),

    /// Year is not integral or not present in a table
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Age bin is malformed or not present in a table
    #[error("Invalid age bin: {0}")]
    InvalidAgeBin(String),

    /// Table lacks an unambiguous location/age column
    #[error("Invalid dataframe column: {0}")]
    InvalidDataframeColumn(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
