//! Probability building blocks for CalibFit.
//!
//! This crate hosts the scalar math behind observation scoring:
//! - base distributions (logpdf / mode / quantile)
//! - the shared `[LOG_FLOOR, SCORE_CEILING]` rescaling of log-densities

pub mod beta;
pub mod math;
pub mod normal;

pub use math::{LOG_FLOOR, SCORE_CEILING, log_floor, rescale_log_density};
