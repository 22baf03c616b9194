//! Score bounds and the log-density rescaling shared by every distribution.
//!
//! Every per-observation score lives in `[LOG_FLOOR, SCORE_CEILING]`:
//! an observation at the distribution's mode scores `SCORE_CEILING`, an
//! impossible one (log-density of `-inf`) scores `LOG_FLOOR`.

use std::sync::LazyLock;

/// `ln` of the smallest positive normalized `f64` (about `-708.3964`).
pub static LOG_FLOOR: LazyLock<f64> = LazyLock::new(|| f64::MIN_POSITIVE.ln());

/// Score assigned to an observation exactly at the mode.
pub const SCORE_CEILING: f64 = 100.0;

/// Current value of [`LOG_FLOOR`].
#[inline]
pub fn log_floor() -> f64 {
    *LOG_FLOOR
}

/// Rescale a raw log-density against the best achievable log-density.
///
/// Returns `LOG_FLOOR` when `raw` is at or below the floor (including `-inf`
/// and `NaN`), otherwise `raw + SCORE_CEILING - best` kept inside
/// `[LOG_FLOOR, SCORE_CEILING]` (very peaked densities can push the shifted
/// value below the floor).
#[inline]
pub fn rescale_log_density(raw: f64, best: f64) -> f64 {
    let floor = log_floor();
    if raw.is_nan() || raw <= floor {
        return floor;
    }
    // Difference first, so raw == best lands on the ceiling exactly.
    let scaled = (raw - best) + SCORE_CEILING;
    if scaled.is_nan() { floor } else { scaled.clamp(floor, SCORE_CEILING) }
}

/// Arithmetic mean; `None` for an empty slice.
#[inline]
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}
