//! Normal distribution utilities.

use cf_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Natural log of `sqrt(2π)`.
///
/// `ln(sqrt(2π)) = 0.5*ln(2π)` (precomputed to keep this crate const-friendly).
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Two-tailed 95% z-score: a `two_sigma` band of width `w` has `sigma = w / 1.96`.
pub const Z_95: f64 = 1.96;

fn validate_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    Ok(())
}

/// Standard deviation implied by a 95% half-width (`two_sigma`) band.
#[inline]
pub fn sigma_from_two_sigma(two_sigma: f64) -> f64 {
    two_sigma / Z_95
}

/// Log-PDF of a Normal distribution `N(mu, sigma)` at `x`.
///
/// `log p(x) = -0.5 * ((x-mu)/sigma)^2 - ln(sigma) - ln(sqrt(2π))`
pub fn logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    validate_sigma(sigma)?;
    let z = (x - mu) / sigma;
    Ok(-0.5 * z * z - sigma.ln() - LN_SQRT_2PI)
}

/// Quantile (inverse CDF) of `N(mu, sigma)` at probability `p`.
pub fn quantile(p: f64, mu: f64, sigma: f64) -> Result<f64> {
    validate_sigma(sigma)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::Validation(format!("p must be in [0, 1], got {}", p)));
    }
    let dist = Normal::new(mu, sigma).map_err(|e| Error::Validation(e.to_string()))?;
    Ok(dist.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_at_zero() {
        let lp = logpdf(0.0, 0.0, 1.0).unwrap();
        assert!((lp + LN_SQRT_2PI).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry() {
        let lp1 = logpdf(1.3, 0.0, 2.0).unwrap();
        let lp2 = logpdf(-1.3, 0.0, 2.0).unwrap();
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(logpdf(0.0, 0.0, 0.0).is_err());
        assert!(logpdf(0.0, 0.0, -1.0).is_err());
        assert!(quantile(0.5, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_two_sigma_band_is_95_percent() {
        let sigma = sigma_from_two_sigma(1.96);
        assert_relative_eq!(sigma, 1.0, epsilon = 1e-15);
        let hi = quantile(0.975, 10.0, sigma).unwrap();
        assert_relative_eq!(hi, 11.96, epsilon = 1e-3);
        assert_relative_eq!(quantile(0.5, 10.0, sigma).unwrap(), 10.0, epsilon = 1e-9);
    }
}
