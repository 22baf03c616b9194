//! Beta distribution utilities.

use cf_core::{Error, Result};
use statrs::distribution::{Beta, ContinuousCDF};
use statrs::function::gamma::ln_gamma;

#[inline]
fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

fn validate_shape(a: f64, b: f64) -> Result<()> {
    if !a.is_finite() || a <= 0.0 {
        return Err(Error::Validation(format!("a must be finite and > 0, got {}", a)));
    }
    if !b.is_finite() || b <= 0.0 {
        return Err(Error::Validation(format!("b must be finite and > 0, got {}", b)));
    }
    Ok(())
}

/// Shape parameters `(alpha, beta)` for an observed fraction `value` backed by
/// `effective_count` pseudo-observations: `(1 + v·n, 1 + (1-v)·n)`.
#[inline]
pub fn shape_from_count(value: f64, effective_count: f64) -> (f64, f64) {
    (1.0 + value * effective_count, 1.0 + (1.0 - value) * effective_count)
}

/// Log-PDF of a Beta(`a`, `b`) distribution at `x`.
///
/// Support: `0 <= x <= 1`.
pub fn logpdf(x: f64, a: f64, b: f64) -> Result<f64> {
    validate_shape(a, b)?;
    if !(0.0..=1.0).contains(&x) {
        return Ok(f64::NEG_INFINITY);
    }

    let ln_norm = -ln_beta(a, b);
    if x == 0.0 {
        if a < 1.0 {
            return Ok(f64::INFINITY);
        }
        if a > 1.0 {
            return Ok(f64::NEG_INFINITY);
        }
        // a == 1: x term is 0.
        return Ok(ln_norm);
    }
    if x == 1.0 {
        if b < 1.0 {
            return Ok(f64::INFINITY);
        }
        if b > 1.0 {
            return Ok(f64::NEG_INFINITY);
        }
        return Ok(ln_norm);
    }

    Ok(ln_norm + (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln())
}

/// Mode of Beta(`a`, `b`).
///
/// `(a-1)/(a+b-2)` in the unimodal case; the density's supremum otherwise
/// (`0` or `1` at a boundary, `0.5` for the uniform).
pub fn mode(a: f64, b: f64) -> f64 {
    match (a > 1.0, b > 1.0) {
        (true, true) => (a - 1.0) / (a + b - 2.0),
        (false, true) => 0.0,
        (true, false) => 1.0,
        (false, false) => 0.5,
    }
}

/// Quantile (inverse CDF) of Beta(`a`, `b`) at probability `p`.
pub fn quantile(p: f64, a: f64, b: f64) -> Result<f64> {
    validate_shape(a, b)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::Validation(format!("p must be in [0, 1], got {}", p)));
    }
    let dist = Beta::new(a, b).map_err(|e| Error::Validation(e.to_string()))?;
    Ok(dist.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform() {
        for x in [0.0, 0.2, 0.5, 0.9, 1.0] {
            let lp = logpdf(x, 1.0, 1.0).unwrap();
            assert!((lp - 0.0).abs() < 1e-12, "x={}", x);
        }
    }

    #[test]
    fn test_symmetry_when_a_equals_b() {
        let lp1 = logpdf(0.2, 2.0, 2.0).unwrap();
        let lp2 = logpdf(0.8, 2.0, 2.0).unwrap();
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_support() {
        let lp = logpdf(-0.1, 2.0, 3.0).unwrap();
        assert!(lp.is_infinite() && lp.is_sign_negative());
    }

    #[test]
    fn test_invalid_params() {
        assert!(logpdf(0.5, 0.0, 1.0).is_err());
        assert!(logpdf(0.5, 1.0, 0.0).is_err());
        assert!(quantile(0.5, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_shape_from_count() {
        assert_eq!(shape_from_count(0.5, 10.0), (6.0, 6.0));
        assert_eq!(shape_from_count(0.2, 10.0), (3.0, 9.0));
    }

    #[test]
    fn test_mode_is_density_maximum() {
        let (a, b) = (3.0, 9.0);
        let m = mode(a, b);
        assert_relative_eq!(m, 0.2, epsilon = 1e-12);
        let at_mode = logpdf(m, a, b).unwrap();
        for x in [0.1, 0.19, 0.21, 0.5] {
            assert!(logpdf(x, a, b).unwrap() < at_mode);
        }
        assert_eq!(mode(1.0, 4.0), 0.0);
        assert_eq!(mode(4.0, 1.0), 1.0);
    }

    #[test]
    fn test_quantile_symmetric_median() {
        let q = quantile(0.5, 6.0, 6.0).unwrap();
        assert_relative_eq!(q, 0.5, epsilon = 1e-6);
        let lo = quantile(0.025, 6.0, 6.0).unwrap();
        let hi = quantile(0.975, 6.0, 6.0).unwrap();
        assert_relative_eq!(lo + hi, 1.0, epsilon = 1e-6);
        assert!(quantile(1.5, 6.0, 6.0).is_err());
    }
}
