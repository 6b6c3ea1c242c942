//! Standard normal helpers shared by the credit-state model and the copula.

use statrs::distribution::Normal;
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

use crate::error::CreditCapitalError;
use crate::CreditCapitalResult;

/// N(0, 1) sampler.
pub fn standard_normal() -> CreditCapitalResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| CreditCapitalError::Numerical {
        context: format!("standard normal construction failed: {e}"),
    })
}

/// Φ(x).
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Φ⁻¹(p), with Φ⁻¹(0) = -∞ and Φ⁻¹(1) = +∞.
pub fn norm_inv(p: f64) -> f64 {
    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else {
        -SQRT_2 * erfc_inv(2.0 * p)
    }
}
