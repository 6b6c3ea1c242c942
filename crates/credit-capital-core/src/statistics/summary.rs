use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CreditCapitalError;
use crate::simulation::aggregator::LossVector;
use crate::statistics::decomposition::{decompose_by_issuer, IssuerDecomposition};
use crate::statistics::percentile::{
    check_adequacy, expected_shortfall_sorted, percentile_sorted, required_simulations, sorted_copy,
    tail_count,
};
use crate::CreditCapitalResult;

/// Percentiles reported when the caller does not ask for specific ones.
pub const DEFAULT_CONFIDENCE_LEVELS: [f64; 3] = [0.95, 0.99, 0.999];

/// Contiguous batches used for convergence diagnostics.
pub const CONVERGENCE_BATCHES: usize = 10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentilePoint {
    pub confidence: f64,
    pub loss: f64,
}

/// Spread of the capital estimate across independent sub-samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceDiagnostics {
    pub num_batches: usize,
    pub batch_capital: Vec<f64>,
    pub mean_batch_capital: f64,
    pub std_dev_batch_capital: f64,
    /// std_dev / sqrt(num_batches)
    pub standard_error: f64,
    /// standard_error / capital, 0 when capital is 0
    pub relative_standard_error: f64,
    /// Paths at or beyond the capital quantile
    pub tail_observations: usize,
}

/// Statistics extracted from one loss vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossSummary {
    pub num_simulations: usize,
    pub confidence_level: f64,
    pub capital_charge: f64,
    pub expected_shortfall: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Vec<PercentilePoint>,
    pub convergence: ConvergenceDiagnostics,
    pub issuer_breakdown: Option<IssuerDecomposition>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Reduce a loss vector to capital, tail and convergence statistics.
///
/// The capital charge is taken at the vector's own confidence level;
/// `confidence_levels` adds reported percentiles (defaults when empty).
pub fn summarize_losses(
    vector: &LossVector,
    confidence_levels: &[f64],
    issuer_breakdown: bool,
) -> CreditCapitalResult<LossSummary> {
    if vector.is_empty() {
        return Err(CreditCapitalError::InsufficientData(
            "Loss vector is empty".into(),
        ));
    }
    let levels: Vec<f64> = if confidence_levels.is_empty() {
        DEFAULT_CONFIDENCE_LEVELS.to_vec()
    } else {
        confidence_levels.to_vec()
    };
    for &q in levels.iter().chain(std::iter::once(&vector.confidence_level)) {
        if !q.is_finite() || q <= 0.0 || q >= 1.0 {
            return Err(CreditCapitalError::InvalidInput {
                field: "confidence_levels".into(),
                reason: format!("must be in (0, 1), got {}", q),
            });
        }
    }

    let n = vector.len();
    let q = vector.confidence_level;
    let mut warnings = vector.warnings.clone();
    for &level in &levels {
        let required = required_simulations(level);
        if n < required {
            return Err(CreditCapitalError::InsufficientSimulations {
                required,
                actual: n,
                confidence: level,
            });
        }
    }
    if let Some(w) = check_adequacy(n, q, vector.strict_simulation_count)? {
        if !warnings.contains(&w) {
            warn!("{}", w);
            warnings.push(w);
        }
    }

    if let Some(path) = vector.losses.iter().position(|l| !l.is_finite()) {
        return Err(CreditCapitalError::Numerical {
            context: format!("non-finite portfolio loss on path {}", path),
        });
    }

    let sorted = sorted_copy(&vector.losses);
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        sorted.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let capital_charge = percentile_sorted(&sorted, q);
    let expected_shortfall = expected_shortfall_sorted(&sorted, q);
    for (name, value) in [
        ("mean", mean),
        ("variance", variance),
        ("expected shortfall", expected_shortfall),
    ] {
        if !value.is_finite() {
            return Err(CreditCapitalError::Numerical {
                context: format!("loss {} overflowed over {} paths", name, n),
            });
        }
    }

    let percentiles = levels
        .iter()
        .map(|&level| PercentilePoint {
            confidence: level,
            loss: percentile_sorted(&sorted, level),
        })
        .collect();

    let issuer_breakdown = if issuer_breakdown {
        Some(decompose_by_issuer(vector, q, capital_charge)?)
    } else {
        None
    };

    Ok(LossSummary {
        num_simulations: n,
        confidence_level: q,
        capital_charge,
        expected_shortfall,
        mean,
        median: percentile_sorted(&sorted, 0.5),
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
        percentiles,
        convergence: convergence_diagnostics(&vector.losses, q, capital_charge),
        issuer_breakdown,
        warnings,
    })
}

/// Capital re-estimated on [`CONVERGENCE_BATCHES`] contiguous slices of the
/// path-ordered losses.
pub fn convergence_diagnostics(losses: &[f64], q: f64, capital: f64) -> ConvergenceDiagnostics {
    let n = losses.len();
    let batches = CONVERGENCE_BATCHES.min(n).max(1);
    let base = n / batches;
    let rem = n % batches;

    let mut batch_capital = Vec::with_capacity(batches);
    let mut start = 0;
    for b in 0..batches {
        let len = if b < rem { base + 1 } else { base };
        let slice = &losses[start..start + len];
        batch_capital.push(percentile_sorted(&sorted_copy(slice), q));
        start += len;
    }

    let k = batch_capital.len() as f64;
    let mean_batch_capital = batch_capital.iter().sum::<f64>() / k;
    let std_dev_batch_capital = if batch_capital.len() > 1 {
        (batch_capital
            .iter()
            .map(|c| (c - mean_batch_capital).powi(2))
            .sum::<f64>()
            / (k - 1.0))
            .sqrt()
    } else {
        0.0
    };
    let standard_error = std_dev_batch_capital / k.sqrt();

    ConvergenceDiagnostics {
        num_batches: batch_capital.len(),
        batch_capital,
        mean_batch_capital,
        std_dev_batch_capital,
        standard_error,
        relative_standard_error: if capital > 0.0 {
            standard_error / capital
        } else {
            0.0
        },
        tail_observations: tail_count(q, n),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::SimulationMode;
    use approx::assert_abs_diff_eq;

    fn vector(losses: Vec<f64>, q: f64) -> LossVector {
        LossVector {
            losses,
            seed: 0,
            mode: SimulationMode::Migration,
            confidence_level: q,
            strict_simulation_count: false,
            obligors: vec![],
            obligor_losses: None,
            warnings: vec![],
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        // Shuffled so sorting matters
        (0..n).map(|i| ((i * 7919) % n) as f64).collect()
    }

    #[test]
    fn test_summary_on_ramp() {
        let v = vector(ramp(10_000), 0.999);
        let s = summarize_losses(&v, &[], false).unwrap();
        assert_eq!(s.num_simulations, 10_000);
        // rank 9990 -> value 9989
        assert_eq!(s.capital_charge, 9989.0);
        assert_abs_diff_eq!(s.expected_shortfall, (9989.0 + 9999.0) / 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s.mean, 4999.5, epsilon = 1e-9);
        assert_eq!(s.median, 4999.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 9999.0);
        assert_eq!(s.percentiles.len(), 3);
        assert_eq!(s.percentiles[0].loss, 9499.0);
        assert_eq!(s.percentiles[1].loss, 9899.0);
        assert_eq!(s.percentiles[2].loss, s.capital_charge);
        assert_eq!(s.convergence.tail_observations, 11);
        assert!(s.warnings.is_empty());
        assert!(s.issuer_breakdown.is_none());
    }

    #[test]
    fn test_expected_shortfall_at_least_capital() {
        let v = vector(ramp(20_000), 0.99);
        let s = summarize_losses(&v, &[0.5], false).unwrap();
        assert!(s.expected_shortfall >= s.capital_charge);
        assert_eq!(s.percentiles.len(), 1);
    }

    #[test]
    fn test_requested_level_checked_for_adequacy() {
        let v = vector(ramp(500), 0.99);
        assert!(matches!(
            summarize_losses(&v, &[0.999], false),
            Err(CreditCapitalError::InsufficientSimulations { .. })
        ));
        let ok = summarize_losses(&v, &[0.95], false).unwrap();
        assert_eq!(ok.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_level() {
        let v = vector(ramp(20_000), 0.99);
        assert!(summarize_losses(&v, &[1.5], false).is_err());
    }

    #[test]
    fn test_empty_vector() {
        let v = vector(vec![], 0.99);
        assert!(matches!(
            summarize_losses(&v, &[], false),
            Err(CreditCapitalError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_non_finite_loss_rejected() {
        let mut losses = ramp(10_000);
        losses[7] = f64::INFINITY;
        let err = summarize_losses(&vector(losses, 0.99), &[], false).unwrap_err();
        assert!(err.to_string().contains("path 7"), "{}", err);
    }

    #[test]
    fn test_overflowing_mean_rejected() {
        let losses = vec![f64::MAX; 10_000];
        assert!(matches!(
            summarize_losses(&vector(losses, 0.99), &[], false),
            Err(CreditCapitalError::Numerical { .. })
        ));
    }

    #[test]
    fn test_convergence_batches() {
        let losses: Vec<f64> = (0..1_005).map(|i| (i % 100) as f64).collect();
        let d = convergence_diagnostics(&losses, 0.95, 95.0);
        assert_eq!(d.num_batches, 10);
        assert_eq!(d.batch_capital.len(), 10);
        assert!(d.standard_error >= 0.0);
        assert_eq!(d.tail_observations, 1_005 - 955 + 1);
    }

    #[test]
    fn test_convergence_identical_batches_zero_error() {
        let losses: Vec<f64> = (0..1_000).map(|i| (i % 100) as f64).collect();
        let d = convergence_diagnostics(&losses, 0.9, 89.0);
        assert!(d.batch_capital.iter().all(|c| *c == 89.0));
        assert_eq!(d.standard_error, 0.0);
        assert_eq!(d.relative_standard_error, 0.0);
    }
}
