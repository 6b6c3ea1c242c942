//! Nearest-rank order statistics over a loss vector.
//!
//! For N sorted losses the q-quantile is `sorted[k - 1]` with
//! `k = ceil(q·N)`; there is no interpolation between order statistics.

use crate::error::CreditCapitalError;
use crate::CreditCapitalResult;

/// Path count below which results are flagged as unstable.
pub const MIN_STABLE_SIMULATIONS: usize = 10_000;

/// Slack on `q·N` before taking the ceiling so 0.999 × 1000 lands on 999.
const RANK_TOLERANCE: f64 = 1e-9;

/// 1-based nearest rank of the q-quantile among `n` observations.
pub fn nearest_rank(q: f64, n: usize) -> usize {
    let raw = (q * n as f64 - RANK_TOLERANCE).ceil();
    (raw.max(1.0) as usize).min(n)
}

/// q-quantile of ascending `sorted`. Empty input yields 0.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted[nearest_rank(q, sorted.len()) - 1]
}

/// Mean of the tail at and beyond the q-quantile.
pub fn expected_shortfall_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let tail = &sorted[nearest_rank(q, sorted.len()) - 1..];
    tail.iter().sum::<f64>() / tail.len() as f64
}

/// Number of observations at or beyond the q-quantile, `N - k + 1`.
pub fn tail_count(q: f64, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    n - nearest_rank(q, n) + 1
}

/// Sort a copy ascending. Losses are validated finite upstream.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Minimum path count that resolves the q-quantile, `ceil(1 / (1 - q))`.
pub fn required_simulations(q: f64) -> usize {
    (1.0 / (1.0 - q) - RANK_TOLERANCE).ceil().max(1.0) as usize
}

/// Hard error when `n` cannot resolve `q`; warning (or error when `strict`)
/// below [`MIN_STABLE_SIMULATIONS`].
pub fn check_adequacy(n: usize, q: f64, strict: bool) -> CreditCapitalResult<Option<String>> {
    let required = required_simulations(q);
    if n < required {
        return Err(CreditCapitalError::InsufficientSimulations {
            required,
            actual: n,
            confidence: q,
        });
    }
    if n < MIN_STABLE_SIMULATIONS {
        if strict {
            return Err(CreditCapitalError::InsufficientSimulations {
                required: MIN_STABLE_SIMULATIONS,
                actual: n,
                confidence: q,
            });
        }
        return Ok(Some(format!(
            "Only {} simulations; the {:.1}% quantile rests on {} tail paths and is unstable (use at least {})",
            n,
            q * 100.0,
            tail_count(q, n),
            MIN_STABLE_SIMULATIONS
        )));
    }
    Ok(None)
}
