use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::credit_state::rating::Rating;
use crate::error::CreditCapitalError;
use crate::simulation::aggregator::LossVector;
use crate::statistics::percentile::{percentile_sorted, sorted_copy};
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Capital attributable to one obligor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerContribution {
    pub obligor_id: String,
    pub rating: Rating,
    pub num_positions: usize,
    /// Gross notional across the obligor's positions
    pub notional: f64,
    /// Capital of the obligor on its own, same paths
    pub standalone_capital: f64,
    pub capital_without_issuer: f64,
    /// total_capital - capital_without_issuer; negative for hedges
    pub marginal_contribution: f64,
    pub pct_of_total: f64,
}

/// Issuer breakdown of a capital figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerDecomposition {
    /// Sorted by marginal contribution, largest first
    pub contributions: Vec<IssuerContribution>,
    pub total_capital: f64,
    pub sum_standalone: f64,
    pub sum_marginal: f64,
    /// sum_standalone - total_capital
    pub diversification_benefit: f64,
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

/// Break `total_capital` down by obligor using the retained obligor losses.
///
/// Removing an obligor reuses the same paths (common random numbers), so
/// `capital_without_issuer` matches a rerun with that obligor's notional set
/// to zero under the same seed, up to floating-point rounding. Marginals are
/// not rescaled to add up to the total.
pub fn decompose_by_issuer(
    vector: &LossVector,
    confidence: f64,
    total_capital: f64,
) -> CreditCapitalResult<IssuerDecomposition> {
    if vector.obligor_losses.is_none() {
        return Err(CreditCapitalError::InvalidInput {
            field: "config.retain_obligor_losses".into(),
            reason: "issuer breakdown needs per-obligor path losses; simulate with retain_obligor_losses = true".into(),
        });
    }

    let indices: Vec<usize> = (0..vector.obligors.len()).collect();

    #[cfg(feature = "parallel")]
    let iter = indices.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = indices.iter();

    let computed: Vec<CreditCapitalResult<IssuerContribution>> = iter
        .map(|&i| contribution(vector, i, confidence, total_capital))
        .collect();
    let mut contributions = computed.into_iter().collect::<CreditCapitalResult<Vec<_>>>()?;

    contributions.sort_by(|a, b| {
        b.marginal_contribution
            .total_cmp(&a.marginal_contribution)
            .then_with(|| a.obligor_id.cmp(&b.obligor_id))
    });

    let sum_standalone: f64 = contributions.iter().map(|c| c.standalone_capital).sum();
    let sum_marginal: f64 = contributions.iter().map(|c| c.marginal_contribution).sum();

    Ok(IssuerDecomposition {
        contributions,
        total_capital,
        sum_standalone,
        sum_marginal,
        diversification_benefit: sum_standalone - total_capital,
    })
}

fn contribution(
    vector: &LossVector,
    i: usize,
    confidence: f64,
    total_capital: f64,
) -> CreditCapitalResult<IssuerContribution> {
    let own = vector.obligor_path_losses(i).ok_or_else(|| CreditCapitalError::InsufficientData(
        format!("missing path losses for obligor index {}", i),
    ))?;
    let summary = &vector.obligors[i];

    let standalone_capital = percentile_sorted(&sorted_copy(own), confidence);
    let without: Vec<f64> = vector
        .losses
        .iter()
        .zip(own)
        .map(|(total, li)| (total - li).max(0.0))
        .collect();
    let capital_without_issuer = percentile_sorted(&sorted_copy(&without), confidence);
    let marginal_contribution = total_capital - capital_without_issuer;
    let pct_of_total = if total_capital > 0.0 {
        marginal_contribution / total_capital * 100.0
    } else {
        0.0
    };

    Ok(IssuerContribution {
        obligor_id: summary.obligor_id.clone(),
        rating: summary.rating,
        num_positions: summary.num_positions,
        notional: summary.gross_notional,
        standalone_capital,
        capital_without_issuer,
        marginal_contribution,
        pct_of_total,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
