use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::credit_state::obligor::{ObligorBook, ObligorCreditState};
use crate::credit_state::rating::Rating;
use crate::error::CreditCapitalError;
use crate::simulation::config::SimulationMode;
use crate::simulation::copula::ShockGenerator;
use crate::simulation::migration::{obligor_losses, resolve_states};
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Static description of an obligor carried alongside the losses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObligorSummary {
    pub obligor_id: String,
    pub rating: Rating,
    pub pd: f64,
    pub matrix: String,
    pub num_positions: usize,
    pub gross_notional: f64,
    pub net_notional: f64,
}

/// Per-path portfolio losses of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossVector {
    /// Portfolio loss per path, in path order
    pub losses: Vec<f64>,
    /// Seed actually used; replaying it reproduces `losses` bit for bit
    pub seed: u64,
    pub mode: SimulationMode,
    pub confidence_level: f64,
    pub strict_simulation_count: bool,
    pub obligors: Vec<ObligorSummary>,
    /// Obligor-major path losses (`[obligor * paths + path]`), when retained
    #[serde(skip)]
    pub obligor_losses: Option<Vec<f64>>,
    pub warnings: Vec<String>,
}

/// Output of one block of paths.
#[derive(Debug, Clone)]
pub struct BlockResult {
    pub paths: Range<usize>,
    pub losses: Vec<f64>,
    /// Path-major obligor losses for the block, when retained
    pub obligor_losses: Option<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Block simulation
// ---------------------------------------------------------------------------

/// Simulate paths `paths` of block `block`, netting within obligors and
/// summing across them.
pub fn simulate_block(
    book: &ObligorBook,
    generator: &ShockGenerator,
    block: usize,
    paths: Range<usize>,
    retain_obligor_losses: bool,
) -> CreditCapitalResult<BlockResult> {
    let n = book.len();
    let mut rng = generator.block_rng(block);
    let mut shocks = vec![0.0; n];
    let mut states = vec![ObligorCreditState::Survived; n];
    let mut per_obligor = vec![0.0; n];
    let mut losses = Vec::with_capacity(paths.len());
    let mut retained = if retain_obligor_losses {
        Some(Vec::with_capacity(paths.len() * n))
    } else {
        None
    };

    for path in paths.clone() {
        generator.draw_path(&mut rng, &mut shocks);
        resolve_states(book, &shocks, &mut states);
        obligor_losses(book, &states, &mut per_obligor);
        losses.push(aggregate_path(book, &per_obligor, path)?);
        if let Some(buf) = retained.as_mut() {
            buf.extend_from_slice(&per_obligor);
        }
    }

    Ok(BlockResult {
        paths,
        losses,
        obligor_losses: retained,
    })
}

/// Sum obligor losses into the path loss, failing on non-finite values.
pub fn aggregate_path(book: &ObligorBook, per_obligor: &[f64], path: usize) -> CreditCapitalResult<f64> {
    let mut total = 0.0;
    for (i, &loss) in per_obligor.iter().enumerate() {
        if !loss.is_finite() {
            return Err(CreditCapitalError::Numerical {
                context: format!(
                    "non-finite loss {} for obligor '{}' on path {}",
                    loss, book.obligors[i].id, path
                ),
            });
        }
        total += loss;
    }
    if !total.is_finite() {
        return Err(CreditCapitalError::Numerical {
            context: format!("non-finite portfolio loss on path {}", path),
        });
    }
    Ok(total)
}

/// Concatenate block results in path order.
///
/// Returns the portfolio losses and, when every block retained them, the
/// obligor-major matrix of obligor losses.
pub fn concatenate_blocks(
    blocks: Vec<BlockResult>,
    num_paths: usize,
    num_obligors: usize,
) -> (Vec<f64>, Option<Vec<f64>>) {
    let retain = !blocks.is_empty() && blocks.iter().all(|b| b.obligor_losses.is_some());
    let mut losses = Vec::with_capacity(num_paths);
    let mut by_obligor = if retain {
        Some(vec![0.0; num_paths * num_obligors])
    } else {
        None
    };

    for block in blocks {
        if let (Some(dst), Some(src)) = (by_obligor.as_mut(), block.obligor_losses.as_ref()) {
            for (offset, path) in block.paths.clone().enumerate() {
                for i in 0..num_obligors {
                    dst[i * num_paths + path] = src[offset * num_obligors + i];
                }
            }
        }
        losses.extend(block.losses);
    }
    (losses, by_obligor)
}

impl ObligorSummary {
    pub fn from_book(book: &ObligorBook) -> Vec<ObligorSummary> {
        book.obligors
            .iter()
            .map(|o| ObligorSummary {
                obligor_id: o.id.clone(),
                rating: o.rating,
                pd: o.pd,
                matrix: o.matrix.clone(),
                num_positions: o.position_indices.len(),
                gross_notional: o.gross_notional,
                net_notional: o.net_notional,
            })
            .collect()
    }
}

impl LossVector {
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn obligor_ids(&self) -> Vec<String> {
        self.obligors.iter().map(|o| o.obligor_id.clone()).collect()
    }

    /// Path losses of obligor `i`, when retained.
    pub fn obligor_path_losses(&self, i: usize) -> Option<&[f64]> {
        let n = self.losses.len();
        self.obligor_losses
            .as_ref()
            .and_then(|all| all.get(i * n..(i + 1) * n))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
