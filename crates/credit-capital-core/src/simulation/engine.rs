use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::credit_state::matrix::MatrixSelector;
use crate::credit_state::obligor::ObligorBook;
use crate::credit_state::position::Position;
use crate::simulation::aggregator::{
    concatenate_blocks, simulate_block, BlockResult, LossVector, ObligorSummary,
};
use crate::simulation::config::SimulationConfig;
use crate::simulation::copula::{block_ranges, resolve_seed, ShockGenerator};
use crate::CreditCapitalResult;

/// Simulate one-year portfolio credit losses.
///
/// Every input is validated before any path is drawn. The returned vector is
/// a pure function of (positions, selector, config, seed) and does not depend
/// on the number of worker threads.
pub fn simulate_credit_losses(
    positions: &[Position],
    matrix_selector: &MatrixSelector,
    config: &SimulationConfig,
) -> CreditCapitalResult<LossVector> {
    let start = Instant::now();
    let warnings = config.validate()?;
    let catalog = matrix_selector.compile()?;
    let book = ObligorBook::build(positions, &catalog, config)?;
    let vector = run(&book, config, warnings)?;

    info!(
        mode = ?vector.mode,
        paths = vector.len(),
        obligors = book.len(),
        seed = vector.seed,
        elapsed_us = start.elapsed().as_micros() as u64,
        "credit loss simulation complete"
    );
    Ok(vector)
}

/// Run the simulation over an already-built obligor book.
fn run(
    book: &ObligorBook,
    config: &SimulationConfig,
    warnings: Vec<String>,
) -> CreditCapitalResult<LossVector> {
    for w in &warnings {
        warn!("{}", w);
    }
    let seed = resolve_seed(config.seed);
    let weights = book
        .obligors
        .iter()
        .map(|o| (o.systematic_weight, o.idiosyncratic_weight))
        .collect();
    let generator = ShockGenerator::new(seed, weights)?;
    let blocks = block_ranges(config.num_simulations);

    debug!(
        seed,
        paths = config.num_simulations,
        blocks = blocks.len(),
        model = config.effective_factor_model().label(),
        "starting simulation"
    );

    let retain = config.retain_obligor_losses;

    #[cfg(feature = "parallel")]
    let results: Vec<CreditCapitalResult<BlockResult>> = blocks
        .into_par_iter()
        .enumerate()
        .map(|(b, paths)| simulate_block(book, &generator, b, paths, retain))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<CreditCapitalResult<BlockResult>> = blocks
        .into_iter()
        .enumerate()
        .map(|(b, paths)| simulate_block(book, &generator, b, paths, retain))
        .collect();

    let results = results.into_iter().collect::<CreditCapitalResult<Vec<_>>>()?;
    let (losses, obligor_losses) =
        concatenate_blocks(results, config.num_simulations, book.len());

    Ok(LossVector {
        losses,
        seed,
        mode: config.mode,
        confidence_level: config.confidence_level,
        strict_simulation_count: config.strict_simulation_count,
        obligors: ObligorSummary::from_book(book),
        obligor_losses,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
