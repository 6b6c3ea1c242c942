use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::credit_state::matrix::{builtin_matrix, MatrixSelector, TransitionMatrix, BUILTIN_MATRICES};
use crate::credit_state::position::Position;
use crate::credit_state::rating::Rating;
use crate::error::CreditCapitalError;
use crate::simulation::aggregator::LossVector;
use crate::simulation::config::{SimulationConfig, SimulationMode};
use crate::simulation::copula::resolve_seed;
use crate::simulation::engine::simulate_credit_losses;
use crate::statistics::decomposition::IssuerDecomposition;
use crate::statistics::summary::{summarize_losses, ConvergenceDiagnostics, LossSummary};
use crate::types::{with_metadata, ComputationOutput, Framework, Money, Rate};
use crate::CreditCapitalResult;

/// Basel multiplier turning a capital charge into risk-weighted assets.
const RWA_MULTIPLIER: Decimal = dec!(12.5);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for every capital calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalInput {
    pub positions: Vec<Position>,
    /// Mode is set by the framework; everything else is honoured
    #[serde(default)]
    pub config: SimulationConfig,
    #[serde(default)]
    pub matrix_selector: MatrixSelector,
    /// Extra percentiles to report; defaults to 95 / 99 / 99.9
    #[serde(default)]
    pub confidence_levels: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileLoss {
    pub confidence: f64,
    pub loss: Money,
}

/// Capital charge with loss-distribution statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalChargeOutput {
    pub framework: Framework,
    pub capital_charge: Money,
    /// capital_charge × 12.5
    pub rwa: Money,
    /// capital_charge / total_notional
    pub capital_ratio: Rate,
    pub mean_loss: Money,
    pub median_loss: Money,
    pub std_dev_loss: Money,
    pub expected_shortfall: Money,
    pub min_loss: Money,
    pub max_loss: Money,
    pub percentiles: Vec<PercentileLoss>,
    pub confidence_level: f64,
    pub num_simulations: usize,
    pub num_positions: usize,
    pub num_obligors: usize,
    pub total_notional: Money,
    pub total_market_value: Money,
    pub matrices_used: Vec<String>,
    pub seed: u64,
    pub convergence: ConvergenceDiagnostics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerContributionOutput {
    pub obligor_id: String,
    pub rating: Rating,
    pub num_positions: usize,
    pub notional: Money,
    pub standalone_capital: Money,
    pub capital_without_issuer: Money,
    pub marginal_contribution: Money,
    pub pct_of_total: Decimal,
}

/// Capital charge broken down by obligor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerCapitalOutput {
    pub capital: CapitalChargeOutput,
    pub issuer_contributions: Vec<IssuerContributionOutput>,
    pub sum_standalone: Money,
    pub sum_marginal: Money,
    /// sum_standalone - capital_charge
    pub diversification_benefit: Money,
}

/// IRC and DRC on the same portfolio and paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalComparisonOutput {
    pub irc: CapitalChargeOutput,
    pub drc: CapitalChargeOutput,
    pub irc_charge: Money,
    pub drc_charge: Money,
    /// max(IRC - DRC, 0)
    pub migration_component: Money,
    /// None when the DRC charge is zero
    pub irc_to_drc_ratio: Option<Decimal>,
    pub commentary: String,
}

/// A built-in transition matrix listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixListing {
    pub name: String,
    pub aliases: Vec<String>,
    pub default_probabilities: Vec<(Rating, f64)>,
    pub matrix: TransitionMatrix,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_money(value: f64, context: &str) -> CreditCapitalResult<Money> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| CreditCapitalError::Numerical {
            context: format!("{} is not representable: {}", context, value),
        })
}

fn to_rate(value: f64, dp: u32, context: &str) -> CreditCapitalResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(dp))
        .ok_or_else(|| CreditCapitalError::Numerical {
            context: format!("{} is not representable: {}", context, value),
        })
}

fn framework_config(config: &SimulationConfig, framework: Framework) -> SimulationConfig {
    let mode = match framework {
        Framework::Irc => SimulationMode::Migration,
        Framework::Drc => SimulationMode::DefaultOnly,
    };
    SimulationConfig {
        mode,
        ..config.clone()
    }
}

fn methodology(framework: Framework, config: &SimulationConfig) -> String {
    let events = match config.mode {
        SimulationMode::Migration => "rating migration and default",
        SimulationMode::DefaultOnly => "default only",
    };
    format!(
        "{} Monte Carlo: {} ({}), one-year horizon, nearest-rank {:.1}th percentile",
        framework.label(),
        config.effective_factor_model().label(),
        events,
        config.confidence_level * 100.0
    )
}

fn assumptions(config: &SimulationConfig, vector: &LossVector) -> serde_json::Value {
    serde_json::json!({
        "mode": config.mode,
        "factor_model": config.effective_factor_model(),
        "confidence_level": config.confidence_level,
        "horizon_years": config.horizon_years,
        "num_simulations": config.num_simulations,
        "seed": vector.seed,
        "pd_floor": config.pd_floor,
        "percentile_convention": "nearest rank, k = ceil(q * N)",
        "obligor_netting": "long/short netted within obligor, floored at zero",
    })
}

fn matrices_used(vector: &LossVector) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    for o in &vector.obligors {
        if !used.contains(&o.matrix) {
            used.push(o.matrix.clone());
        }
    }
    used
}

fn build_charge(
    framework: Framework,
    positions: &[Position],
    vector: &LossVector,
    summary: &LossSummary,
) -> CreditCapitalResult<CapitalChargeOutput> {
    let capital_charge = to_money(summary.capital_charge, "capital_charge")?;
    let total_notional_f: f64 = positions.iter().map(|p| p.notional).sum();
    let total_market_value_f: f64 = positions.iter().map(|p| p.market_value_or_notional()).sum();
    let capital_ratio = if total_notional_f > 0.0 {
        to_rate(summary.capital_charge / total_notional_f, 6, "capital_ratio")?
    } else {
        Decimal::ZERO
    };

    let percentiles = summary
        .percentiles
        .iter()
        .map(|p| {
            Ok(PercentileLoss {
                confidence: p.confidence,
                loss: to_money(p.loss, "percentile")?,
            })
        })
        .collect::<CreditCapitalResult<Vec<_>>>()?;

    Ok(CapitalChargeOutput {
        framework,
        capital_charge,
        rwa: capital_charge * RWA_MULTIPLIER,
        capital_ratio,
        mean_loss: to_money(summary.mean, "mean_loss")?,
        median_loss: to_money(summary.median, "median_loss")?,
        std_dev_loss: to_money(summary.std_dev, "std_dev_loss")?,
        expected_shortfall: to_money(summary.expected_shortfall, "expected_shortfall")?,
        min_loss: to_money(summary.min, "min_loss")?,
        max_loss: to_money(summary.max, "max_loss")?,
        percentiles,
        confidence_level: summary.confidence_level,
        num_simulations: summary.num_simulations,
        num_positions: positions.len(),
        num_obligors: vector.obligors.len(),
        total_notional: to_money(total_notional_f, "total_notional")?,
        total_market_value: to_money(total_market_value_f, "total_market_value")?,
        matrices_used: matrices_used(vector),
        seed: vector.seed,
        convergence: summary.convergence.clone(),
    })
}

fn build_contributions(
    decomposition: &IssuerDecomposition,
) -> CreditCapitalResult<Vec<IssuerContributionOutput>> {
    decomposition
        .contributions
        .iter()
        .map(|c| {
            Ok(IssuerContributionOutput {
                obligor_id: c.obligor_id.clone(),
                rating: c.rating,
                num_positions: c.num_positions,
                notional: to_money(c.notional, "notional")?,
                standalone_capital: to_money(c.standalone_capital, "standalone_capital")?,
                capital_without_issuer: to_money(c.capital_without_issuer, "capital_without_issuer")?,
                marginal_contribution: to_money(c.marginal_contribution, "marginal_contribution")?,
                pct_of_total: to_rate(c.pct_of_total, 4, "pct_of_total")?,
            })
        })
        .collect()
}

/// Simulate, summarize and package one framework's capital.
fn run_framework(
    input: &CapitalInput,
    framework: Framework,
    config: &SimulationConfig,
    issuer_breakdown: bool,
) -> CreditCapitalResult<(CapitalChargeOutput, LossSummary, LossVector)> {
    let vector = simulate_credit_losses(&input.positions, &input.matrix_selector, config)?;
    let summary = summarize_losses(&vector, &input.confidence_levels, issuer_breakdown)?;
    let charge = build_charge(framework, &input.positions, &vector, &summary)?;
    info!(
        framework = framework.label(),
        capital = %charge.capital_charge,
        obligors = charge.num_obligors,
        paths = charge.num_simulations,
        "capital charge computed"
    );
    Ok((charge, summary, vector))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Basel 2.5 Incremental Risk Charge: default and migration, 99.9% one year.
pub fn calculate_irc(input: &CapitalInput) -> CreditCapitalResult<ComputationOutput<CapitalChargeOutput>> {
    calculate_capital(input, Framework::Irc)
}

/// FRTB internal-model Default Risk Charge: default only, 99.9% one year.
pub fn calculate_drc(input: &CapitalInput) -> CreditCapitalResult<ComputationOutput<CapitalChargeOutput>> {
    calculate_capital(input, Framework::Drc)
}

/// Capital charge for either framework.
pub fn calculate_capital(
    input: &CapitalInput,
    framework: Framework,
) -> CreditCapitalResult<ComputationOutput<CapitalChargeOutput>> {
    let start = Instant::now();
    let config = framework_config(&input.config, framework);
    let (charge, summary, vector) = run_framework(input, framework, &config, false)?;

    Ok(with_metadata(
        &methodology(framework, &config),
        &assumptions(&config, &vector),
        summary.warnings,
        start.elapsed().as_micros() as u64,
        charge,
    ))
}

/// Capital charge plus per-obligor standalone and marginal contributions.
pub fn calculate_capital_by_issuer(
    input: &CapitalInput,
    framework: Framework,
) -> CreditCapitalResult<ComputationOutput<IssuerCapitalOutput>> {
    let start = Instant::now();
    let config = SimulationConfig {
        retain_obligor_losses: true,
        ..framework_config(&input.config, framework)
    };
    let (charge, summary, vector) = run_framework(input, framework, &config, true)?;
    let decomposition = summary.issuer_breakdown.as_ref().ok_or_else(|| {
        CreditCapitalError::InsufficientData("issuer breakdown was not produced".into())
    })?;

    let mut warnings = summary.warnings.clone();
    let negative: Vec<&str> = decomposition
        .contributions
        .iter()
        .filter(|c| c.marginal_contribution < 0.0)
        .map(|c| c.obligor_id.as_str())
        .collect();
    if !negative.is_empty() {
        warnings.push(format!(
            "Negative marginal contribution (hedging benefit) for: {}",
            negative.join(", ")
        ));
    }

    let sum_standalone = to_money(decomposition.sum_standalone, "sum_standalone")?;
    let output = IssuerCapitalOutput {
        issuer_contributions: build_contributions(decomposition)?,
        sum_standalone,
        sum_marginal: to_money(decomposition.sum_marginal, "sum_marginal")?,
        diversification_benefit: sum_standalone - charge.capital_charge,
        capital: charge,
    };

    Ok(with_metadata(
        &format!(
            "{}; marginal contributions by removing each obligor from the same paths",
            methodology(framework, &config)
        ),
        &assumptions(&config, &vector),
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    ))
}

/// IRC against DRC on the same portfolio, seed and factor model.
pub fn compare_irc_vs_drc(
    input: &CapitalInput,
) -> CreditCapitalResult<ComputationOutput<CapitalComparisonOutput>> {
    let start = Instant::now();
    let seed = resolve_seed(input.config.seed);
    let shared = SimulationConfig {
        seed: Some(seed),
        factor_model: Some(input.config.effective_factor_model()),
        ..input.config.clone()
    };
    let irc_config = framework_config(&shared, Framework::Irc);
    let drc_config = framework_config(&shared, Framework::Drc);
    let (irc, irc_summary, vector) = run_framework(input, Framework::Irc, &irc_config, false)?;
    let (drc, drc_summary, _) = run_framework(input, Framework::Drc, &drc_config, false)?;

    let migration_component = (irc.capital_charge - drc.capital_charge).max(Decimal::ZERO);
    let irc_to_drc_ratio = if drc.capital_charge > Decimal::ZERO {
        Some((irc.capital_charge / drc.capital_charge).round_dp(4))
    } else {
        None
    };

    let mut warnings = irc_summary.warnings;
    for w in drc_summary.warnings {
        if !warnings.contains(&w) {
            warnings.push(w);
        }
    }

    let output = CapitalComparisonOutput {
        irc_charge: irc.capital_charge,
        drc_charge: drc.capital_charge,
        migration_component,
        irc_to_drc_ratio,
        commentary: "IRC exceeds DRC by the cost of rating migration; DRC recognises default only, \
                     with migration risk left to spread-based expected shortfall."
            .into(),
        irc,
        drc,
    };

    Ok(with_metadata(
        &format!(
            "IRC vs DRC on common random numbers ({})",
            shared.effective_factor_model().label()
        ),
        &assumptions(&irc_config, &vector),
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    ))
}

/// Built-in transition matrices with their aliases and default columns.
pub fn list_transition_matrices() -> CreditCapitalResult<Vec<MatrixListing>> {
    let aliases: [(&str, &[&str]); 7] = [
        ("global", &["us_corporate", "default"]),
        ("europe", &["eu"]),
        ("emerging_markets", &["em"]),
        ("financials", &["financial", "banks"]),
        ("sovereign", &["sovereigns"]),
        ("recession", &["stressed", "downturn", "crisis"]),
        ("benign", &["expansion"]),
    ];
    BUILTIN_MATRICES
        .iter()
        .map(|name| {
            let matrix = builtin_matrix(name)?;
            let compiled = matrix.compile()?;
            Ok(MatrixListing {
                name: name.to_string(),
                aliases: aliases
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, a)| a.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
                default_probabilities: Rating::ALL
                    .iter()
                    .filter(|r| !r.is_default())
                    .map(|r| (*r, compiled.default_probability(*r)))
                    .collect(),
                matrix,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
