use clap::Args;
use serde_json::Value;
use tracing::debug;

use credit_capital_core::capital::{self, CapitalInput};
use credit_capital_core::{FactorModel, Framework, MatrixSelector};

use crate::input;

/// Arguments shared by the IRC and DRC commands
#[derive(Args)]
pub struct CapitalArgs {
    /// Path to JSON input file ({"positions": [...], "config": {...}, ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Number of Monte Carlo paths
    #[arg(long)]
    pub simulations: Option<usize>,

    /// RNG seed; drawn from OS entropy and reported when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Single-factor asset correlation ρ
    #[arg(long, conflicts_with = "loading")]
    pub correlation: Option<f64>,

    /// Two-factor default loading for obligors without systematic_factor
    #[arg(long)]
    pub loading: Option<f64>,

    /// Confidence level of the capital charge
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Send every obligor to one transition matrix (name or alias)
    #[arg(long)]
    pub matrix: Option<String>,

    /// Fail instead of warning below 10,000 paths
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the IRC vs DRC comparison
#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub capital: CapitalArgs,
}

fn load_input(args: &CapitalArgs, what: &str) -> Result<CapitalInput, Box<dyn std::error::Error>> {
    let mut capital_input: CapitalInput = input::read_input(args.input.as_deref(), what)?;

    let config = &mut capital_input.config;
    if let Some(n) = args.simulations {
        config.num_simulations = n;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(rho) = args.correlation {
        config.factor_model = Some(FactorModel::SingleFactor { rho });
    }
    if let Some(default_loading) = args.loading {
        config.factor_model = Some(FactorModel::TwoFactor { default_loading });
    }
    if let Some(q) = args.confidence {
        config.confidence_level = q;
    }
    if args.strict {
        config.strict_simulation_count = true;
    }
    if let Some(ref name) = args.matrix {
        capital_input.matrix_selector = MatrixSelector {
            custom_matrices: capital_input.matrix_selector.custom_matrices.clone(),
            ..MatrixSelector::single(name)
        };
    }
    debug!(
        positions = capital_input.positions.len(),
        paths = capital_input.config.num_simulations,
        seed = ?capital_input.config.seed,
        "{} input loaded",
        what
    );
    Ok(capital_input)
}

pub fn run_irc(args: CapitalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let capital_input = load_input(&args, "IRC")?;
    let result = capital::calculate_irc(&capital_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_drc(args: CapitalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let capital_input = load_input(&args, "DRC")?;
    let result = capital::calculate_drc(&capital_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_irc_by_issuer(args: CapitalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let capital_input = load_input(&args, "IRC issuer breakdown")?;
    let result = capital::calculate_capital_by_issuer(&capital_input, Framework::Irc)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_drc_by_issuer(args: CapitalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let capital_input = load_input(&args, "DRC issuer breakdown")?;
    let result = capital::calculate_capital_by_issuer(&capital_input, Framework::Drc)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let capital_input = load_input(&args.capital, "IRC vs DRC comparison")?;
    let result = capital::compare_irc_vs_drc(&capital_input)?;
    Ok(serde_json::to_value(result)?)
}
