use serde::{Deserialize, Serialize};

use crate::error::CreditCapitalError;
use crate::statistics::percentile::check_adequacy;
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a credit event costs: migration repricing plus default (IRC) or
/// default only (DRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    Migration,
    DefaultOnly,
}

/// How obligor shocks load on the systematic factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactorModel {
    /// Z = sqrt(ρ)·X + sqrt(1-ρ)·ε, one ρ for every obligor.
    SingleFactor {
        #[serde(default = "default_rho")]
        rho: f64,
    },
    /// Z = ρ_i·X + sqrt(1-ρ_i²)·ε, ρ_i from the obligor's `systematic_factor`.
    TwoFactor {
        #[serde(default = "default_loading")]
        default_loading: f64,
    },
}

/// Run parameters for one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_num_simulations")]
    pub num_simulations: usize,
    /// Confidence of the capital charge
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Only a one-year horizon is modelled
    #[serde(default = "default_horizon_years")]
    pub horizon_years: f64,
    #[serde(default = "default_mode")]
    pub mode: SimulationMode,
    /// Mode-dependent default when absent: single-factor for migration,
    /// two-factor for default-only
    #[serde(default)]
    pub factor_model: Option<FactorModel>,
    /// Drawn from OS entropy and reported back when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Lower bound applied to default-only PDs
    #[serde(default = "default_pd_floor")]
    pub pd_floor: f64,
    /// Promote the low-path-count warning to an error
    #[serde(default)]
    pub strict_simulation_count: bool,
    /// Keep per-obligor path losses for issuer decomposition
    #[serde(default)]
    pub retain_obligor_losses: bool,
}

fn default_rho() -> f64 {
    0.50
}

fn default_loading() -> f64 {
    0.20
}

fn default_num_simulations() -> usize {
    100_000
}

fn default_confidence_level() -> f64 {
    0.999
}

fn default_horizon_years() -> f64 {
    1.0
}

fn default_mode() -> SimulationMode {
    SimulationMode::Migration
}

fn default_pd_floor() -> f64 {
    0.0003
}

// ---------------------------------------------------------------------------
// FactorModel
// ---------------------------------------------------------------------------

impl FactorModel {
    /// (systematic weight, idiosyncratic weight) for one obligor.
    pub fn weights(&self, obligor_loading: Option<f64>) -> (f64, f64) {
        match *self {
            FactorModel::SingleFactor { rho } => (rho.sqrt(), (1.0 - rho).sqrt()),
            FactorModel::TwoFactor { default_loading } => {
                let r = obligor_loading.unwrap_or(default_loading);
                (r, (1.0 - r * r).max(0.0).sqrt())
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FactorModel::SingleFactor { .. } => "single-factor Gaussian copula",
            FactorModel::TwoFactor { .. } => "two-factor Gaussian copula",
        }
    }

    fn validate(&self) -> CreditCapitalResult<()> {
        let (field, value) = match *self {
            FactorModel::SingleFactor { rho } => ("config.factor_model.rho", rho),
            FactorModel::TwoFactor { default_loading } => {
                ("config.factor_model.default_loading", default_loading)
            }
        };
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(CreditCapitalError::InvalidInput {
                field: field.into(),
                reason: format!("must be in [0, 1], got {}", value),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_simulations: default_num_simulations(),
            confidence_level: default_confidence_level(),
            horizon_years: default_horizon_years(),
            mode: default_mode(),
            factor_model: None,
            seed: None,
            pd_floor: default_pd_floor(),
            strict_simulation_count: false,
            retain_obligor_losses: false,
        }
    }
}

impl SimulationConfig {
    /// Migration mode under the single-factor model.
    pub fn irc() -> Self {
        SimulationConfig::default()
    }

    /// Default-only mode under the two-factor model.
    pub fn drc() -> Self {
        SimulationConfig {
            mode: SimulationMode::DefaultOnly,
            ..SimulationConfig::default()
        }
    }

    /// The configured factor model, or the default for the mode.
    pub fn effective_factor_model(&self) -> FactorModel {
        match (self.factor_model, self.mode) {
            (Some(model), _) => model,
            (None, SimulationMode::Migration) => FactorModel::SingleFactor { rho: default_rho() },
            (None, SimulationMode::DefaultOnly) => FactorModel::TwoFactor {
                default_loading: default_loading(),
            },
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_simulations(mut self, num_simulations: usize) -> Self {
        self.num_simulations = num_simulations;
        self
    }

    /// Check parameters and path-count adequacy. Returns warnings.
    pub fn validate(&self) -> CreditCapitalResult<Vec<String>> {
        if self.num_simulations == 0 {
            return Err(CreditCapitalError::InvalidInput {
                field: "config.num_simulations".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !self.confidence_level.is_finite()
            || self.confidence_level <= 0.0
            || self.confidence_level >= 1.0
        {
            return Err(CreditCapitalError::InvalidInput {
                field: "config.confidence_level".into(),
                reason: format!("must be in (0, 1), got {}", self.confidence_level),
            });
        }
        if self.horizon_years != 1.0 {
            return Err(CreditCapitalError::InvalidInput {
                field: "config.horizon_years".into(),
                reason: format!("only a one-year horizon is supported, got {}", self.horizon_years),
            });
        }
        if !self.pd_floor.is_finite() || !(0.0..1.0).contains(&self.pd_floor) {
            return Err(CreditCapitalError::InvalidInput {
                field: "config.pd_floor".into(),
                reason: format!("must be in [0, 1), got {}", self.pd_floor),
            });
        }
        self.effective_factor_model().validate()?;

        let mut warnings = Vec::new();
        if let Some(w) = check_adequacy(
            self.num_simulations,
            self.confidence_level,
            self.strict_simulation_count,
        )? {
            warnings.push(w);
        }
        Ok(warnings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
