use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All reported monetary values. Wraps Decimal to keep report figures exact.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Regulatory framework a capital figure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Basel 2.5 Incremental Risk Charge: default and migration.
    Irc,
    /// FRTB internal-model Default Risk Charge: default only.
    Drc,
}

impl Framework {
    pub fn label(&self) -> &'static str {
        match self {
            Framework::Irc => "IRC",
            Framework::Drc => "DRC",
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata.
///
/// Simulation runs in IEEE-754 doubles; only the reported money figures are
/// converted to Decimal, so the precision tag says both.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64 simulation / rust_decimal_128bit reporting".to_string(),
        },
    }
}
