pub mod capital;
pub mod credit_state;
pub mod distribution;
pub mod error;
pub mod simulation;
pub mod statistics;
pub mod types;

pub use credit_state::matrix::{MatrixSelector, TransitionMatrix};
pub use credit_state::position::Position;
pub use credit_state::rating::{Rating, Seniority};
pub use error::CreditCapitalError;
pub use simulation::aggregator::LossVector;
pub use simulation::config::{FactorModel, SimulationConfig, SimulationMode};
pub use simulation::engine::simulate_credit_losses;
pub use statistics::summary::{summarize_losses, LossSummary};
pub use types::*;

/// Standard result type for all credit-capital operations
pub type CreditCapitalResult<T> = Result<T, CreditCapitalError>;
