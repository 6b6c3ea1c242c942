pub mod aggregator;
pub mod config;
pub mod copula;
pub mod engine;
pub mod migration;
