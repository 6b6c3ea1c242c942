pub mod decomposition;
pub mod percentile;
pub mod summary;
