pub mod capital;
pub mod matrices;
