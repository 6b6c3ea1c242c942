pub mod matrix;
pub mod obligor;
pub mod position;
pub mod rating;
pub mod spreads;
