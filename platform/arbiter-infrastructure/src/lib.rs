pub mod artifacts;
pub mod generation;
pub mod market;
