pub mod audit;
pub mod decision;
pub mod generation;
pub mod indicators;
pub mod policy;
