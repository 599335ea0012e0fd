pub mod artifacts;
pub mod environment;
pub mod generation;
pub mod policy;
