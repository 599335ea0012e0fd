pub mod history;
pub mod indicators;
pub mod market_state;
pub mod portfolio;
