pub mod action_type;
pub mod ohlcv;
pub mod trade_decision;
