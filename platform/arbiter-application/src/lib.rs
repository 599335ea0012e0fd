pub mod config;
pub mod features;
pub mod meta;
pub mod reporting;
pub mod shared;
pub mod trading_loop;
