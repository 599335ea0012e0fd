use crate::entities::history::SymbolHistory;
use crate::entities::indicators::TechnicalIndicators;
use crate::entities::portfolio::PortfolioSnapshot;
use crate::value_objects::action_type::ActionType;
use crate::value_objects::ohlcv::Ohlcv;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub step: u64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub step: u64,
    pub action: ActionType,
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub score: f64,
}

/// Everything the decision engine is allowed to look at for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub market_data: BTreeMap<String, Ohlcv>,
    pub portfolio: PortfolioSnapshot,
    pub technical_indicators: BTreeMap<String, TechnicalIndicators>,
    pub price_history: BTreeMap<String, Vec<PricePoint>>,
    pub trade_history: Vec<TradeRecord>,
    pub detailed_history: BTreeMap<String, SymbolHistory>,
    pub symbols: Vec<String>,
}

impl MarketState {
    pub fn total_value(&self) -> f64 {
        self.portfolio.total_value(&self.market_data)
    }
}
