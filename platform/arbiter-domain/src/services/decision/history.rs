use crate::entities::history::SymbolHistory;
use crate::entities::indicators::TechnicalIndicators;
use crate::entities::portfolio::PortfolioSnapshot;
use crate::value_objects::ohlcv::Ohlcv;
use crate::value_objects::trade_decision::TradeDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// FIFO buffer that evicts its oldest entries once `cap` is exceeded.
#[derive(Debug, Clone)]
pub struct CappedBuffer<T> {
    cap: usize,
    items: VecDeque<T>,
}

impl<T> CappedBuffer<T> {
    /// A cap of zero is treated as one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            items: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).collect()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub decision: TradeDecision,
    pub raw_response: String,
    pub market_data: BTreeMap<String, Ohlcv>,
    pub portfolio: PortfolioSnapshot,
    pub technical_indicators: BTreeMap<String, TechnicalIndicators>,
    pub detailed_history: BTreeMap<String, SymbolHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub step: u64,
    pub market_data: BTreeMap<String, Ohlcv>,
    pub detailed_history: BTreeMap<String, SymbolHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub step: u64,
    pub portfolio: PortfolioSnapshot,
    pub total_value: f64,
}
