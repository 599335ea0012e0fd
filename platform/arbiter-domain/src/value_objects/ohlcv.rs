use serde::{Deserialize, Serialize};

/// One tick of market data for a single symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlcv {
    pub fn flat(price: f64, volume: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Intraday move used by the momentum fallback.
    pub fn body(&self) -> f64 {
        self.close - self.open
    }
}
