use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub rsi: f64,
    pub macd: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub price_trend: String,
    pub momentum: String,
}

impl Default for TechnicalIndicators {
    fn default() -> Self {
        Self {
            ma5: 0.0,
            ma10: 0.0,
            ma20: 0.0,
            rsi: 50.0,
            macd: 0.0,
            bollinger_upper: 0.0,
            bollinger_lower: 0.0,
            price_trend: "unknown".to_string(),
            momentum: "unknown".to_string(),
        }
    }
}
