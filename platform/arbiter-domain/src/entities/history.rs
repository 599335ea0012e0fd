use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_change_pct: f64,
    pub trend_direction: String,
    pub trend_strength: String,
    pub volatility_pct: f64,
    pub volume_trend: String,
    pub avg_volume: f64,
    pub min_low: f64,
    pub max_high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAnalysis {
    pub price_momentum: String,
    pub volume_support: String,
    pub volatility_level: String,
    pub trend_quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedHistory {
    pub daily_data: Vec<DailyBar>,
    pub summary: HistorySummary,
    pub analysis: HistoryAnalysis,
}

/// Multi-day history for one symbol, or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolHistory {
    Available(DetailedHistory),
    Unavailable { error: String },
}

impl SymbolHistory {
    pub fn available(&self) -> Option<&DetailedHistory> {
        match self {
            SymbolHistory::Available(history) => Some(history),
            SymbolHistory::Unavailable { .. } => None,
        }
    }
}
