use crate::entities::history::{
    DailyBar, DetailedHistory, HistoryAnalysis, HistorySummary, SymbolHistory,
};
use crate::entities::indicators::TechnicalIndicators;
use crate::value_objects::ohlcv::Ohlcv;
use chrono::NaiveDate;

pub const RSI_WINDOW: usize = 14;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;

pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let slice = &closes[closes.len() - window..];
    Some(slice.iter().sum::<f64>() / window as f64)
}

/// Exponential average seeded with the first value.
pub fn ema(closes: &[f64], span: usize) -> Option<f64> {
    if span == 0 {
        return None;
    }
    let (first, rest) = closes.split_first()?;
    let alpha = 2.0 / (span as f64 + 1.0);
    Some(
        rest.iter()
            .fold(*first, |acc, close| alpha * close + (1.0 - alpha) * acc),
    )
}

pub fn std_dev(closes: &[f64], window: usize) -> Option<f64> {
    let mean = sma(closes, window)?;
    let slice = &closes[closes.len() - window..];
    let var = slice.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / window as f64;
    Some(var.max(0.0).sqrt())
}

/// Simple gain/loss RSI over the last `window` differences; 50 on a flat window.
pub fn rsi(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window + 1 {
        return None;
    }
    let tail = &closes[closes.len() - window - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in tail.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    if gains + losses == 0.0 {
        return Some(50.0);
    }

    let rs = gains / losses.max(1e-9);
    Some(100.0 - (100.0 / (1.0 + rs)))
}

pub fn macd(closes: &[f64]) -> Option<f64> {
    Some(ema(closes, 12)? - ema(closes, 26)?)
}

/// `(upper, lower)` = MA20 ± 2σ.
pub fn bollinger(closes: &[f64]) -> Option<(f64, f64)> {
    let mid = sma(closes, BOLLINGER_WINDOW)?;
    let sigma = std_dev(closes, BOLLINGER_WINDOW)?;
    Some((mid + BOLLINGER_WIDTH * sigma, mid - BOLLINGER_WIDTH * sigma))
}

pub fn price_trend(ma5: f64, ma20: f64) -> &'static str {
    if ma20 <= 0.0 {
        return "sideways";
    }
    let spread = (ma5 - ma20) / ma20;
    if spread > 0.005 {
        "up"
    } else if spread < -0.005 {
        "down"
    } else {
        "sideways"
    }
}

/// Labels the 5-step return.
pub fn momentum(closes: &[f64]) -> &'static str {
    if closes.len() < 6 {
        return "weak";
    }
    let base = closes[closes.len() - 6];
    let last = closes[closes.len() - 1];
    if base <= 0.0 {
        return "weak";
    }
    let ret = (last / base - 1.0).abs();
    if ret >= 0.05 {
        "strong"
    } else if ret >= 0.02 {
        "moderate"
    } else {
        "weak"
    }
}

/// Indicator block for one symbol. Windows longer than the series fall back to the last close.
pub fn compute_indicators(closes: &[f64]) -> TechnicalIndicators {
    let last = closes.last().copied().unwrap_or(0.0);
    let ma5 = sma(closes, 5).unwrap_or(last);
    let ma10 = sma(closes, 10).unwrap_or(last);
    let ma20 = sma(closes, 20).unwrap_or(last);
    let (bollinger_upper, bollinger_lower) = bollinger(closes).unwrap_or((last, last));

    TechnicalIndicators {
        ma5,
        ma10,
        ma20,
        rsi: rsi(closes, RSI_WINDOW).unwrap_or(50.0),
        macd: macd(closes).unwrap_or(0.0),
        bollinger_upper,
        bollinger_lower,
        price_trend: price_trend(ma5, ma20).to_string(),
        momentum: momentum(closes).to_string(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Summarizes the last `days` bars. Needs at least two bars in the window.
pub fn detailed_history(bars: &[(NaiveDate, Ohlcv)], days: usize) -> SymbolHistory {
    let start = bars.len().saturating_sub(days);
    if bars.len() - start < 2 {
        return SymbolHistory::Unavailable {
            error: format!(
                "insufficient history: need at least 2 bars, got {}",
                bars.len() - start
            ),
        };
    }

    let daily_data: Vec<DailyBar> = bars[start..]
        .iter()
        .enumerate()
        .map(|(offset, (date, bar))| {
            let index = start + offset;
            let change_pct = match index.checked_sub(1).map(|prev| bars[prev].1.close) {
                Some(prev) if prev > 0.0 => (bar.close - prev) / prev * 100.0,
                _ => 0.0,
            };
            DailyBar {
                date: *date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                change_pct,
            }
        })
        .collect();

    let (Some(first), Some(last)) = (daily_data.first(), daily_data.last()) else {
        return SymbolHistory::Unavailable {
            error: "empty history window".to_string(),
        };
    };

    let total_change_pct = if first.close > 0.0 {
        (last.close - first.close) / first.close * 100.0
    } else {
        0.0
    };
    let trend_direction = if total_change_pct > 1.0 {
        "up"
    } else if total_change_pct < -1.0 {
        "down"
    } else {
        "sideways"
    };
    let trend_strength = match total_change_pct.abs() {
        v if v > 5.0 => "strong",
        v if v > 2.0 => "moderate",
        _ => "weak",
    };

    let changes: Vec<f64> = daily_data.iter().map(|d| d.change_pct).collect();
    let change_mean = mean(changes.iter().copied());
    let volatility_pct = mean(changes.iter().map(|c| (c - change_mean).powi(2))).sqrt();

    let half = daily_data.len() / 2;
    let early_volume = mean(daily_data[..half].iter().map(|d| d.volume));
    let late_volume = mean(daily_data[half..].iter().map(|d| d.volume));
    let volume_trend = if early_volume > 0.0 {
        match late_volume / early_volume - 1.0 {
            r if r > 0.1 => "increasing",
            r if r < -0.1 => "decreasing",
            _ => "stable",
        }
    } else {
        "stable"
    };

    let avg_volume = mean(daily_data.iter().map(|d| d.volume));
    let min_low = daily_data.iter().map(|d| d.low).fold(f64::INFINITY, f64::min);
    let max_high = daily_data
        .iter()
        .map(|d| d.high)
        .fold(f64::NEG_INFINITY, f64::max);

    let recent_change: f64 = changes.iter().rev().take(3).sum();
    let price_momentum = if recent_change > 1.0 {
        "accelerating"
    } else if recent_change < -1.0 {
        "decelerating"
    } else {
        "stable"
    };

    let volume_support = match (trend_direction, volume_trend) {
        ("up" | "down", "increasing") => "confirmed",
        (_, "decreasing") => "weak",
        _ => "neutral",
    };

    let volatility_level = match volatility_pct {
        v if v > 3.0 => "high",
        v if v > 1.5 => "medium",
        _ => "low",
    };

    let trend_quality = if trend_direction == "sideways" {
        "range-bound"
    } else {
        let sign = if trend_direction == "up" { 1.0 } else { -1.0 };
        let aligned = changes.iter().filter(|c| **c * sign > 0.0).count();
        match aligned as f64 / changes.len() as f64 {
            r if r >= 0.7 => "consistent",
            r if r >= 0.5 => "mixed",
            _ => "choppy",
        }
    };

    let summary = HistorySummary {
        total_change_pct,
        trend_direction: trend_direction.to_string(),
        trend_strength: trend_strength.to_string(),
        volatility_pct,
        volume_trend: volume_trend.to_string(),
        avg_volume,
        min_low,
        max_high,
    };
    let analysis = HistoryAnalysis {
        price_momentum: price_momentum.to_string(),
        volume_support: volume_support.to_string(),
        volatility_level: volatility_level.to_string(),
        trend_quality: trend_quality.to_string(),
    };

    SymbolHistory::Available(DetailedHistory {
        daily_data,
        summary,
        analysis,
    })
}
