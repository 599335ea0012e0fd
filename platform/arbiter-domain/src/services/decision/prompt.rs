use crate::entities::market_state::MarketState;
use crate::services::decision::history::{CappedBuffer, DecisionRecord, PortfolioRecord};

const RECENT_WINDOW: usize = 10;
const TREND_POINTS: usize = 5;
const REASON_PREVIEW_CHARS: usize = 50;

/// `1234567.0` -> `1,234,567`.
fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn market_section(state: &MarketState) -> String {
    state
        .market_data
        .iter()
        .map(|(symbol, bar)| {
            format!(
                "{symbol}: Price={:.2}, Open={:.2}, High={:.2}, Low={:.2}, Volume={}",
                bar.close,
                bar.open,
                bar.high,
                bar.low,
                group_thousands(bar.volume)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indicator_section(state: &MarketState) -> String {
    state
        .technical_indicators
        .iter()
        .map(|(symbol, ind)| {
            format!(
                "{symbol} Technical Indicators:\n  MA5={:.2}, MA10={:.2}, MA20={:.2}\n  RSI={:.1}, MACD={:.2}\n  Trend={}, Momentum={}\n  Bollinger Upper={:.2}, Lower={:.2}",
                ind.ma5,
                ind.ma10,
                ind.ma20,
                ind.rsi,
                ind.macd,
                ind.price_trend,
                ind.momentum,
                ind.bollinger_upper,
                ind.bollinger_lower
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn detailed_history_section(state: &MarketState) -> String {
    let mut lines = Vec::new();
    for (symbol, history) in &state.detailed_history {
        let Some(history) = history.available() else {
            continue;
        };
        let summary = &history.summary;
        let analysis = &history.analysis;

        lines.push(format!(
            "\n{symbol} Past {} Days Detailed Analysis:",
            history.daily_data.len()
        ));
        lines.push(format!("Cumulative Change: {:+.2}%", summary.total_change_pct));
        lines.push(format!(
            "Trend Direction: {} ({})",
            summary.trend_direction, summary.trend_strength
        ));
        lines.push(format!("Price Volatility: {:.2}%", summary.volatility_pct));
        lines.push(format!(
            "Volume Trend: {} (Average: {})",
            summary.volume_trend,
            group_thousands(summary.avg_volume)
        ));
        lines.push(format!(
            "Price Range: {:.2} - {:.2}",
            summary.min_low, summary.max_high
        ));
        lines.push(format!("Price Momentum: {}", analysis.price_momentum));
        lines.push(format!("Volume Support: {}", analysis.volume_support));
        lines.push(format!("Volatility Level: {}", analysis.volatility_level));
        lines.push(format!("Trend Quality: {}", analysis.trend_quality));

        lines.push("\nDaily Detailed Data:".to_string());
        lines.push("Date\tOpen\tHigh\tLow\tClose\tVolume\tChange".to_string());
        lines.push("-".repeat(60));
        for day in &history.daily_data {
            lines.push(format!(
                "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{}\t{:+.2}%",
                day.date,
                day.open,
                day.high,
                day.low,
                day.close,
                group_thousands(day.volume),
                day.change_pct
            ));
        }
    }
    lines.join("\n")
}

fn price_trend_section(state: &MarketState) -> String {
    let mut lines = Vec::new();
    for (symbol, points) in &state.price_history {
        if points.len() < TREND_POINTS {
            continue;
        }
        let recent = &points[points.len() - TREND_POINTS..];
        let changes: Vec<String> = recent
            .windows(2)
            .map(|pair| {
                let prev = pair[0].close;
                if prev > 0.0 {
                    format!("{:+.2}%", (pair[1].close - prev) / prev * 100.0)
                } else {
                    "n/a".to_string()
                }
            })
            .collect();
        lines.push(format!(
            "{symbol} last {TREND_POINTS} days price change: {}",
            changes.join(" → ")
        ));
    }
    lines.join("\n")
}

fn trade_section(state: &MarketState) -> String {
    if state.trade_history.is_empty() {
        return "No trading records".to_string();
    }
    let skip = state.trade_history.len().saturating_sub(RECENT_WINDOW);
    state.trade_history[skip..]
        .iter()
        .map(|trade| {
            format!(
                "Step {}: {} {} {} shares @ {:.2} (Score: {:.3})",
                trade.step, trade.action, trade.symbol, trade.amount, trade.price, trade.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn decision_history_section(decisions: &CappedBuffer<DecisionRecord>) -> String {
    if decisions.is_empty() {
        return String::new();
    }
    let mut lines = vec!["\n=== Recent Decision History ===".to_string()];
    for record in decisions.recent(RECENT_WINDOW) {
        let decision = &record.decision;
        let reason: String = decision.reasoning.chars().take(REASON_PREVIEW_CHARS).collect();
        lines.push(format!(
            "Step {}: {} {} {} shares - Reason: {}...",
            record.step, decision.action, decision.symbol, decision.amount, reason
        ));
    }
    lines.join("\n")
}

fn portfolio_history_section(portfolios: &CappedBuffer<PortfolioRecord>) -> String {
    if portfolios.is_empty() {
        return String::new();
    }
    let mut lines = vec!["\n=== Portfolio Change History ===".to_string()];
    let mut prev: Option<f64> = None;
    for record in portfolios.recent(RECENT_WINDOW) {
        let mut line = format!(
            "Step {}: Total Value {:.2}",
            record.step, record.total_value
        );
        if let Some(prev_value) = prev.filter(|value| *value > 0.0) {
            let change = (record.total_value - prev_value) / prev_value * 100.0;
            line.push_str(&format!(" (Change: {change:+.2}%)"));
        }
        prev = Some(record.total_value);
        lines.push(line);
    }
    lines.join("\n")
}

fn positions_section(state: &MarketState) -> String {
    if state.portfolio.positions.is_empty() {
        return "None".to_string();
    }
    state
        .portfolio
        .positions
        .iter()
        .map(|(symbol, qty)| format!("{symbol}: {qty} shares"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the decision prompt. Section order and the output grammar at the end are
/// relied on by the response parser.
pub fn build_decision_prompt(
    state: &MarketState,
    decisions: &CappedBuffer<DecisionRecord>,
    portfolios: &CappedBuffer<PortfolioRecord>,
) -> String {
    format!(
        r#"You are a professional trading decision expert. This is a SIMULATION GAME for testing purposes - NOT real stock trading. Please do not be cautious or conservative. You MUST provide SPECIFIC BUY or SELL actions with exact quantities.

This is a numerical simulation game where the goal is to make optimal trading decisions based on the data. Do not worry about real-world risks or consequences.

Please make trading decisions based on the following detailed market information:

=== Current Market Data ===
{market}

=== Technical Indicators Analysis ===
{indicators}

=== Past 10 Days Detailed Market Analysis ===
{detailed}

=== Price History Trends ===
{trends}

=== Recent Trading Records ===
{trades}

{decision_history}

{portfolio_history}

=== Current Portfolio ===
Cash: {cash:.2}
Positions: {positions}

=== Decision Guidelines ===
Please analyze based on the following factors:
1. Price trends: 10-day cumulative change, trend strength, price momentum
2. Technical indicators: RSI overbought/oversold, MACD signals, MA5 vs MA20 relationship
3. Bollinger Bands: whether price is near support/resistance levels
4. Volume analysis: volume trends, volume support
5. Volatility analysis: price range, volatility level
6. Historical performance: recent trading success rate, decision history performance
7. Portfolio changes: total value change trends
8. Risk control: current positions and cash status

CRITICAL: This is a simulation game! You MUST provide a SPECIFIC action with exact quantities. NO cautious strategies, NO holding, NO vague responses!

Please choose one of the following and provide EXACT quantities:
1. Buy stocks: write "BUY [symbol] [exact_amount] shares"
2. Sell stocks: write "SELL [symbol] [exact_amount] shares"

Examples: BUY AAPL 150 shares, SELL GOOGL 75 shares

Please provide your decision with exact quantities and briefly explain your reasoning:"#,
        market = market_section(state),
        indicators = indicator_section(state),
        detailed = detailed_history_section(state),
        trends = price_trend_section(state),
        trades = trade_section(state),
        decision_history = decision_history_section(decisions),
        portfolio_history = portfolio_history_section(portfolios),
        cash = state.portfolio.cash,
        positions = positions_section(state),
    )
}
