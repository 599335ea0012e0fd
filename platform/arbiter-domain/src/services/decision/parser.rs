use crate::entities::indicators::TechnicalIndicators;
use crate::entities::market_state::MarketState;
use crate::value_objects::action_type::ActionType;
use crate::value_objects::trade_decision::TradeDecision;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub buy_keywords: Vec<String>,
    pub sell_keywords: Vec<String>,
    pub default_amount: f64,
    pub score_threshold: f64,
    pub placeholder_symbol: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            buy_keywords: vec!["买入".to_string()],
            sell_keywords: vec!["卖出".to_string()],
            default_amount: 100.0,
            score_threshold: 0.3,
            placeholder_symbol: "AAPL".to_string(),
        }
    }
}

/// Which step of the cascade produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePath {
    BuyIntent,
    SellIntent,
    IndicatorScore,
    Momentum,
    FirstSymbol,
    Placeholder,
}

impl ParsePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsePath::BuyIntent => "buy_intent",
            ParsePath::SellIntent => "sell_intent",
            ParsePath::IndicatorScore => "indicator_score",
            ParsePath::Momentum => "momentum",
            ParsePath::FirstSymbol => "first_symbol",
            ParsePath::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolScore {
    pub symbol: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalScores {
    pub best_buy: SymbolScore,
    pub best_sell: SymbolScore,
}

/// First `\d+(\.\d+)?` run in `text`.
fn first_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    text[start..end].parse().ok()
}

fn is_tradable(symbol: &str) -> bool {
    !symbol.trim().is_empty()
}

fn parse_amount(text: &str, config: &ParserConfig) -> f64 {
    match first_number(text) {
        Some(amount) if amount > 0.0 && amount.is_finite() => amount,
        _ => config.default_amount,
    }
}

fn intent_decision(
    text: &str,
    upper: &str,
    state: &MarketState,
    keywords: &[String],
    token: &str,
    action: ActionType,
    config: &ParserConfig,
) -> Option<TradeDecision> {
    let has_intent = keywords.iter().any(|kw| !kw.is_empty() && text.contains(kw.as_str()))
        || upper.contains(token);
    if !has_intent {
        return None;
    }
    let symbol = state
        .symbols
        .iter()
        .filter(|symbol| is_tradable(symbol))
        .find(|symbol| upper.contains(&symbol.to_uppercase()))?;
    let amount = parse_amount(text, config);
    Some(TradeDecision::new(action, symbol.clone(), amount, text.trim()))
}

fn signal_scores(ind: &TechnicalIndicators) -> (f64, f64) {
    let (rsi, ma5, ma20) = (ind.rsi, ind.ma5, ind.ma20);
    let mut buy = 0.0;
    let mut sell = 0.0;

    if rsi < 70.0 {
        buy += 0.3;
    }
    if rsi > 30.0 {
        sell += 0.3;
    }
    if ma5 > ma20 {
        buy += 0.4;
    }
    if ma5 < ma20 {
        sell += 0.4;
    }
    // The gap term is capped but not floored: a gap against the signal lowers it.
    if ma5 > 0.0 && ma20 > 0.0 {
        let spread = (ma5 - ma20) / ma20;
        buy += (spread * 10.0).min(0.3);
        sell += (-spread * 10.0).min(0.3);
    }
    (buy, sell)
}

/// Scores every candidate symbol present in the snapshot. Blank symbols are skipped.
/// Missing indicators default to `rsi = 50` and zero moving averages; ties keep the
/// earliest symbol.
pub fn score_symbols<'a, I>(state: &MarketState, symbols: I) -> Option<SignalScores>
where
    I: IntoIterator<Item = &'a str>,
{
    let defaults = TechnicalIndicators {
        rsi: 50.0,
        ..TechnicalIndicators::default()
    };
    let mut best: Option<SignalScores> = None;

    for symbol in symbols {
        if !is_tradable(symbol) || !state.market_data.contains_key(symbol) {
            continue;
        }
        let ind = state.technical_indicators.get(symbol).unwrap_or(&defaults);
        let (buy, sell) = signal_scores(ind);

        match best.as_mut() {
            None => {
                best = Some(SignalScores {
                    best_buy: SymbolScore {
                        symbol: symbol.to_string(),
                        score: buy,
                    },
                    best_sell: SymbolScore {
                        symbol: symbol.to_string(),
                        score: sell,
                    },
                });
            }
            Some(scores) => {
                if buy > scores.best_buy.score {
                    scores.best_buy = SymbolScore {
                        symbol: symbol.to_string(),
                        score: buy,
                    };
                }
                if sell > scores.best_sell.score {
                    scores.best_sell = SymbolScore {
                        symbol: symbol.to_string(),
                        score: sell,
                    };
                }
            }
        }
    }
    best
}

fn decide_by_scores(
    state: &MarketState,
    scores: &SignalScores,
    config: &ParserConfig,
) -> Option<TradeDecision> {
    let describe = |symbol: &str| {
        state
            .technical_indicators
            .get(symbol)
            .map(|ind| format!("RSI: {:.1}, trend: {}", ind.rsi, ind.price_trend))
            .unwrap_or_else(|| "no indicators".to_string())
    };

    let buy = &scores.best_buy;
    let sell = &scores.best_sell;
    if buy.score > sell.score && buy.score > config.score_threshold {
        return Some(TradeDecision::buy(
            buy.symbol.clone(),
            config.default_amount,
            format!(
                "Technical analysis: {} shows a buy signal ({})",
                buy.symbol,
                describe(&buy.symbol)
            ),
        ));
    }
    if sell.score > config.score_threshold {
        return Some(TradeDecision::sell(
            sell.symbol.clone(),
            config.default_amount,
            format!(
                "Technical analysis: {} shows a sell signal ({})",
                sell.symbol,
                describe(&sell.symbol)
            ),
        ));
    }
    None
}

fn momentum_decision(state: &MarketState, config: &ParserConfig) -> Option<TradeDecision> {
    let mut best: Option<(&String, f64)> = None;
    for (symbol, bar) in state.market_data.iter().filter(|(s, _)| is_tradable(s)) {
        let body = bar.body();
        if best.map_or(true, |(_, current)| body > current) {
            best = Some((symbol, body));
        }
    }
    let (symbol, body) = best?;
    Some(TradeDecision::buy(
        symbol.clone(),
        config.default_amount,
        format!("Strongest intraday momentum: {symbol} moved {body:+.2}"),
    ))
}

fn first_symbol_decision(state: &MarketState, config: &ParserConfig) -> Option<TradeDecision> {
    let symbol = state.symbols.iter().find(|symbol| is_tradable(symbol))?;
    Some(TradeDecision::buy(
        symbol.clone(),
        config.default_amount,
        "No usable signal; defaulting to the first configured symbol",
    ))
}

fn placeholder_decision(config: &ParserConfig) -> TradeDecision {
    tracing::warn!(
        placeholder = %config.placeholder_symbol,
        "no tradable symbols and no market data; emitting placeholder decision"
    );
    TradeDecision::buy(
        config.placeholder_symbol.clone(),
        config.default_amount,
        "No symbols configured; placeholder decision",
    )
}

/// Maps free-form model output to a decision. Always succeeds; the first matching step wins.
pub fn parse_decision(
    text: &str,
    state: &MarketState,
    config: &ParserConfig,
) -> (TradeDecision, ParsePath) {
    let upper = text.to_uppercase();

    if let Some(decision) = intent_decision(
        text,
        &upper,
        state,
        &config.buy_keywords,
        "BUY",
        ActionType::Buy,
        config,
    ) {
        return (decision, ParsePath::BuyIntent);
    }
    if let Some(decision) = intent_decision(
        text,
        &upper,
        state,
        &config.sell_keywords,
        "SELL",
        ActionType::Sell,
        config,
    ) {
        return (decision, ParsePath::SellIntent);
    }

    let scored = score_symbols(state, state.symbols.iter().map(String::as_str))
        .and_then(|scores| decide_by_scores(state, &scores, config));
    if let Some(decision) = scored {
        return (decision, ParsePath::IndicatorScore);
    }
    if let Some(decision) = momentum_decision(state, config) {
        return (decision, ParsePath::Momentum);
    }
    if let Some(decision) = first_symbol_decision(state, config) {
        return (decision, ParsePath::FirstSymbol);
    }
    (placeholder_decision(config), ParsePath::Placeholder)
}

/// Decision used when generation fails, built from the snapshot alone.
pub fn fallback_decision(state: &MarketState, config: &ParserConfig) -> (TradeDecision, ParsePath) {
    if state.market_data.is_empty() {
        return match first_symbol_decision(state, config) {
            Some(decision) => (decision, ParsePath::FirstSymbol),
            None => (placeholder_decision(config), ParsePath::Placeholder),
        };
    }

    let scored = score_symbols(state, state.market_data.keys().map(String::as_str))
        .and_then(|scores| decide_by_scores(state, &scores, config));
    if let Some(decision) = scored {
        return (decision, ParsePath::IndicatorScore);
    }
    match momentum_decision(state, config) {
        Some(decision) => (decision, ParsePath::Momentum),
        None => (placeholder_decision(config), ParsePath::Placeholder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ohlcv::Ohlcv;

    fn bar(open: f64, close: f64) -> Ohlcv {
        Ohlcv {
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000.0,
        }
    }

    fn state(symbols: &[&str]) -> MarketState {
        let mut state = MarketState {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..MarketState::default()
        };
        for symbol in symbols {
            state.market_data.insert(symbol.to_string(), bar(100.0, 100.0));
        }
        state
    }

    fn indicators(rsi: f64, ma5: f64, ma20: f64) -> TechnicalIndicators {
        TechnicalIndicators {
            rsi,
            ma5,
            ma20,
            ..TechnicalIndicators::default()
        }
    }

    #[test]
    fn first_number_matches_integer_and_decimal() {
        assert_eq!(first_number("buy 150 shares"), Some(150.0));
        assert_eq!(first_number("x 12.5y"), Some(12.5));
        assert_eq!(first_number("7. then"), Some(7.0));
        assert_eq!(first_number("none"), None);
    }

    #[test]
    fn buy_intent_beats_later_sell_mention() {
        let st = state(&["AAPL", "MSFT"]);
        let (decision, path) = parse_decision(
            "I would BUY MSFT 150 shares, then maybe sell AAPL later",
            &st,
            &ParserConfig::default(),
        );
        assert_eq!(path, ParsePath::BuyIntent);
        assert_eq!(decision.action, ActionType::Buy);
        // universe order wins, not position in the text
        assert_eq!(decision.symbol, "AAPL");
        assert_eq!(decision.amount, 150.0);
    }

    #[test]
    fn configured_keyword_triggers_intent() {
        let st = state(&["GOOGL"]);
        let (decision, path) = parse_decision("建议卖出 googl 20 股", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::SellIntent);
        assert_eq!(decision.action, ActionType::Sell);
        assert_eq!(decision.symbol, "GOOGL");
        assert_eq!(decision.amount, 20.0);
    }

    #[test]
    fn zero_amount_is_replaced_by_default() {
        let st = state(&["AAPL"]);
        let (decision, _) = parse_decision("BUY AAPL 0 shares", &st, &ParserConfig::default());
        assert_eq!(decision.amount, 100.0);
    }

    #[test]
    fn scoring_picks_strongest_uptrend() {
        let mut st = state(&["AAPL", "MSFT"]);
        st.technical_indicators
            .insert("AAPL".into(), indicators(50.0, 100.0, 100.0));
        st.technical_indicators
            .insert("MSFT".into(), indicators(55.0, 105.0, 100.0));

        let (decision, path) = parse_decision("no idea", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::IndicatorScore);
        assert_eq!(decision.action, ActionType::Buy);
        assert_eq!(decision.symbol, "MSFT");
        assert_eq!(decision.amount, 100.0);
    }

    #[test]
    fn scoring_emits_sell_on_downtrend() {
        let mut st = state(&["AAPL"]);
        st.technical_indicators
            .insert("AAPL".into(), indicators(75.0, 90.0, 100.0));
        let (decision, path) = parse_decision("", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::IndicatorScore);
        assert_eq!(decision.action, ActionType::Sell);
    }

    #[test]
    fn scoring_is_deterministic_and_first_wins_ties() {
        let mut st = state(&["AAPL", "MSFT"]);
        for sym in ["AAPL", "MSFT"] {
            st.technical_indicators
                .insert(sym.into(), indicators(50.0, 101.0, 100.0));
        }
        let a = score_symbols(&st, ["AAPL", "MSFT"]).expect("scores");
        let b = score_symbols(&st, ["AAPL", "MSFT"]).expect("scores");
        assert_eq!(a, b);
        assert_eq!(a.best_buy.symbol, "AAPL");
    }

    #[test]
    fn momentum_used_when_scores_tie_at_threshold() {
        let mut st = state(&["AAPL", "MSFT"]);
        st.market_data.insert("MSFT".into(), bar(100.0, 104.0));
        let (decision, path) = parse_decision("nothing actionable", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::Momentum);
        assert_eq!(decision.symbol, "MSFT");
    }

    #[test]
    fn first_symbol_then_placeholder_without_market_data() {
        let st = MarketState {
            symbols: vec!["TSLA".into()],
            ..MarketState::default()
        };
        let (decision, path) = parse_decision("", &st, &ParserConfig::default());
        assert_eq!((decision.symbol.as_str(), path), ("TSLA", ParsePath::FirstSymbol));

        let (decision, path) = parse_decision("", &MarketState::default(), &ParserConfig::default());
        assert_eq!(path, ParsePath::Placeholder);
        assert_eq!(decision.symbol, "AAPL");
        assert_eq!(decision.action, ActionType::Buy);
    }

    #[test]
    fn intent_reasoning_is_the_trimmed_response() {
        let st = state(&["AAPL"]);
        let (decision, path) = parse_decision(
            "\n BUY AAPL 10 shares because MA5 crossed above MA20 \n",
            &st,
            &ParserConfig::default(),
        );
        assert_eq!(path, ParsePath::BuyIntent);
        assert_eq!(
            decision.reasoning,
            "BUY AAPL 10 shares because MA5 crossed above MA20"
        );
    }

    #[test]
    fn blank_symbols_never_match_intent() {
        let st = state(&["", "AAPL"]);
        let (decision, path) =
            parse_decision("BUY AAPL 10 shares", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::BuyIntent);
        assert_eq!(decision.symbol, "AAPL");
        assert_eq!(decision.amount, 10.0);

        let st = state(&[" ", ""]);
        let (decision, path) = parse_decision("BUY 10 shares", &st, &ParserConfig::default());
        assert_eq!(path, ParsePath::Placeholder);
        assert_eq!(decision.symbol, "AAPL");
    }

    #[test]
    fn blank_symbols_fall_through_to_placeholder() {
        let st = MarketState {
            symbols: vec!["".into(), "  ".into()],
            ..MarketState::default()
        };
        let config = ParserConfig {
            placeholder_symbol: "SPY".into(),
            ..ParserConfig::default()
        };
        let (decision, path) = fallback_decision(&st, &config);
        assert_eq!((decision.symbol.as_str(), path), ("SPY", ParsePath::Placeholder));

        let st = MarketState {
            symbols: vec!["".into(), "TSLA".into()],
            ..MarketState::default()
        };
        let (decision, path) = fallback_decision(&st, &config);
        assert_eq!((decision.symbol.as_str(), path), ("TSLA", ParsePath::FirstSymbol));
    }

    #[test]
    fn opposing_ma_gap_lowers_the_score() {
        let mut st = state(&["AAPL"]);
        st.technical_indicators
            .insert("AAPL".into(), indicators(50.0, 105.0, 100.0));
        let scores = score_symbols(&st, ["AAPL"]).expect("scores");
        assert!((scores.best_buy.score - 1.0).abs() < 1e-9);
        // gap of +5% counts -0.5 against the sell side
        assert!((scores.best_sell.score - (-0.2)).abs() < 1e-9);
    }

    #[test]
    fn fallback_buys_momentum_leader_without_indicators() {
        let mut st = MarketState::default();
        st.market_data.insert("AAPL".into(), bar(100.0, 105.0));
        let (decision, path) = fallback_decision(&st, &ParserConfig::default());
        assert_eq!(path, ParsePath::Momentum);
        assert_eq!(decision.descriptor(), "BUY AAPL 100");
    }
}
