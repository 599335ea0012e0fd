use arbiter_domain::entities::market_state::MarketState;
use arbiter_domain::repositories::policy::StateFeatures;
use arbiter_domain::value_objects::trade_decision::TradeDecision;

/// Used when the snapshot has fewer than two prices.
pub const DEFAULT_VOLATILITY: f64 = 0.5;

/// Cross-sectional dispersion of closes: `min(1, 10 * mean |Δclose| / close)` over
/// consecutive symbols of the snapshot.
pub fn market_volatility(state: &MarketState) -> f64 {
    let closes: Vec<f64> = state.market_data.values().map(|bar| bar.close).collect();
    let changes: Vec<f64> = closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| ((pair[1] - pair[0]) / pair[0]).abs())
        .collect();
    if changes.is_empty() {
        return DEFAULT_VOLATILITY;
    }
    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    (mean * 10.0).min(1.0)
}

pub fn state_features(
    state: &MarketState,
    decision: &TradeDecision,
    initial_capital: f64,
) -> StateFeatures {
    let cash_ratio = if initial_capital > 0.0 {
        state.portfolio.cash / initial_capital
    } else {
        0.0
    };
    StateFeatures {
        market_volatility: market_volatility(state),
        portfolio_value: state.total_value(),
        cash_ratio,
        position_count: state.portfolio.position_count() as f64,
        decision_type: decision.action.code(),
    }
}
