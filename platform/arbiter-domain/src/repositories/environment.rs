use crate::entities::market_state::MarketState;

pub trait TradingEnvironment {
    fn snapshot(&self) -> MarketState;

    /// Executes `"ACTION SYMBOL AMOUNT"` against the portfolio, advances the market one tick
    /// and returns a score in `[0, 1]`. Unknown symbols, unparseable actions and trades that
    /// cannot be filled score `0.0`; `Err` is reserved for failures of the environment itself.
    fn score(&mut self, action: &str, context: &MarketState) -> Result<f64, String>;
}
