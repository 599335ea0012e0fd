use crate::value_objects::action_type::ActionType;
use crate::value_objects::ohlcv::Ohlcv;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of the portfolio handed to the decision engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
}

impl PortfolioSnapshot {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, symbol: impl Into<String>, quantity: f64) -> Self {
        self.positions.insert(symbol.into(), quantity);
        self
    }

    /// Cash plus marked positions. Symbols missing from `market` contribute nothing.
    pub fn total_value(&self, market: &BTreeMap<String, Ohlcv>) -> f64 {
        let marked: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, qty)| market.get(symbol).map(|bar| qty * bar.close))
            .sum();
        self.cash + marked
    }

    pub fn position_count(&self) -> usize {
        self.positions.values().filter(|qty| **qty > 0.0).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    positions: BTreeMap<String, f64>,
    cash: f64,
}

impl Portfolio {
    pub fn new_with_cash(initial_cash: f64) -> Self {
        Self {
            positions: BTreeMap::new(),
            cash: initial_cash,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    /// Applies a fill and returns the executed quantity (sells are capped at the held amount).
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: ActionType,
        quantity: f64,
        price: f64,
        fee: f64,
    ) -> f64 {
        if quantity <= 0.0 {
            return 0.0;
        }

        match side {
            ActionType::Buy => {
                self.cash -= quantity * price + fee;
                if self.cash < 0.0 && self.cash > -1e-9 {
                    self.cash = 0.0;
                }
                *self.positions.entry(symbol.to_string()).or_default() += quantity;
                quantity
            }
            ActionType::Sell => {
                let Some(held) = self.positions.get_mut(symbol) else {
                    return 0.0;
                };
                let sell_qty = quantity.min(*held);
                self.cash += sell_qty * price - fee;
                *held -= sell_qty;
                if *held <= 0.0 {
                    self.positions.remove(symbol);
                }
                sell_qty
            }
        }
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            cash: self.cash,
            positions: self.positions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Portfolio, PortfolioSnapshot};
    use crate::value_objects::action_type::ActionType;
    use crate::value_objects::ohlcv::Ohlcv;
    use std::collections::BTreeMap;

    #[test]
    fn total_value_marks_positions_present_in_snapshot() {
        let portfolio = PortfolioSnapshot::new(1000.0).with_position("X", 10.0);
        let mut market = BTreeMap::new();
        market.insert("X".to_string(), Ohlcv::flat(5.0, 1.0));
        assert!((portfolio.total_value(&market) - 1050.0).abs() < 1e-9);
    }

    #[test]
    fn total_value_ignores_symbols_missing_from_snapshot() {
        let portfolio = PortfolioSnapshot::new(1000.0).with_position("X", 10.0);
        let mut market = BTreeMap::new();
        market.insert("Y".to_string(), Ohlcv::flat(5.0, 1.0));
        assert!((portfolio.total_value(&market) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn buy_and_sell_updates_cash_and_position() {
        let mut portfolio = Portfolio::new_with_cash(1000.0);
        portfolio.apply_fill("AAPL", ActionType::Buy, 1.0, 100.0, 1.0);
        assert_eq!(portfolio.position_qty("AAPL"), 1.0);
        assert!((portfolio.cash() - 899.0).abs() < 1e-6);

        let sold = portfolio.apply_fill("AAPL", ActionType::Sell, 5.0, 110.0, 1.0);
        assert_eq!(sold, 1.0);
        assert_eq!(portfolio.position_qty("AAPL"), 0.0);
        assert!((portfolio.cash() - 1008.0).abs() < 1e-6);
        assert!(portfolio.snapshot().positions.is_empty());
    }

    #[test]
    fn selling_unheld_symbol_is_a_no_op() {
        let mut portfolio = Portfolio::new_with_cash(1000.0);
        assert_eq!(portfolio.apply_fill("MSFT", ActionType::Sell, 5.0, 10.0, 0.0), 0.0);
        assert_eq!(portfolio.cash(), 1000.0);
    }
}
