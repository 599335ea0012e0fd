use crate::value_objects::action_type::ActionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub action: ActionType,
    pub symbol: String,
    pub amount: f64,
    pub reasoning: String,
}

impl TradeDecision {
    pub fn new(
        action: ActionType,
        symbol: impl Into<String>,
        amount: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            action,
            symbol: symbol.into(),
            amount,
            reasoning: reasoning.into(),
        }
    }

    pub fn buy(symbol: impl Into<String>, amount: f64, reasoning: impl Into<String>) -> Self {
        Self::new(ActionType::Buy, symbol, amount, reasoning)
    }

    pub fn sell(symbol: impl Into<String>, amount: f64, reasoning: impl Into<String>) -> Self {
        Self::new(ActionType::Sell, symbol, amount, reasoning)
    }

    /// `"ACTION SYMBOL AMOUNT"`, the form the environment executes.
    pub fn descriptor(&self) -> String {
        format!("{} {} {}", self.action, self.symbol, self.amount)
    }
}
