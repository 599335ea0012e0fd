use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Buy,
    Sell,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Buy => "BUY",
            ActionType::Sell => "SELL",
        }
    }

    /// Categorical code used in policy features (1 = BUY, 2 = SELL).
    pub fn code(&self) -> f64 {
        match self {
            ActionType::Buy => 1.0,
            ActionType::Sell => 2.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(ActionType::Buy),
            "SELL" => Some(ActionType::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ActionType;

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(ActionType::parse(" buy "), Some(ActionType::Buy));
        assert_eq!(ActionType::parse("Sell"), Some(ActionType::Sell));
        assert_eq!(ActionType::parse("HOLD"), None);
    }

    #[test]
    fn serializes_as_uppercase() {
        let json = serde_json::to_string(&ActionType::Sell).expect("serialize");
        assert_eq!(json, "\"SELL\"");
    }
}
