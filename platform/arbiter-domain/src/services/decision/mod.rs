pub mod engine;
pub mod history;
pub mod parser;
pub mod prompt;

pub use engine::{DecisionConfig, DecisionEngine, DecisionOutcome, TRADING_DECISION_ROLE};
pub use parser::{fallback_decision, parse_decision, score_symbols, ParsePath, ParserConfig};
pub use prompt::build_decision_prompt;
