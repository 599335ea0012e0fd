use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration used when no file is given.
pub const DEFAULT_CONFIG_TOML: &str = r#"[run]
run_id = "arbiter_demo"
strategy = "simulated"
steps = 5
initial_capital = 100000.0
symbols = ["AAPL", "GOOGL", "MSFT", "AMZN"]

[generator]
backend = "mock"
"#;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Simulated,
}

impl StrategyKind {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "simulated" => Ok(StrategyKind::Simulated),
            other => Err(format!("unknown strategy: {other} (expected: simulated)")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Simulated => "simulated",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Mock,
    Scripted,
    Remote,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub generator: Option<GeneratorConfig>,
    pub market: Option<MarketConfig>,
    pub decision: Option<DecisionSection>,
    pub policy: Option<PolicyConfig>,
    pub reward: Option<RewardConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub strategy: StrategyKind,
    pub steps: u64,
    pub initial_capital: f64,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub model: Option<String>,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
    pub temperature: Option<f64>,
    pub max_length: Option<u32>,
    pub responses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    pub seed: Option<u64>,
    pub history_days: Option<usize>,
    pub base_price: Option<f64>,
    pub volatility: Option<f64>,
    pub fee_bps: Option<f64>,
    pub score_sensitivity: Option<f64>,
    pub start_date: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DecisionSection {
    pub decision_history_cap: Option<usize>,
    pub market_history_cap: Option<usize>,
    pub portfolio_history_cap: Option<usize>,
    pub default_amount: Option<f64>,
    pub score_threshold: Option<f64>,
    pub buy_keywords: Option<Vec<String>>,
    pub sell_keywords: Option<Vec<String>>,
    pub placeholder_symbol: Option<String>,
    pub temperature: Option<f64>,
    pub max_new_tokens: Option<u32>,
    pub do_sample: Option<bool>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub algorithm: Option<String>,
    pub learning_rate: Option<f64>,
    pub gamma: Option<f64>,
    pub gae_lambda: Option<f64>,
    pub clip_ratio: Option<f64>,
    pub value_loss_coef: Option<f64>,
    pub entropy_coef: Option<f64>,
    pub max_grad_norm: Option<f64>,
    pub batch_size: Option<usize>,
    pub mini_batch_size: Option<usize>,
    pub ppo_epochs: Option<usize>,
    pub target_kl: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RewardConfig {
    pub scale: Option<f64>,
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn default_config_with_source() -> Result<(Config, String), String> {
    let config = toml::from_str(DEFAULT_CONFIG_TOML)
        .map_err(|err| format!("failed to parse built-in config: {err}"))?;
    Ok((config, DEFAULT_CONFIG_TOML.to_string()))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{default_config_with_source, Config, GeneratorBackend, StrategyKind};

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[run\nrun_id = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_minimal_config() {
        let config = parse_config(
            r#"
[run]
run_id = "demo"
strategy = "simulated"
steps = 3
initial_capital = 1000.0
symbols = ["AAPL"]
"#,
        );
        assert_eq!(config.run.strategy, StrategyKind::Simulated);
        assert_eq!(config.run.steps, 3);
        assert!(config.generator.is_none());
        assert!(config.market.is_none());
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let toml_str = r#"
[run]
run_id = "demo"
strategy = "simulated"
steps = 3
initial_capital = 1000.0
symbols = ["AAPL"]

[generator]
backend = "mock"
unknown_field = 123
"#;
        let err = toml::from_str::<Config>(toml_str).expect_err("unknown field should fail");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"
[run]
run_id = "full"
strategy = "simulated"
steps = 10
initial_capital = 50000.0
symbols = ["AAPL", "MSFT"]

[generator]
backend = "scripted"
responses = ["BUY AAPL 10 shares", "SELL MSFT 5 shares"]

[market]
seed = 7
history_days = 10
fee_bps = 5.0
start_date = "2024-01-02"

[decision]
decision_history_cap = 20
buy_keywords = ["acheter"]
top_k = 40

[policy]
algorithm = "ppo"
batch_size = 4
mini_batch_size = 2

[reward]
scale = 5.0
"#,
        );
        let generator = config.generator.expect("generator section");
        assert_eq!(generator.backend, GeneratorBackend::Scripted);
        assert_eq!(generator.responses.map(|r| r.len()), Some(2));
        assert_eq!(config.market.and_then(|m| m.seed), Some(7));
        assert_eq!(config.policy.and_then(|p| p.batch_size), Some(4));
    }

    #[test]
    fn built_in_defaults_parse() {
        let (config, source) = default_config_with_source().expect("defaults parse");
        assert_eq!(config.run.symbols.len(), 4);
        assert!(source.contains("[generator]"));
    }

    #[test]
    fn strategy_kind_parse_rejects_unknown() {
        assert_eq!(StrategyKind::parse(" Simulated ").ok(), Some(StrategyKind::Simulated));
        assert!(StrategyKind::parse("live").is_err());
    }
}
