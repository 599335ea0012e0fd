use crate::config::{Config, GeneratorBackend};
use crate::trading_loop::LoopConfig;
use arbiter_domain::repositories::generation::GenerationOverrides;
use arbiter_domain::services::decision::{DecisionConfig, ParserConfig};
use arbiter_domain::services::policy::PpoConfig;
use chrono::NaiveDate;

pub const DEFAULT_REWARD_SCALE: f64 = 10.0;

/// Simulated-market settings with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub seed: u64,
    pub history_days: usize,
    pub base_price: f64,
    pub volatility: f64,
    pub fee_bps: f64,
    pub score_sensitivity: f64,
    pub start_date: NaiveDate,
}

pub fn resolve_market_settings(config: &Config) -> Result<MarketSettings, String> {
    let market = config.market.as_ref();
    let start_date = match market.and_then(|m| m.start_date.as_deref()) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|err| format!("market.start_date must be YYYY-MM-DD: {err}"))?,
        None => NaiveDate::from_ymd_opt(2024, 1, 2)
            .ok_or_else(|| "invalid default start date".to_string())?,
    };
    Ok(MarketSettings {
        seed: market.and_then(|m| m.seed).unwrap_or(42),
        history_days: market.and_then(|m| m.history_days).unwrap_or(10),
        base_price: market.and_then(|m| m.base_price).unwrap_or(100.0),
        volatility: market.and_then(|m| m.volatility).unwrap_or(0.02),
        fee_bps: market.and_then(|m| m.fee_bps).unwrap_or(5.0),
        score_sensitivity: market.and_then(|m| m.score_sensitivity).unwrap_or(10.0),
        start_date,
    })
}

pub fn resolve_decision_config(config: &Config) -> DecisionConfig {
    let mut resolved = DecisionConfig {
        run_id: config.run.run_id.clone(),
        ..DecisionConfig::default()
    };

    if let Some(generator) = config.generator.as_ref() {
        if let Some(temperature) = generator.temperature {
            resolved.role_config.temperature = Some(temperature);
        }
        if let Some(max_length) = generator.max_length {
            resolved.role_config.max_length = Some(max_length);
        }
    }

    let Some(section) = config.decision.as_ref() else {
        return resolved;
    };

    if let Some(cap) = section.decision_history_cap {
        resolved.decision_history_cap = cap;
    }
    if let Some(cap) = section.market_history_cap {
        resolved.market_history_cap = cap;
    }
    if let Some(cap) = section.portfolio_history_cap {
        resolved.portfolio_history_cap = cap;
    }

    let defaults = ParserConfig::default();
    resolved.parser = ParserConfig {
        buy_keywords: section.buy_keywords.clone().unwrap_or(defaults.buy_keywords),
        sell_keywords: section.sell_keywords.clone().unwrap_or(defaults.sell_keywords),
        default_amount: section.default_amount.unwrap_or(defaults.default_amount),
        score_threshold: section.score_threshold.unwrap_or(defaults.score_threshold),
        placeholder_symbol: section
            .placeholder_symbol
            .clone()
            .unwrap_or(defaults.placeholder_symbol),
    };

    let base = resolved.sampling.clone();
    resolved.sampling = GenerationOverrides {
        temperature: section.temperature.or(base.temperature),
        max_new_tokens: section.max_new_tokens.or(base.max_new_tokens),
        do_sample: section.do_sample.or(base.do_sample),
        top_p: section.top_p.or(base.top_p),
        top_k: section.top_k.or(base.top_k),
        pad_token_id: base.pad_token_id,
    };
    resolved
}

pub fn resolve_ppo_config(config: &Config) -> Result<PpoConfig, String> {
    let defaults = PpoConfig::default();
    let Some(policy) = config.policy.as_ref() else {
        return Ok(defaults);
    };

    match policy.algorithm.as_deref().map(|s| s.trim().to_lowercase()) {
        None => {}
        Some(algorithm) if algorithm == "ppo" => {}
        Some(other) => return Err(format!("policy.algorithm must be: ppo (got {other})")),
    }

    Ok(PpoConfig {
        learning_rate: policy.learning_rate.unwrap_or(defaults.learning_rate),
        gamma: policy.gamma.unwrap_or(defaults.gamma),
        gae_lambda: policy.gae_lambda.unwrap_or(defaults.gae_lambda),
        clip_ratio: policy.clip_ratio.unwrap_or(defaults.clip_ratio),
        value_loss_coef: policy.value_loss_coef.unwrap_or(defaults.value_loss_coef),
        entropy_coef: policy.entropy_coef.unwrap_or(defaults.entropy_coef),
        max_grad_norm: policy.max_grad_norm.unwrap_or(defaults.max_grad_norm),
        batch_size: policy.batch_size.unwrap_or(defaults.batch_size),
        mini_batch_size: policy.mini_batch_size.unwrap_or(defaults.mini_batch_size),
        ppo_epochs: policy.ppo_epochs.unwrap_or(defaults.ppo_epochs),
        target_kl: policy.target_kl.unwrap_or(defaults.target_kl),
    })
}

pub fn resolve_reward_scale(config: &Config) -> f64 {
    config
        .reward
        .as_ref()
        .and_then(|reward| reward.scale)
        .unwrap_or(DEFAULT_REWARD_SCALE)
}

pub fn resolve_loop_config(config: &Config) -> LoopConfig {
    let learning_rate = config
        .policy
        .as_ref()
        .and_then(|policy| policy.learning_rate)
        .unwrap_or(PpoConfig::default().learning_rate);
    LoopConfig {
        run_id: config.run.run_id.clone(),
        strategy: config.run.strategy.as_str().to_string(),
        steps: config.run.steps,
        initial_capital: config.run.initial_capital,
        reward_scale: resolve_reward_scale(config),
        learning_rate,
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{name} must be finite and > 0"));
    }
    Ok(())
}

fn require_cap(name: &str, value: Option<usize>) -> Result<(), String> {
    match value {
        Some(0) => Err(format!("{name} must be >= 1")),
        _ => Ok(()),
    }
}

/// Rejects configurations the loop cannot run with.
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.run.run_id.trim().is_empty() {
        return Err("run.run_id must not be empty".to_string());
    }
    if config.run.steps == 0 {
        return Err("run.steps must be > 0".to_string());
    }
    require_positive("run.initial_capital", config.run.initial_capital)?;
    if config.run.symbols.is_empty() {
        return Err("run.symbols must list at least one symbol".to_string());
    }
    if config.run.symbols.iter().any(|s| s.trim().is_empty()) {
        return Err("run.symbols must not contain empty symbols".to_string());
    }

    if let Some(generator) = config.generator.as_ref() {
        if let Some(temperature) = generator.temperature {
            require_positive("generator.temperature", temperature)?;
        }
        match generator.backend {
            GeneratorBackend::Remote => {
                if generator.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    return Err("generator.url is required for backend = remote".to_string());
                }
            }
            GeneratorBackend::Scripted => {
                if generator.responses.as_ref().map_or(true, Vec::is_empty) {
                    return Err(
                        "generator.responses must not be empty for backend = scripted".to_string(),
                    );
                }
            }
            GeneratorBackend::Mock => {}
        }
    }

    if let Some(decision) = config.decision.as_ref() {
        require_cap("decision.decision_history_cap", decision.decision_history_cap)?;
        require_cap("decision.market_history_cap", decision.market_history_cap)?;
        require_cap("decision.portfolio_history_cap", decision.portfolio_history_cap)?;
        if let Some(amount) = decision.default_amount {
            require_positive("decision.default_amount", amount)?;
        }
        if let Some(temperature) = decision.temperature {
            require_positive("decision.temperature", temperature)?;
        }
        if decision
            .placeholder_symbol
            .as_deref()
            .is_some_and(|symbol| symbol.trim().is_empty())
        {
            return Err("decision.placeholder_symbol must not be empty".to_string());
        }
    }

    let ppo = resolve_ppo_config(config)?;
    if ppo.batch_size == 0 || ppo.mini_batch_size == 0 || ppo.ppo_epochs == 0 {
        return Err("policy batch_size, mini_batch_size and ppo_epochs must be >= 1".to_string());
    }
    require_positive("policy.learning_rate", ppo.learning_rate)?;

    let market = resolve_market_settings(config)?;
    require_positive("market.base_price", market.base_price)?;
    if !market.volatility.is_finite() || market.volatility < 0.0 {
        return Err("market.volatility must be finite and >= 0".to_string());
    }
    if !market.fee_bps.is_finite() || market.fee_bps < 0.0 {
        return Err("market.fee_bps must be finite and >= 0".to_string());
    }

    let scale = resolve_reward_scale(config);
    if !scale.is_finite() {
        return Err("reward.scale must be finite".to_string());
    }
    Ok(())
}
