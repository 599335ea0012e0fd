use arbiter_application::config::{
    default_config_with_source, load_config_with_source, Config, GeneratorBackend,
};
use arbiter_application::meta::engine_name;
use arbiter_application::shared::{
    resolve_decision_config, resolve_market_settings, resolve_ppo_config, resolve_reward_scale,
};
use arbiter_domain::services::policy::PpoTrainer;
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "ARBITER_CONFIG";

pub(super) struct LoadedConfig {
    pub config: Config,
    pub source: String,
    pub origin: String,
}

/// `--config`, then `ARBITER_CONFIG`, then the built-in defaults.
pub(super) fn load_run_config(path: Option<PathBuf>) -> Result<LoadedConfig, String> {
    let path = path.or_else(|| {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });
    match path {
        Some(path) => {
            let (config, source) = load_config_with_source(&path)?;
            Ok(LoadedConfig {
                config,
                source,
                origin: path.display().to_string(),
            })
        }
        None => {
            let (config, source) = default_config_with_source()?;
            Ok(LoadedConfig {
                config,
                source,
                origin: "built-in defaults".to_string(),
            })
        }
    }
}

pub(super) fn print_config_summary(
    command: &str,
    loaded: &LoadedConfig,
    out: Option<&PathBuf>,
) -> Result<(), String> {
    let config = &loaded.config;
    println!(
        "{} cli: {} (run_id={}, strategy={}, steps={}, initial_capital={})",
        engine_name(),
        command,
        config.run.run_id,
        config.run.strategy.as_str(),
        config.run.steps,
        config.run.initial_capital
    );
    println!(
        "config: source={}, symbols={}",
        loaded.origin,
        config.run.symbols.join(",")
    );

    match config.generator.as_ref() {
        Some(generator) => println!(
            "generator: backend={}, model={}, url={}, timeout_ms={}",
            format!("{:?}", generator.backend).to_lowercase(),
            generator.model.as_deref().unwrap_or("default"),
            generator.url.as_deref().unwrap_or("none"),
            generator
                .timeout_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "default".to_string())
        ),
        None => println!(
            "generator: backend={}",
            format!("{:?}", GeneratorBackend::Mock).to_lowercase()
        ),
    }

    let market = resolve_market_settings(config)?;
    println!(
        "market: seed={}, history_days={}, base_price={}, volatility={}, fee_bps={}, score_sensitivity={}, start_date={}",
        market.seed,
        market.history_days,
        market.base_price,
        market.volatility,
        market.fee_bps,
        market.score_sensitivity,
        market.start_date
    );

    let decision = resolve_decision_config(config);
    println!(
        "decision: role={}, history_caps={}/{}/{}, default_amount={}, score_threshold={}, max_new_tokens={}",
        decision.role,
        decision.decision_history_cap,
        decision.market_history_cap,
        decision.portfolio_history_cap,
        decision.parser.default_amount,
        decision.parser.score_threshold,
        decision
            .sampling
            .max_new_tokens
            .map(|n| n.to_string())
            .unwrap_or_else(|| "default".to_string())
    );

    let ppo = resolve_ppo_config(config)?;
    println!(
        "policy: algorithm={}, learning_rate={}, batch_size={}, mini_batch_size={}, ppo_epochs={}, reward_scale={}",
        PpoTrainer::ALGORITHM,
        ppo.learning_rate,
        ppo.batch_size,
        ppo.mini_batch_size,
        ppo.ppo_epochs,
        resolve_reward_scale(config)
    );

    if let Some(out_dir) = out {
        println!("output dir: {}", out_dir.display());
    }
    Ok(())
}
