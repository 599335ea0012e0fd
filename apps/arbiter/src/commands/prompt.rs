use super::common::LoadedConfig;
use arbiter_application::shared::{resolve_decision_config, validate_config};
use arbiter_domain::repositories::environment::TradingEnvironment;
use arbiter_domain::services::decision::DecisionEngine;
use arbiter_domain::services::generation::GenerationHub;
use arbiter_infrastructure::generation::MockGenerator;
use std::path::PathBuf;

pub(super) fn run_prompt(config_path: Option<PathBuf>) -> Result<(), String> {
    let loaded = super::common::load_run_config(config_path)?;
    println!("{}", render_prompt(&loaded)?);
    Ok(())
}

/// Renders the prompt the first decision would send. No backend is called.
pub(super) fn render_prompt(loaded: &LoadedConfig) -> Result<String, String> {
    validate_config(&loaded.config)?;

    let market = crate::infra::build_market(&loaded.config)?;
    let hub = GenerationHub::new(Box::new(MockGenerator::new("preview")));
    let engine = DecisionEngine::new(hub, resolve_decision_config(&loaded.config));
    Ok(engine.preview_prompt(&market.snapshot()))
}
