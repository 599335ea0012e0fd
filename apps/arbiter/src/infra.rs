use arbiter_application::config::{Config, GeneratorBackend};
use arbiter_application::shared::resolve_market_settings;
use arbiter_domain::repositories::artifacts::ArtifactWriter;
use arbiter_domain::repositories::generation::TextGenerator;
use arbiter_domain::services::generation::GenerationHub;
use arbiter_infrastructure::artifacts::FilesystemArtifactWriter;
use arbiter_infrastructure::generation::{
    MockGenerator, RemoteGenerator, RemoteGeneratorConfig, ScriptedGenerator,
};
use arbiter_infrastructure::market::{MarketSimConfig, SimulatedMarket};

const DEFAULT_MOCK_MODEL: &str = "mock-llm";
const DEFAULT_REMOTE_MODEL: &str = "default";
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 30_000;
const REMOTE_SYSTEM_PROMPT: &str =
    "You are a professional trading decision expert. Answer with one concrete trade.";

pub struct RunDeps {
    pub market: SimulatedMarket,
    pub hub: GenerationHub,
    pub artifacts: Box<dyn ArtifactWriter>,
}

pub fn build_run_deps(config: &Config) -> Result<RunDeps, String> {
    Ok(RunDeps {
        market: build_market(config)?,
        hub: GenerationHub::new(build_generator(config)?),
        artifacts: Box::new(FilesystemArtifactWriter::new()),
    })
}

pub fn build_generator(config: &Config) -> Result<Box<dyn TextGenerator>, String> {
    let Some(generator) = config.generator.as_ref() else {
        return Ok(Box::new(MockGenerator::new(DEFAULT_MOCK_MODEL)));
    };
    let model = generator.model.clone();

    match generator.backend {
        GeneratorBackend::Mock => Ok(Box::new(MockGenerator::new(
            model.unwrap_or_else(|| DEFAULT_MOCK_MODEL.to_string()),
        ))),
        GeneratorBackend::Scripted => {
            let responses = generator.responses.clone().unwrap_or_default();
            if responses.is_empty() {
                return Err("generator.responses must not be empty for backend = scripted".to_string());
            }
            Ok(Box::new(ScriptedGenerator::new(responses)))
        }
        GeneratorBackend::Remote => {
            let base_url = generator
                .url
                .clone()
                .ok_or_else(|| "generator.url is required for backend = remote".to_string())?;
            let remote = RemoteGenerator::new(RemoteGeneratorConfig {
                base_url,
                model: model.unwrap_or_else(|| DEFAULT_REMOTE_MODEL.to_string()),
                api_key: generator.api_key.clone(),
                timeout_ms: generator.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
                system_prompt: Some(REMOTE_SYSTEM_PROMPT.to_string()),
            })?;
            Ok(Box::new(remote))
        }
    }
}

pub fn build_market(config: &Config) -> Result<SimulatedMarket, String> {
    let settings = resolve_market_settings(config)?;
    SimulatedMarket::new(MarketSimConfig {
        symbols: config.run.symbols.clone(),
        initial_capital: config.run.initial_capital,
        seed: settings.seed,
        history_days: settings.history_days,
        base_price: settings.base_price,
        volatility: settings.volatility,
        fee_bps: settings.fee_bps,
        score_sensitivity: settings.score_sensitivity,
        start_date: settings.start_date,
    })
}
