use arbiter_application::config::{to_toml_pretty, StrategyKind};
use arbiter_application::meta::engine_name;
use arbiter_application::reporting::summary_json;
use arbiter_application::trading_loop::{run_simulation, IterationResult, LoopSummary};
use super::common::LoadedConfig;
use std::path::PathBuf;
use std::time::Instant;

pub(super) struct RunArgs {
    pub config: Option<PathBuf>,
    pub strategy: Option<String>,
    pub steps: Option<u64>,
    pub out: Option<PathBuf>,
    pub json: bool,
    pub metrics_addr: Option<String>,
}

pub(super) fn run_loop(args: RunArgs) -> Result<(), String> {
    let mut loaded = super::common::load_run_config(args.config)?;
    let config_toml = apply_overrides(&mut loaded, args.strategy.as_deref(), args.steps)?;

    if !args.json {
        super::common::print_config_summary("run", &loaded, args.out.as_ref())?;
    }
    if let Some(addr) = crate::obs::init_metrics(args.metrics_addr.as_deref())? {
        if !args.json {
            println!("metrics: http://{addr}/metrics");
        }
    }

    let overall_start = Instant::now();
    let crate::infra::RunDeps {
        mut market,
        hub,
        artifacts,
    } = crate::infra::build_run_deps(&loaded.config)?;

    let total_steps = loaded.config.run.steps;
    let quiet = args.json;
    let mut progress = |iteration: &IterationResult| {
        if !quiet {
            print_iteration(iteration, total_steps);
        }
    };

    let (summary, run_dir) = run_simulation(
        &loaded.config,
        &config_toml,
        args.out,
        &mut market,
        hub.clone(),
        artifacts.as_ref(),
        &mut progress,
    )?;

    if args.json {
        let mut line = summary_json(&summary)?;
        if let (serde_json::Value::Object(map), Some(dir)) = (&mut line, run_dir.as_ref()) {
            map.insert(
                "run_dir".to_string(),
                serde_json::Value::String(dir.display().to_string()),
            );
        }
        println!("{}", line);
        return Ok(());
    }

    let elapsed_ms = overall_start.elapsed().as_millis();
    metrics::histogram!("arbiter.cli.run_ms").record(elapsed_ms as f64);

    print_summary(&summary);
    let stats = hub.global_stats();
    println!(
        "generation: backend={}, calls={}, errors={}, shared_updates={}",
        stats.backend, stats.total_generations, stats.total_errors, stats.total_updates
    );
    if let Some(dir) = run_dir {
        println!("run output: {}", dir.display());
    }
    println!("{} cli: run total_ms={}", engine_name(), elapsed_ms);
    Ok(())
}

/// Applies `--strategy` and `--steps` and returns the config text to snapshot: the file
/// as read when nothing was overridden, else the re-serialized config that actually runs.
pub(super) fn apply_overrides(
    loaded: &mut LoadedConfig,
    strategy: Option<&str>,
    steps: Option<u64>,
) -> Result<String, String> {
    let mut overridden = false;
    if let Some(raw) = strategy {
        loaded.config.run.strategy = StrategyKind::parse(raw)?;
        overridden = true;
    }
    if let Some(steps) = steps {
        loaded.config.run.steps = steps;
        overridden = true;
    }
    if overridden {
        to_toml_pretty(&loaded.config)
    } else {
        Ok(loaded.source.clone())
    }
}

fn print_iteration(iteration: &IterationResult, total_steps: u64) {
    println!(
        "step {}/{}: {} (path={}{}) score={:.4} reward={:.4} portfolio_value={:.2}",
        iteration.step,
        total_steps,
        iteration.decision.descriptor(),
        iteration.parse_path.as_str(),
        if iteration.used_fallback { ", fallback" } else { "" },
        iteration.score,
        iteration.reward,
        iteration.portfolio_value
    );
    if let Some(err) = iteration.error.as_deref() {
        println!("  execution error: {err}");
    }
    if let Some(update) = iteration.policy_update.as_ref() {
        if let Some(loss) = update.policy_loss {
            println!(
                "  policy update: training_step={} policy_loss={:.6} value_loss={:.6}",
                update.training_step,
                loss,
                update.value_loss.unwrap_or(0.0)
            );
        }
    }
}

fn print_summary(summary: &LoopSummary) {
    println!(
        "summary: run_id={}, strategy={}, total_decisions={}/{}",
        summary.run_id, summary.strategy, summary.total_decisions, summary.steps_requested
    );
    println!(
        "reward: total={:.4}, average_score={:.4}",
        summary.total_reward, summary.average_score
    );
    println!(
        "training: algorithm={}, training_steps={}",
        summary.algorithm, summary.training_step
    );
    println!(
        "issues: fallback_decisions={}, execution_errors={}",
        summary.fallback_decisions, summary.execution_errors
    );
}
