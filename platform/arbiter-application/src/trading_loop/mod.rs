use crate::config::Config;
use crate::features::state_features;
use crate::reporting::write_run_artifacts;
use crate::shared::{
    resolve_decision_config, resolve_loop_config, resolve_ppo_config, validate_config,
};
use arbiter_domain::repositories::artifacts::ArtifactWriter;
use arbiter_domain::repositories::environment::TradingEnvironment;
use arbiter_domain::repositories::generation::ParameterUpdate;
use arbiter_domain::repositories::policy::{
    Experience, PolicyUpdate, PolicyUpdater, UpdateStatus,
};
use arbiter_domain::services::audit::AuditEvent;
use arbiter_domain::services::decision::{DecisionEngine, ParsePath};
use arbiter_domain::services::generation::GenerationHub;
use arbiter_domain::services::policy::PpoTrainer;
use arbiter_domain::value_objects::trade_decision::TradeDecision;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub run_id: String,
    pub strategy: String,
    pub steps: u64,
    pub initial_capital: f64,
    pub reward_scale: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    pub step: u64,
    pub decision: TradeDecision,
    pub parse_path: ParsePath,
    pub used_fallback: bool,
    pub raw_response: String,
    pub score: f64,
    pub reward: f64,
    pub portfolio_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_update: Option<PolicyUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gradients for the shared backend, taken from a completed policy step.
fn shared_update(update: &PolicyUpdate, learning_rate: f64) -> Option<ParameterUpdate> {
    if update.status != UpdateStatus::Updated {
        return None;
    }
    let gradients: BTreeMap<String, f64> = [
        ("policy_loss", update.policy_loss),
        ("value_loss", update.value_loss),
        ("entropy", update.entropy),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
    .collect();
    Some(ParameterUpdate {
        gradients,
        learning_rate,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopSummary {
    pub run_id: String,
    pub strategy: String,
    pub steps_requested: u64,
    pub total_decisions: u64,
    pub total_reward: f64,
    pub average_score: f64,
    pub training_step: u64,
    pub algorithm: String,
    pub fallback_decisions: u64,
    pub execution_errors: u64,
    pub iterations: Vec<IterationResult>,
    pub audit_events: Vec<AuditEvent>,
}

/// Runs `config.steps` observe → decide → score → learn iterations.
///
/// A completed policy step is pushed to the engine's shared generation backend. A failed
/// `score` call is recorded on its iteration with zero score and reward, no experience is
/// submitted for it, and the loop moves on.
pub fn run_trading_loop<E, P>(
    env: &mut E,
    engine: &mut DecisionEngine,
    trainer: &mut P,
    config: &LoopConfig,
    progress: &mut dyn FnMut(&IterationResult),
) -> LoopSummary
where
    E: TradingEnvironment + ?Sized,
    P: PolicyUpdater + ?Sized,
{
    let _span = info_span!(
        "run_trading_loop",
        run_id = %config.run_id,
        strategy = %config.strategy,
        steps = config.steps
    )
    .entered();

    let mut iterations = Vec::with_capacity(config.steps as usize);
    let mut audit_events = Vec::new();
    let mut total_reward = 0.0;
    let mut score_sum = 0.0;
    let mut fallback_decisions = 0u64;
    let mut execution_errors = 0u64;

    for step in 1..=config.steps {
        let iteration_start = Instant::now();
        let state = env.snapshot();
        let outcome = engine.make_decision(&state);
        audit_events.extend(engine.drain_audit_events());
        if outcome.used_fallback {
            fallback_decisions += 1;
        }

        let descriptor = outcome.decision.descriptor();
        let (score, reward, policy_update, error) = match env.score(&descriptor, &state) {
            Ok(score) => {
                let reward = score * config.reward_scale;
                let features = state_features(&state, &outcome.decision, config.initial_capital);
                let action = serde_json::to_string(&outcome.decision)
                    .unwrap_or_else(|_| descriptor.clone());
                trainer.add_experience(Experience {
                    features,
                    action,
                    reward,
                    done: step == config.steps,
                });
                let update = trainer.update_policy();
                if let Some(params) = shared_update(&update, config.learning_rate) {
                    match engine.hub().update_shared_parameters(&params) {
                        Ok(receipt) => {
                            tracing::debug!(
                                step,
                                update_count = receipt.update_count,
                                "shared generation parameters updated"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(step, error = %err, "shared parameter update failed");
                        }
                    }
                }
                (score, reward, Some(update), None)
            }
            Err(err) => {
                execution_errors += 1;
                tracing::warn!(step, action = %descriptor, error = %err, "action execution failed");
                metrics::counter!("arbiter.loop.execution_errors_total").increment(1);
                audit_events.push(
                    AuditEvent::new(&config.run_id, step, "execution", "error")
                        .with_symbol(&outcome.decision.symbol)
                        .with_error(&err)
                        .with_details(json!({ "action": descriptor })),
                );
                (0.0, 0.0, None, Some(err))
            }
        };

        total_reward += reward;
        score_sum += score;
        metrics::counter!("arbiter.loop.iterations_total").increment(1);
        metrics::histogram!("arbiter.loop.reward").record(reward);
        metrics::histogram!("arbiter.loop.iteration_ms")
            .record(iteration_start.elapsed().as_millis() as f64);

        let iteration = IterationResult {
            step,
            decision: outcome.decision,
            parse_path: outcome.parse_path,
            used_fallback: outcome.used_fallback,
            raw_response: outcome.raw_response,
            score,
            reward,
            portfolio_value: state.total_value(),
            policy_update,
            error,
        };
        tracing::debug!(step, score, reward, "iteration complete");
        progress(&iteration);
        iterations.push(iteration);
    }

    let stats = trainer.training_stats();
    let completed = iterations.len();
    let summary = LoopSummary {
        run_id: config.run_id.clone(),
        strategy: config.strategy.clone(),
        steps_requested: config.steps,
        total_decisions: completed as u64,
        total_reward,
        average_score: if completed == 0 {
            0.0
        } else {
            score_sum / completed as f64
        },
        training_step: stats.training_step,
        algorithm: stats.algorithm,
        fallback_decisions,
        execution_errors,
        iterations,
        audit_events,
    };
    tracing::info!(
        total_decisions = summary.total_decisions,
        total_reward = summary.total_reward,
        average_score = summary.average_score,
        training_step = summary.training_step,
        "trading loop finished"
    );
    summary
}

/// Validates `config`, wires the engine and trainer, runs the loop and optionally writes
/// run artifacts under `out`.
pub fn run_simulation(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    env: &mut dyn TradingEnvironment,
    hub: GenerationHub,
    artifacts: &dyn ArtifactWriter,
    progress: &mut dyn FnMut(&IterationResult),
) -> Result<(LoopSummary, Option<PathBuf>), String> {
    validate_config(config)?;
    let loop_config = resolve_loop_config(config);
    let mut engine = DecisionEngine::new(hub, resolve_decision_config(config));
    let mut trainer = PpoTrainer::new(resolve_ppo_config(config)?);

    let summary = run_trading_loop(env, &mut engine, &mut trainer, &loop_config, progress);

    let run_dir = match out {
        Some(out_dir) => Some(write_run_artifacts(
            &summary,
            config_toml,
            &out_dir,
            artifacts,
        )?),
        None => None,
    };
    Ok((summary, run_dir))
}
