use arbiter_application::config::{default_config_with_source, Config};
use arbiter_application::shared::resolve_market_settings;
use arbiter_application::trading_loop::{run_simulation, run_trading_loop, LoopConfig};
use arbiter_domain::entities::market_state::MarketState;
use arbiter_domain::repositories::environment::TradingEnvironment;
use arbiter_domain::repositories::policy::{
    Experience, PolicyUpdate, PolicyUpdater, TrainingStats, UpdateStatus,
};
use arbiter_domain::services::decision::{DecisionConfig, DecisionEngine};
use arbiter_domain::services::generation::GenerationHub;
use arbiter_domain::value_objects::ohlcv::Ohlcv;
use arbiter_infrastructure::artifacts::FilesystemArtifactWriter;
use arbiter_infrastructure::generation::{MockGenerator, ScriptedGenerator};
use arbiter_infrastructure::market::{MarketSimConfig, SimulatedMarket};
use std::path::PathBuf;

struct FlakyEnvironment {
    calls: u64,
    failing_calls: Vec<u64>,
    actions: Vec<String>,
}

impl TradingEnvironment for FlakyEnvironment {
    fn snapshot(&self) -> MarketState {
        let mut state = MarketState {
            symbols: vec!["AAPL".to_string()],
            ..MarketState::default()
        };
        state
            .market_data
            .insert("AAPL".to_string(), Ohlcv::flat(100.0 + self.calls as f64, 1000.0));
        state
    }

    fn score(&mut self, action: &str, _context: &MarketState) -> Result<f64, String> {
        self.calls += 1;
        self.actions.push(action.to_string());
        if self.failing_calls.contains(&self.calls) {
            return Err("broker offline".to_string());
        }
        Ok(0.6)
    }
}

#[derive(Default)]
struct RecordingTrainer {
    experiences: Vec<Experience>,
    updates: u64,
    /// Report a completed step every `complete_every` calls; zero never completes.
    complete_every: u64,
}

impl PolicyUpdater for RecordingTrainer {
    fn add_experience(&mut self, experience: Experience) {
        self.experiences.push(experience);
    }

    fn update_policy(&mut self) -> PolicyUpdate {
        self.updates += 1;
        let completed = self.complete_every > 0 && self.updates % self.complete_every == 0;
        PolicyUpdate {
            status: if completed {
                UpdateStatus::Updated
            } else {
                UpdateStatus::Buffering
            },
            training_step: 0,
            buffer_len: self.experiences.len(),
            policy_loss: completed.then_some(0.12),
            value_loss: completed.then_some(0.5),
            entropy: None,
            mean_reward: None,
        }
    }

    fn training_stats(&self) -> TrainingStats {
        TrainingStats {
            training_step: 0,
            algorithm: "recording".to_string(),
            buffered: self.experiences.len(),
            total_experiences: self.experiences.len() as u64,
            mean_reward: 0.0,
        }
    }
}

fn loop_config(steps: u64) -> LoopConfig {
    LoopConfig {
        run_id: "loop-test".to_string(),
        strategy: "simulated".to_string(),
        steps,
        initial_capital: 100_000.0,
        reward_scale: 10.0,
        learning_rate: 3e-4,
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("arbiter-loop-{name}-{nanos}"))
}

#[test]
fn execution_errors_do_not_stop_the_loop() {
    let hub = GenerationHub::new(Box::new(ScriptedGenerator::new(vec![
        "BUY AAPL 10".to_string(),
    ])));
    let mut engine = DecisionEngine::new(hub, DecisionConfig::default());
    let mut env = FlakyEnvironment {
        calls: 0,
        failing_calls: vec![2],
        actions: Vec::new(),
    };
    let mut trainer = RecordingTrainer::default();
    let mut seen = Vec::new();

    let summary = run_trading_loop(
        &mut env,
        &mut engine,
        &mut trainer,
        &loop_config(4),
        &mut |iteration| seen.push(iteration.step),
    );

    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(summary.total_decisions, 4);
    assert_eq!(summary.execution_errors, 1);
    assert_eq!(summary.fallback_decisions, 0);
    assert!((summary.total_reward - 18.0).abs() < 1e-9);
    assert!((summary.average_score - 0.45).abs() < 1e-9);
    assert_eq!(summary.algorithm, "recording");

    let failed = &summary.iterations[1];
    assert_eq!(failed.score, 0.0);
    assert_eq!(failed.reward, 0.0);
    assert_eq!(failed.error.as_deref(), Some("broker offline"));
    assert!(failed.policy_update.is_none());

    assert_eq!(env.actions, vec!["BUY AAPL 10"; 4]);
    assert_eq!(trainer.experiences.len(), 3);
    assert_eq!(trainer.updates, 3);
    assert!(trainer.experiences.iter().all(|e| (e.reward - 6.0).abs() < 1e-9));
    assert_eq!(
        trainer.experiences.iter().map(|e| e.done).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert_eq!(trainer.experiences[0].features.decision_type, 1.0);

    let execution_events: Vec<_> = summary
        .audit_events
        .iter()
        .filter(|event| event.stage == "execution")
        .collect();
    assert_eq!(execution_events.len(), 1);
    assert_eq!(execution_events[0].step, 2);
    assert_eq!(
        summary
            .audit_events
            .iter()
            .filter(|event| event.stage == "decision")
            .count(),
        4
    );
}

#[test]
fn completed_policy_steps_update_the_shared_backend() {
    let hub = GenerationHub::new(Box::new(MockGenerator::new("mock-llm")));
    let mut engine = DecisionEngine::new(hub.clone(), DecisionConfig::default());
    let mut env = FlakyEnvironment {
        calls: 0,
        failing_calls: vec![3],
        actions: Vec::new(),
    };
    let mut trainer = RecordingTrainer {
        complete_every: 2,
        ..RecordingTrainer::default()
    };

    let summary = run_trading_loop(&mut env, &mut engine, &mut trainer, &loop_config(6), &mut |_| {});

    // step 3 fails to score, so five policy calls happen and two of them complete
    assert_eq!(trainer.updates, 5);
    let completed = summary
        .iterations
        .iter()
        .filter_map(|it| it.policy_update.as_ref())
        .filter(|update| update.status == UpdateStatus::Updated)
        .count();
    assert_eq!(completed, 2);
    let stats = hub.global_stats();
    assert_eq!(stats.total_updates, 2);
    assert_eq!(stats.total_generations, 6);
}

#[test]
fn zero_steps_yield_empty_summary() {
    let hub = GenerationHub::new(Box::new(ScriptedGenerator::new(vec!["x".to_string()])));
    let mut engine = DecisionEngine::new(hub, DecisionConfig::default());
    let mut env = FlakyEnvironment {
        calls: 0,
        failing_calls: Vec::new(),
        actions: Vec::new(),
    };
    let mut trainer = RecordingTrainer::default();
    let summary = run_trading_loop(&mut env, &mut engine, &mut trainer, &loop_config(0), &mut |_| {});
    assert_eq!(summary.total_decisions, 0);
    assert_eq!(summary.average_score, 0.0);
    assert!(env.actions.is_empty());
}

fn simulated_market(config: &Config) -> SimulatedMarket {
    let settings = resolve_market_settings(config).expect("market settings");
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
    .expect("market")
}

#[test]
fn simulation_with_mock_backend_writes_artifacts() {
    let (config, source) = default_config_with_source().expect("defaults");
    let mut market = simulated_market(&config);
    let hub = GenerationHub::new(Box::new(MockGenerator::new("mock-llm")));
    let out = temp_dir("artifacts");
    let writer = FilesystemArtifactWriter::new();
    let mut progress_calls = 0;

    let (summary, run_dir) = run_simulation(
        &config,
        &source,
        Some(out.clone()),
        &mut market,
        hub.clone(),
        &writer,
        &mut |_| progress_calls += 1,
    )
    .expect("simulation runs");

    assert_eq!(progress_calls, 5);
    assert_eq!(summary.total_decisions, 5);
    assert_eq!(summary.algorithm, "PPO");
    assert_eq!(summary.fallback_decisions, 0);
    assert!(summary
        .iterations
        .iter()
        .all(|it| (0.0..=1.0).contains(&it.score) && it.decision.amount > 0.0));
    assert_eq!(hub.global_stats().total_generations, 5);

    let run_dir = run_dir.expect("artifacts requested");
    assert_eq!(run_dir, out.join("arbiter_demo"));
    let iterations = std::fs::read_to_string(run_dir.join("iterations.jsonl")).expect("iterations");
    assert_eq!(iterations.lines().count(), 5);
    let summary_text = std::fs::read_to_string(run_dir.join("summary.json")).expect("summary");
    let summary_value: serde_json::Value = serde_json::from_str(&summary_text).expect("json");
    assert_eq!(summary_value["total_decisions"], 5);
    assert!(summary_value.get("iterations").is_none());
    assert!(run_dir.join("audit.jsonl").exists());
    let snapshot = std::fs::read_to_string(run_dir.join("config.toml")).expect("config");
    assert_eq!(snapshot, source);

    let _ = std::fs::remove_dir_all(&out);
}

#[test]
fn simulation_rejects_invalid_config_before_running() {
    let (mut config, source) = default_config_with_source().expect("defaults");
    let mut market = simulated_market(&config);
    config.run.steps = 0;
    let hub = GenerationHub::new(Box::new(MockGenerator::new("mock-llm")));
    let writer = FilesystemArtifactWriter::new();

    let err = run_simulation(&config, &source, None, &mut market, hub, &writer, &mut |_| {})
        .expect_err("zero steps rejected");
    assert!(err.contains("run.steps"));
}
