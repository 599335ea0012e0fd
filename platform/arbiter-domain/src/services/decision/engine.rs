use crate::entities::market_state::MarketState;
use crate::repositories::generation::GenerationOverrides;
use crate::services::audit::AuditEvent;
use crate::services::decision::history::{
    CappedBuffer, DecisionRecord, MarketRecord, PortfolioRecord,
};
use crate::services::decision::parser::{fallback_decision, parse_decision, ParsePath, ParserConfig};
use crate::services::decision::prompt::build_decision_prompt;
use crate::services::generation::{GenerationHub, RoleConfig};
use crate::value_objects::trade_decision::TradeDecision;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

pub const TRADING_DECISION_ROLE: &str = "trading_decision";

#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub run_id: String,
    pub role: String,
    pub role_config: RoleConfig,
    pub sampling: GenerationOverrides,
    pub parser: ParserConfig,
    pub decision_history_cap: usize,
    pub market_history_cap: usize,
    pub portfolio_history_cap: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            run_id: "default".to_string(),
            role: TRADING_DECISION_ROLE.to_string(),
            role_config: RoleConfig {
                label: "Trading decision expert".to_string(),
                reasoning_category: "strategic".to_string(),
                temperature: Some(0.7),
                max_length: Some(512),
            },
            sampling: GenerationOverrides {
                temperature: Some(0.7),
                max_new_tokens: Some(128),
                do_sample: Some(true),
                top_p: Some(0.9),
                top_k: Some(50),
                pad_token_id: None,
            },
            parser: ParserConfig::default(),
            decision_history_cap: 50,
            market_history_cap: 30,
            portfolio_history_cap: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub ordinal: u64,
    pub decision: TradeDecision,
    pub raw_response: String,
    #[serde(skip)]
    pub prompt: String,
    pub used_fallback: bool,
    pub parse_path: ParsePath,
}

/// Turns market snapshots into trading decisions through the shared generation hub.
///
/// Every call yields a structured decision: when generation fails the decision comes from
/// the snapshot alone. Each call is recorded in the bounded histories that feed later
/// prompts.
pub struct DecisionEngine {
    hub: GenerationHub,
    config: DecisionConfig,
    decision_count: u64,
    decision_history: CappedBuffer<DecisionRecord>,
    market_history: CappedBuffer<MarketRecord>,
    portfolio_history: CappedBuffer<PortfolioRecord>,
    audit_events: Vec<AuditEvent>,
}

impl DecisionEngine {
    pub fn new(hub: GenerationHub, config: DecisionConfig) -> Self {
        hub.register_role(&config.role, config.role_config.clone());
        Self {
            hub,
            decision_history: CappedBuffer::new(config.decision_history_cap),
            market_history: CappedBuffer::new(config.market_history_cap),
            portfolio_history: CappedBuffer::new(config.portfolio_history_cap),
            config,
            decision_count: 0,
            audit_events: Vec::new(),
        }
    }

    pub fn make_decision(&mut self, state: &MarketState) -> DecisionOutcome {
        self.decision_count += 1;
        let ordinal = self.decision_count;
        let span = tracing::info_span!("decision.make", ordinal, run_id = %self.config.run_id);
        let _enter = span.enter();

        let prompt = build_decision_prompt(state, &self.decision_history, &self.portfolio_history);
        tracing::debug!(prompt_chars = prompt.len(), "decision prompt built");

        let start = Instant::now();
        let generation = self
            .hub
            .generate_for_role(&self.config.role, &prompt, &self.config.sampling);

        let (decision, parse_path, raw_response, used_fallback) = match generation {
            Ok(generation) => {
                let (decision, path) = parse_decision(&generation.text, state, &self.config.parser);
                self.audit_events.push(
                    AuditEvent::new(&self.config.run_id, ordinal, "decision", "call")
                        .with_symbol(&decision.symbol)
                        .with_details(json!({
                            "parse_path": path.as_str(),
                            "decision": decision.descriptor(),
                            "confidence": generation.confidence,
                            "response_chars": generation.text.len(),
                        })),
                );
                (decision, path, generation.text, false)
            }
            Err(err) => {
                tracing::warn!(error = %err, "generation failed; using fallback decision");
                let (decision, path) = fallback_decision(state, &self.config.parser);
                self.audit_events.push(
                    AuditEvent::new(&self.config.run_id, ordinal, "decision", "error")
                        .with_error(&err),
                );
                self.audit_events.push(
                    AuditEvent::new(&self.config.run_id, ordinal, "decision", "fallback")
                        .with_symbol(&decision.symbol)
                        .with_details(json!({
                            "parse_path": path.as_str(),
                            "decision": decision.descriptor(),
                        })),
                );
                (decision, path, String::new(), true)
            }
        };

        let path_label = if used_fallback { "fallback" } else { "llm" };
        metrics::counter!("arbiter.decision.calls_total", "path" => path_label).increment(1);
        metrics::counter!("arbiter.decision.parse_path_total", "path" => parse_path.as_str())
            .increment(1);
        metrics::histogram!("arbiter.decision.latency_ms", "path" => path_label)
            .record(start.elapsed().as_millis() as f64);

        tracing::info!(
            action = %decision.action,
            symbol = %decision.symbol,
            amount = decision.amount,
            parse_path = parse_path.as_str(),
            used_fallback,
            "decision made"
        );

        self.record(ordinal, state, &decision, &raw_response);

        DecisionOutcome {
            ordinal,
            decision,
            raw_response,
            prompt,
            used_fallback,
            parse_path,
        }
    }

    fn record(&mut self, step: u64, state: &MarketState, decision: &TradeDecision, raw: &str) {
        self.decision_history.push(DecisionRecord {
            step,
            timestamp: chrono::Utc::now(),
            decision: decision.clone(),
            raw_response: raw.to_string(),
            market_data: state.market_data.clone(),
            portfolio: state.portfolio.clone(),
            technical_indicators: state.technical_indicators.clone(),
            detailed_history: state.detailed_history.clone(),
        });
        self.market_history.push(MarketRecord {
            step,
            market_data: state.market_data.clone(),
            detailed_history: state.detailed_history.clone(),
        });
        self.portfolio_history.push(PortfolioRecord {
            step,
            portfolio: state.portfolio.clone(),
            total_value: state.total_value(),
        });
    }

    pub fn decision_count(&self) -> u64 {
        self.decision_count
    }

    pub fn decision_history(&self) -> &CappedBuffer<DecisionRecord> {
        &self.decision_history
    }

    pub fn market_history(&self) -> &CappedBuffer<MarketRecord> {
        &self.market_history
    }

    pub fn portfolio_history(&self) -> &CappedBuffer<PortfolioRecord> {
        &self.portfolio_history
    }

    pub fn hub(&self) -> &GenerationHub {
        &self.hub
    }

    pub fn drain_audit_events(&mut self) -> Vec<AuditEvent> {
        std::mem::take(&mut self.audit_events)
    }

    /// Prompt the next call would send, without generating or recording anything.
    pub fn preview_prompt(&self, state: &MarketState) -> String {
        build_decision_prompt(state, &self.decision_history, &self.portfolio_history)
    }
}
