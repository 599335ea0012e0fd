use arbiter_domain::entities::indicators::TechnicalIndicators;
use arbiter_domain::entities::market_state::MarketState;
use arbiter_domain::repositories::generation::{Generation, SamplingParams, TextGenerator};
use arbiter_domain::services::decision::{
    parse_decision, DecisionConfig, DecisionEngine, ParserConfig,
};
use arbiter_domain::services::generation::GenerationHub;
use arbiter_domain::value_objects::ohlcv::Ohlcv;
use proptest::prelude::*;

// Blank entries stand in for misconfigured symbol lists.
const UNIVERSE: [&str; 6] = ["AAPL", "GOOGL", "MSFT", "AMZN", "", "  "];

struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    fn backend(&self) -> &str {
        "failing"
    }

    fn generate(&mut self, _prompt: &str, _params: &SamplingParams) -> Result<Generation, String> {
        Err("backend unavailable".to_string())
    }
}

fn arb_bar() -> impl Strategy<Value = Ohlcv> {
    (1.0f64..500.0, 1.0f64..500.0, 0.0f64..1e7).prop_map(|(open, close, volume)| Ohlcv {
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume,
    })
}

fn arb_indicators() -> impl Strategy<Value = TechnicalIndicators> {
    (0.0f64..100.0, 0.0f64..500.0, 0.0f64..500.0).prop_map(|(rsi, ma5, ma20)| {
        TechnicalIndicators {
            rsi,
            ma5,
            ma20,
            ..TechnicalIndicators::default()
        }
    })
}

fn arb_state() -> impl Strategy<Value = MarketState> {
    (
        prop::collection::vec(any::<bool>(), UNIVERSE.len()),
        prop::collection::vec(
            (0usize..UNIVERSE.len(), arb_bar(), prop::option::of(arb_indicators())),
            0..4,
        ),
    )
        .prop_map(|(in_universe, ticks)| {
            let mut state = MarketState {
                symbols: UNIVERSE
                    .iter()
                    .zip(&in_universe)
                    .filter(|(_, keep)| **keep)
                    .map(|(s, _)| s.to_string())
                    .collect(),
                ..MarketState::default()
            };
            for (idx, bar, indicators) in ticks {
                let symbol = UNIVERSE[idx].to_string();
                state.market_data.insert(symbol.clone(), bar);
                if let Some(ind) = indicators {
                    state.technical_indicators.insert(symbol, ind);
                }
            }
            state
        })
}

fn allowed_symbol(state: &MarketState, symbol: &str) -> bool {
    if symbol.trim().is_empty() {
        return false;
    }
    symbol == ParserConfig::default().placeholder_symbol
        || state.symbols.iter().any(|s| s == symbol)
        || state.market_data.contains_key(symbol)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn failing_backend_still_yields_valid_decision(state in arb_state()) {
        let hub = GenerationHub::new(Box::new(FailingGenerator));
        let mut engine = DecisionEngine::new(hub, DecisionConfig::default());
        let outcome = engine.make_decision(&state);

        prop_assert!(outcome.used_fallback);
        prop_assert!(outcome.decision.amount > 0.0);
        prop_assert!(allowed_symbol(&state, &outcome.decision.symbol));
    }

    #[test]
    fn parsing_any_text_yields_valid_decision(text in ".{0,120}", state in arb_state()) {
        let (decision, _) = parse_decision(&text, &state, &ParserConfig::default());
        prop_assert!(decision.amount > 0.0 && decision.amount.is_finite());
        prop_assert!(allowed_symbol(&state, &decision.symbol));
    }

    #[test]
    fn blank_symbols_never_reach_a_decision(
        text in "(BUY|SELL|hold)? ?(AAPL|MSFT)? ?[0-9]{0,3}",
        state in arb_state(),
    ) {
        let (decision, _) = parse_decision(&text, &state, &ParserConfig::default());
        prop_assert!(!decision.symbol.trim().is_empty());

        let hub = GenerationHub::new(Box::new(FailingGenerator));
        let mut engine = DecisionEngine::new(hub, DecisionConfig::default());
        let outcome = engine.make_decision(&state);
        prop_assert!(!outcome.decision.symbol.trim().is_empty());
    }

    #[test]
    fn history_buffers_keep_latest_ordinals(cap in 1usize..8, calls in 0usize..20) {
        let hub = GenerationHub::new(Box::new(FailingGenerator));
        let config = DecisionConfig {
            decision_history_cap: cap,
            market_history_cap: cap,
            portfolio_history_cap: cap,
            ..DecisionConfig::default()
        };
        let mut engine = DecisionEngine::new(hub, config);
        for _ in 0..calls {
            engine.make_decision(&MarketState::default());
        }

        let kept = calls.min(cap);
        let expected: Vec<u64> = ((calls - kept + 1) as u64..=calls as u64).collect();
        let decisions: Vec<u64> = engine.decision_history().iter().map(|r| r.step).collect();
        let markets: Vec<u64> = engine.market_history().iter().map(|r| r.step).collect();
        let portfolios: Vec<u64> = engine.portfolio_history().iter().map(|r| r.step).collect();
        prop_assert_eq!(&decisions, &expected);
        prop_assert_eq!(&markets, &expected);
        prop_assert_eq!(&portfolios, &expected);
    }
}
