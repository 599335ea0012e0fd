use arbiter_domain::entities::market_state::{MarketState, PricePoint, TradeRecord};
use arbiter_domain::entities::portfolio::Portfolio;
use arbiter_domain::repositories::environment::TradingEnvironment;
use arbiter_domain::services::indicators::{compute_indicators, detailed_history};
use arbiter_domain::value_objects::action_type::ActionType;
use arbiter_domain::value_objects::ohlcv::Ohlcv;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};

const WARMUP_EXTRA_TICKS: usize = 20;
const MAX_SERIES_LEN: usize = 250;
const PRICE_HISTORY_LEN: usize = 30;
const TRADE_LOG_CAP: usize = 100;
const BASE_VOLUME: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSimConfig {
    pub symbols: Vec<String>,
    pub initial_capital: f64,
    pub seed: u64,
    pub history_days: usize,
    pub base_price: f64,
    pub volatility: f64,
    pub fee_bps: f64,
    pub score_sensitivity: f64,
    pub start_date: NaiveDate,
}

/// Seeded random-walk market with a single cash/positions book.
///
/// Every `score` call executes (or rejects) the trade at the current close and then
/// advances all symbols by one daily bar. The score compares the traded symbol's next
/// close with the execution price.
pub struct SimulatedMarket {
    config: MarketSimConfig,
    rng: StdRng,
    series: BTreeMap<String, Vec<(NaiveDate, Ohlcv)>>,
    price_history: BTreeMap<String, VecDeque<PricePoint>>,
    trades: VecDeque<TradeRecord>,
    portfolio: Portfolio,
    tick: u64,
    date: NaiveDate,
}

impl SimulatedMarket {
    pub fn new(config: MarketSimConfig) -> Result<Self, String> {
        if config.symbols.is_empty() {
            return Err("simulated market needs at least one symbol".to_string());
        }
        if !config.base_price.is_finite() || config.base_price <= 0.0 {
            return Err(format!(
                "simulated market base_price must be > 0 (got {})",
                config.base_price
            ));
        }
        if !config.volatility.is_finite() || config.volatility < 0.0 {
            return Err(format!(
                "simulated market volatility must be >= 0 (got {})",
                config.volatility
            ));
        }

        let mut market = Self {
            rng: StdRng::seed_from_u64(config.seed),
            series: BTreeMap::new(),
            price_history: BTreeMap::new(),
            trades: VecDeque::with_capacity(TRADE_LOG_CAP),
            portfolio: Portfolio::new_with_cash(config.initial_capital),
            tick: 0,
            date: config.start_date,
            config,
        };

        for (idx, symbol) in market.config.symbols.iter().enumerate() {
            let price = market.config.base_price * (1.0 + 0.5 * idx as f64);
            market.series.insert(
                symbol.clone(),
                vec![(market.date, Ohlcv::flat(price, BASE_VOLUME))],
            );
            market.price_history.insert(
                symbol.clone(),
                VecDeque::from([PricePoint {
                    step: 0,
                    close: price,
                }]),
            );
        }
        for _ in 0..market.config.history_days + WARMUP_EXTRA_TICKS {
            market.advance();
        }
        tracing::info!(
            symbols = market.config.symbols.len(),
            seed = market.config.seed,
            warmup_ticks = market.tick,
            "simulated market ready"
        );
        Ok(market)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash()
    }

    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.portfolio.position_qty(symbol)
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.series
            .get(symbol)
            .and_then(|bars| bars.last())
            .map(|(_, bar)| bar.close)
    }

    fn advance(&mut self) {
        self.tick += 1;
        self.date = self
            .date
            .checked_add_days(Days::new(1))
            .unwrap_or(self.date);
        let shock_scale = self.config.volatility * 3f64.sqrt();

        for (symbol, bars) in self.series.iter_mut() {
            let open = bars.last().map(|(_, bar)| bar.close).unwrap_or(self.config.base_price);
            let ret = self.rng.gen_range(-1.0..1.0) * shock_scale;
            let close = (open * (1.0 + ret)).max(0.01);
            let wick = self.rng.gen_range(0.0..1.0) * self.config.volatility * 0.5;
            let high = open.max(close) * (1.0 + wick);
            let low = open.min(close) * (1.0 - wick);
            let volume = BASE_VOLUME * (1.0 + self.rng.gen_range(-0.3..0.3));
            bars.push((
                self.date,
                Ohlcv {
                    open,
                    high,
                    low,
                    close,
                    volume,
                },
            ));
            if bars.len() > MAX_SERIES_LEN {
                let excess = bars.len() - MAX_SERIES_LEN;
                bars.drain(..excess);
            }

            if let Some(points) = self.price_history.get_mut(symbol) {
                points.push_back(PricePoint {
                    step: self.tick,
                    close,
                });
                while points.len() > PRICE_HISTORY_LEN {
                    points.pop_front();
                }
            }
        }
    }

    fn record_trade(&mut self, trade: TradeRecord) {
        if self.trades.len() == TRADE_LOG_CAP {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    fn directional_score(&self, action: ActionType, symbol: &str, entry_price: f64) -> f64 {
        let Some(next_close) = self.last_close(symbol) else {
            return 0.0;
        };
        let ret = (next_close - entry_price) / entry_price;
        let signed = match action {
            ActionType::Buy => ret,
            ActionType::Sell => -ret,
        };
        (0.5 + signed * self.config.score_sensitivity).clamp(0.0, 1.0)
    }
}

fn parse_action(action: &str) -> Option<(ActionType, String, f64)> {
    let mut parts = action.split_whitespace();
    let side = ActionType::parse(parts.next()?)?;
    let symbol = parts.next()?.to_string();
    let amount = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    Some((side, symbol, amount))
}

impl TradingEnvironment for SimulatedMarket {
    fn snapshot(&self) -> MarketState {
        let mut state = MarketState {
            portfolio: self.portfolio.snapshot(),
            trade_history: self.trades.iter().cloned().collect(),
            symbols: self.config.symbols.clone(),
            ..MarketState::default()
        };
        for (symbol, bars) in &self.series {
            let Some((_, last)) = bars.last() else {
                continue;
            };
            let closes: Vec<f64> = bars.iter().map(|(_, bar)| bar.close).collect();
            state.market_data.insert(symbol.clone(), *last);
            state
                .technical_indicators
                .insert(symbol.clone(), compute_indicators(&closes));
            state.detailed_history.insert(
                symbol.clone(),
                detailed_history(bars, self.config.history_days),
            );
            if let Some(points) = self.price_history.get(symbol) {
                state
                    .price_history
                    .insert(symbol.clone(), points.iter().copied().collect());
            }
        }
        state
    }

    fn score(&mut self, action: &str, context: &MarketState) -> Result<f64, String> {
        let Some((side, symbol, amount)) = parse_action(action) else {
            tracing::warn!(action, "unparseable action; scoring 0");
            self.advance();
            return Ok(0.0);
        };
        let Some(current) = self.last_close(&symbol) else {
            tracing::warn!(action, symbol = %symbol, "unknown symbol; scoring 0");
            self.advance();
            return Ok(0.0);
        };
        let price = context
            .market_data
            .get(&symbol)
            .map(|bar| bar.close)
            .unwrap_or(current);
        if !price.is_finite() || price <= 0.0 {
            return Err(format!("invalid execution price {price} for {symbol}"));
        }

        let fee = amount * price * self.config.fee_bps / 10_000.0;
        let rejection = match side {
            ActionType::Buy if amount * price + fee > self.portfolio.cash() => {
                Some("insufficient cash")
            }
            ActionType::Sell if self.portfolio.position_qty(&symbol) <= 0.0 => {
                Some("no position to sell")
            }
            _ => None,
        };
        if let Some(reason) = rejection {
            tracing::debug!(action, reason, "trade rejected");
            metrics::counter!("arbiter.infra.market.rejected_total", "reason" => reason)
                .increment(1);
            self.advance();
            return Ok(0.0);
        }

        let executed = self.portfolio.apply_fill(&symbol, side, amount, price, fee);
        let step = self.tick;
        self.advance();
        let score = self.directional_score(side, &symbol, price);
        self.record_trade(TradeRecord {
            step,
            action: side,
            symbol: symbol.clone(),
            amount: executed,
            price,
            score,
        });
        metrics::counter!("arbiter.infra.market.fills_total", "side" => side.as_str())
            .increment(1);
        tracing::debug!(action, executed, price, score, "trade executed");
        Ok(score)
    }
}
