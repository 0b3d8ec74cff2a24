use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use fnv::FnvHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Configuration for constructing a [`GridTrading`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of grid levels the range is divided into.
    pub grid_count: usize,
    /// Total width of the grid as a fraction of the base price.
    pub price_range_pct: f64,
    /// Minimum profit over the average open buy before a sell fires.
    pub profit_per_grid: f64,
    /// Grid centre. When unset, derived from the first `warmup` closes.
    pub base_price: Option<Decimal>,
    /// Closes collected before auto-deriving the base price.
    pub warmup: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_count: 10,
            price_range_pct: 0.20,
            profit_per_grid: 0.02,
            base_price: None,
            warmup: 20,
        }
    }
}

/// How close (fractionally) a price must be to a grid line to count as a crossing.
const GRID_TOLERANCE: f64 = 0.005;

#[derive(Debug)]
struct SymbolState {
    history: VecDeque<f64>,
    levels: Vec<f64>,
    /// Unmatched buys, oldest first.
    buy_tape: VecDeque<f64>,
    last_grid: Option<usize>,
    out_of_range: bool,
}

impl SymbolState {
    fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(64),
            levels: Vec::new(),
            buy_tape: VecDeque::new(),
            last_grid: None,
            out_of_range: false,
        }
    }

    fn nearest_grid(&self, price: f64) -> Option<usize> {
        self.levels
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (price - **a)
                    .abs()
                    .partial_cmp(&(price - **b).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| index)
    }
}

/// Grid trading for range-bound markets.
///
/// The price range around a base price is divided into `grid_count` levels; a drop onto a
/// lower level advises a buy, a rise onto a higher level advises a sell once the open buys
/// are in profit. Buys are matched FIFO: each sell retires the earliest unmatched buy.
/// Prices leaving the grid (5% beyond either edge) suspend trading with a warning; the grid
/// is never recentred automatically.
#[derive(Debug)]
pub struct GridTrading {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl GridTrading {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }

    /// Open (unmatched) buy prices for a symbol, oldest first.
    pub fn open_buys(&self, symbol: &Symbol) -> Vec<f64> {
        self.states
            .get(symbol)
            .map(|state| state.buy_tape.iter().copied().collect())
            .unwrap_or_default()
    }

    fn initialize(&self, state: &mut SymbolState, symbol: &Symbol, current: f64) {
        let base = match self.config.base_price.and_then(|base| base.to_f64()) {
            Some(base) => base,
            None if state.history.len() >= self.config.warmup => {
                state.history.iter().sum::<f64>() / state.history.len() as f64
            }
            None => return,
        };

        let half_range = base * self.config.price_range_pct / 2.0;
        let (min, max) = (base - half_range, base + half_range);
        let step = (max - min) / (self.config.grid_count - 1) as f64;
        state.levels = (0..self.config.grid_count)
            .map(|index| min + index as f64 * step)
            .collect();
        state.last_grid = state.nearest_grid(current);

        info!(
            %symbol,
            base,
            min,
            max,
            step,
            "grid initialized"
        );
    }
}

impl Strategy for GridTrading {
    fn name(&self) -> &'static str {
        "grid_trading"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let Some(close) = market.close().to_f64() else {
            return Vec::new();
        };
        if close <= 0.0 {
            return Vec::new();
        }

        let mut state = self
            .states
            .remove(&market.symbol)
            .unwrap_or_else(SymbolState::new);
        state.history.push_back(close);
        if state.history.len() > 64 {
            state.history.pop_front();
        }

        if state.levels.is_empty() {
            self.initialize(&mut state, &market.symbol, close);
            self.states.insert(market.symbol.clone(), state);
            return Vec::new();
        }

        let signals = self.evaluate(&mut state, market, close);
        self.states.insert(market.symbol.clone(), state);
        signals
    }
}

impl GridTrading {
    fn evaluate(
        &self,
        state: &mut SymbolState,
        market: &MarketEvent,
        close: f64,
    ) -> Vec<Signal> {
        let (min, max) = (state.levels[0], state.levels[state.levels.len() - 1]);
        if close < min * 0.95 || close > max * 1.05 {
            if !state.out_of_range {
                warn!(
                    symbol = %market.symbol,
                    close,
                    min,
                    max,
                    "price left the grid range, suspending grid trading"
                );
                state.out_of_range = true;
            }
            return Vec::new();
        }
        state.out_of_range = false;

        let Some(grid) = state.nearest_grid(close) else {
            return Vec::new();
        };
        let level = state.levels[grid];
        if ((close - level) / level).abs() >= GRID_TOLERANCE {
            return Vec::new();
        }
        let last_grid = state.last_grid.unwrap_or(grid);

        // Price dropped to a lower level: buy the dip.
        if grid < last_grid {
            let strength = 0.6 + (1.0 - grid as f64 / self.config.grid_count as f64) * 0.3;
            state.buy_tape.push_back(close);
            state.last_grid = Some(grid);
            info!(
                symbol = %market.symbol,
                grid,
                close,
                open_buys = state.buy_tape.len(),
                "grid buy"
            );
            return vec![Signal::new(
                market.time,
                market.symbol.clone(),
                SignalKind::Buy,
                strength,
            )];
        }

        // Price rose to a higher level: retire the earliest unmatched buy once it is in
        // profit.
        if grid > last_grid {
            let Some(earliest) = state.buy_tape.front().copied() else {
                return Vec::new();
            };
            let profit = (close - earliest) / earliest;
            if profit >= self.config.profit_per_grid {
                let matched = state.buy_tape.pop_front().unwrap_or(earliest);
                state.last_grid = Some(grid);
                let strength = 0.6 + (grid as f64 / self.config.grid_count as f64) * 0.3;
                info!(
                    symbol = %market.symbol,
                    grid,
                    close,
                    matched,
                    open_buys = state.buy_tape.len(),
                    "grid sell"
                );
                return vec![Signal::new(
                    market.time,
                    market.symbol.clone(),
                    SignalKind::Sell,
                    strength,
                )];
            }
        }

        Vec::new()
    }
}
