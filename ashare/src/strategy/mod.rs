use ashare_data::event::MarketEvent;
use ashare_execution::fill::Fill;
use ashare_instrument::{symbol::Symbol, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moving-average crossover.
pub mod ma_cross;

/// Z-score mean reversion.
pub mod mean_reversion;

/// Bollinger band breakout / reversion.
pub mod bollinger;

/// RSI reversal with four thresholds.
pub mod rsi_reversal;

/// Bollinger + RSI confirmation combo.
pub mod boll_rsi;

/// Grid trading with a FIFO buy tape.
pub mod grid;

/// ETF T+1 intraday strategy (regular T / reverse T / auto).
pub mod etf_t;

/// The strategy capability.
///
/// A strategy consumes [`MarketEvent`]s and [`Fill`]s and may emit zero or more advisory
/// [`Signal`]s per market event. Strategies hold only per-symbol rolling windows; they never
/// touch the broker or the portfolio directly - returned signals are published by the engine,
/// which owns all scheduling.
pub trait Strategy: Send {
    fn name(&self) -> &'static str;

    /// Analyse a market event, returning any advisory signals.
    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal>;

    /// Observe a fill for an order this engine executed. `side` is derived from the parent
    /// order. Default: ignore.
    fn on_fill(&mut self, _fill: &Fill, _side: Side) {}
}

/// Advisory signal produced by a strategy.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub kind: SignalKind,
    pub strength: SignalStrength,
    pub meta: Option<serde_json::Value>,
}

impl Signal {
    pub fn new(time: DateTime<Utc>, symbol: Symbol, kind: SignalKind, strength: f64) -> Self {
        Self {
            time,
            symbol,
            kind,
            strength: SignalStrength::new(strength),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Advisory decision carried by a [`Signal`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

/// Strength of an advisory signal, clamped into `[0, 1]`.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct SignalStrength(f64);

impl SignalStrength {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for SignalStrength {
    fn default() -> Self {
        Self(1.0)
    }
}
