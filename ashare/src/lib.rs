#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Ashare
//! Ashare core is a Rust framework for building event-driven live-trading, paper-trading and
//! back-testing systems for Chinese A-share equities and ETFs.
//!
//! One event loop drives both regimes. A [`MarketEvent`](ashare_data::event::MarketEvent)
//! enters the engine, strategies turn it into [`Signal`](strategy::Signal)s, the portfolio
//! (backtest) or the [`SignalExecutor`](execution::SignalExecutor) (live) turns signals into
//! orders, the risk gate vets them, and fills flow back through the same bus:
//!
//! ```text
//! DataSource ── MarketData ──► Engine ─► Strategy ── Signal ─► Portfolio/SignalExecutor
//!                                │                                      │
//!                                │                     RiskManager → OrderManager/Simulator
//!                                ◄─────────────────── Fill ◄────────────┘
//! ```
//!
//! Backtest and live differ only in the data source and the broker implementation; the event
//! vocabulary, order semantics and ordering guarantees are identical.

use serde::{Deserialize, Serialize};

/// Events that occur while trading, and the transmitter for external event sinks.
pub mod event;

/// The `Strategy` capability and the bundled strategies.
pub mod strategy;

/// Cash & positions ledger, signal sizing, equity curve.
pub mod portfolio;

/// Pre-trade risk gate.
pub mod risk;

/// Live signal execution against a broker.
pub mod execution;

/// The shared event loop and the backtest/live drivers.
pub mod engine;

/// Backtest performance summary.
pub mod statistic;

/// The aggregate configuration document.
pub mod config;

/// Default tracing initialisers.
pub mod logging;

/// Defines all possible errors in Ashare core.
pub mod error;

/// Monotonically increasing event sequence. Tracks engine event processing order and makes
/// every published event traceable in logs.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize,
)]
pub struct Sequence(pub u64);

impl Sequence {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn fetch_add(&mut self) -> Sequence {
        let sequence = *self;
        self.0 += 1;
        sequence
    }
}
