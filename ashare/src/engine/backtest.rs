use crate::{
    config::EngineConfig,
    engine::{Engine, ExecutionRoute},
    error::EngineError,
    event::EventTx,
    portfolio::{EquitySample, Portfolio, PortfolioConfig, TradeRecord},
    risk::{RiskConfig, RiskManager},
    statistic::{SummaryConfig, TradingSummary},
    strategy::Strategy,
};
use ashare_data::{bar::BarSeries, event::MarketEvent};
use ashare_execution::{
    cost::{CostConfig, CostModel},
    order::AccountId,
    position::Position,
    simulator::{MarketSimulator, SimulatorConfig},
};
use ashare_instrument::{session::trading_calendar, symbol::Symbol};
use chrono::{NaiveDate, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

/// Results of a completed backtest.
#[derive(Clone, Debug)]
pub struct BacktestReport {
    pub summary: TradingSummary,
    pub equity_curve: Vec<EquitySample>,
    pub trades: Vec<TradeRecord>,
    pub final_positions: Vec<Position>,
    pub final_cash: Decimal,
}

/// Historical replay driver over the shared event loop.
///
/// Iterates the trading calendar in `[start, end]`; each day it synthesizes one `Market`
/// event per loaded symbol (in load order, for reproducibility) and drains the queue to
/// quiescence before advancing the synthetic clock to the next day.
#[derive(Debug)]
pub struct BacktestEngine {
    engine: Engine,
    data: IndexMap<Symbol, BarSeries>,
    start: NaiveDate,
    end: NaiveDate,
    summary_config: SummaryConfig,
}

impl BacktestEngine {
    /// Returns a [`BacktestEngineBuilder`] instance.
    pub fn builder() -> BacktestEngineBuilder {
        BacktestEngineBuilder::new()
    }

    /// Replay the configured period and produce the performance report.
    pub async fn run(mut self) -> Result<BacktestReport, EngineError> {
        info!(start = %self.start, end = %self.end, "starting backtest");
        // Events stamp at the session close; daily bars are complete observations.
        let close_time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

        for day in trading_calendar(self.start, self.end) {
            let time = day.and_time(close_time).and_utc();
            for (_, series) in &self.data {
                if let Some(bar) = series.get(day) {
                    self.engine
                        .enqueue(crate::event::Event::Market(MarketEvent::from_bar(
                            time,
                            bar.clone(),
                        )));
                }
            }
            self.engine.drain().await;
        }

        let portfolio = self.engine.portfolio();
        let summary = TradingSummary::generate(
            self.summary_config,
            portfolio.initial_capital(),
            portfolio.equity_curve(),
            portfolio.daily_returns(),
            portfolio.trades().len(),
        );
        info!(
            final_value = summary.final_value,
            total_return = summary.total_return,
            trades = summary.total_trades,
            "backtest completed"
        );

        Ok(BacktestReport {
            summary,
            equity_curve: portfolio.equity_curve().to_vec(),
            trades: portfolio.trades().to_vec(),
            final_positions: portfolio.positions().cloned().collect(),
            final_cash: portfolio.cash(),
        })
    }
}

/// Builder to construct [`BacktestEngine`] instances.
#[derive(Default)]
pub struct BacktestEngineBuilder {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    initial_capital: Option<Decimal>,
    simulator_config: SimulatorConfig,
    cost_config: CostConfig,
    risk_config: RiskConfig,
    portfolio_config: PortfolioConfig,
    summary_config: SummaryConfig,
    strategies: Vec<Box<dyn Strategy>>,
    data: IndexMap<Symbol, BarSeries>,
    event_tx: Option<EventTx>,
}

impl std::fmt::Debug for BacktestEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngineBuilder")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("strategies", &self.strategies.len())
            .field("symbols", &self.data.len())
            .finish()
    }
}

impl BacktestEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(self, value: NaiveDate) -> Self {
        Self {
            start: Some(value),
            ..self
        }
    }

    pub fn end(self, value: NaiveDate) -> Self {
        Self {
            end: Some(value),
            ..self
        }
    }

    pub fn initial_capital(self, value: Decimal) -> Self {
        Self {
            initial_capital: Some(value),
            ..self
        }
    }

    /// Apply the backtest-relevant sections of an aggregate [`EngineConfig`] document.
    pub fn config(self, config: &EngineConfig) -> Self {
        Self {
            simulator_config: config.market,
            cost_config: config.costs,
            risk_config: config.risk,
            portfolio_config: config.portfolio(),
            initial_capital: Some(config.engine.initial_capital),
            ..self
        }
    }

    pub fn simulator_config(self, value: SimulatorConfig) -> Self {
        Self {
            simulator_config: value,
            ..self
        }
    }

    pub fn cost_config(self, value: CostConfig) -> Self {
        Self {
            cost_config: value,
            ..self
        }
    }

    pub fn risk_config(self, value: RiskConfig) -> Self {
        Self {
            risk_config: value,
            ..self
        }
    }

    pub fn summary_config(self, value: SummaryConfig) -> Self {
        Self {
            summary_config: value,
            ..self
        }
    }

    pub fn strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Load the historical series for one symbol. Symbols replay in load order each day.
    pub fn bars(mut self, symbol: Symbol, series: BarSeries) -> Self {
        info!(%symbol, records = series.len(), "loaded market data");
        self.data.insert(symbol, series);
        self
    }

    pub fn event_tx(self, value: EventTx) -> Self {
        Self {
            event_tx: Some(value),
            ..self
        }
    }

    pub fn build(self) -> Result<BacktestEngine, EngineError> {
        let start = self.start.ok_or(EngineError::BuilderIncomplete("start"))?;
        let end = self.end.ok_or(EngineError::BuilderIncomplete("end"))?;

        let mut portfolio_config = self.portfolio_config;
        if let Some(initial_capital) = self.initial_capital {
            portfolio_config.initial_capital = initial_capital;
        }
        portfolio_config.max_position_pct = self.risk_config.max_position_pct;

        let portfolio = Portfolio::new(AccountId::new("BACKTEST"), portfolio_config);
        let engine = Engine::new(
            ExecutionRoute::Simulated {
                simulator: MarketSimulator::new(self.simulator_config),
                cost_model: CostModel::new(self.cost_config),
            },
            self.strategies,
            portfolio,
            RiskManager::new(self.risk_config),
            self.event_tx,
        );

        Ok(BacktestEngine {
            engine,
            data: self.data,
            start,
            end,
            summary_config: self.summary_config,
        })
    }
}
