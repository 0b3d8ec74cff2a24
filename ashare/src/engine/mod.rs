use crate::{
    event::{Event, EventTx, MessageTransmitter},
    execution::SignalExecutor,
    portfolio::Portfolio,
    risk::RiskManager,
    strategy::Strategy,
    Sequence,
};
use ashare_data::{
    bar::Bar,
    event::{MarketDataKind, MarketEvent},
};
use ashare_execution::{
    cost::CostModel,
    fill::Fill,
    order::{Order, OrderStatus},
    simulator::MarketSimulator,
};
use ashare_instrument::symbol::Symbol;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// Backtest driver: replays historical bars over the shared loop.
pub mod backtest;

/// Live driver: runs the shared loop against a realtime feed and a broker.
pub mod live;

/// Where signal and order events are routed: the deterministic simulator (backtest) or the
/// broker path (live).
enum ExecutionRoute {
    Simulated {
        simulator: MarketSimulator,
        cost_model: CostModel,
    },
    Live {
        executor: SignalExecutor,
        /// When false, signals are logged instead of executed (paper observation mode).
        enable_trading: bool,
    },
}

impl std::fmt::Debug for ExecutionRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionRoute::Simulated { .. } => write!(f, "Simulated"),
            ExecutionRoute::Live { enable_trading, .. } => {
                write!(f, "Live {{ enable_trading: {enable_trading} }}")
            }
        }
    }
}

/// The shared event loop driving both backtest and live trading.
///
/// A single FIFO queue carries `Market | Signal | Order | Fill` events; dispatch is strictly
/// serialized, so strategies, portfolio and risk observe one total order of events. Routing:
///
/// * `Market` -> every strategy, then the portfolio (mark-to-market + equity sample)
/// * `Signal` -> portfolio sizing (backtest) or the signal executor (live)
/// * `Order`  -> risk gate + market simulator (backtest); snapshot registration (live)
/// * `Fill`   -> portfolio, then every strategy
///
/// Events for one symbol are processed in strictly non-decreasing engine time; across
/// symbols, FIFO enqueue order rules. A `Fill` always trails the `Order` event that caused
/// it, because fills are only enqueued while their order event is being processed.
/// Same-step BUY and SELL signals for one symbol are processed strictly in emission order -
/// there is deliberately no SELL-first tie-break.
pub struct Engine {
    route: ExecutionRoute,
    strategies: Vec<Box<dyn Strategy>>,
    portfolio: Portfolio,
    risk: RiskManager,
    queue: VecDeque<Event>,
    event_tx: Option<EventTx>,
    sequence: Sequence,
    /// Monotonically non-decreasing engine time, advanced by market events.
    clock: DateTime<Utc>,
    /// Latest bar per symbol, the simulator's trading-day context.
    latest_bars: FnvHashMap<Symbol, Bar>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("route", &self.route)
            .field(
                "strategies",
                &self
                    .strategies
                    .iter()
                    .map(|strategy| strategy.name())
                    .collect::<Vec<_>>(),
            )
            .field("queued_events", &self.queue.len())
            .field("sequence", &self.sequence)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Engine {
    fn new(
        route: ExecutionRoute,
        strategies: Vec<Box<dyn Strategy>>,
        portfolio: Portfolio,
        risk: RiskManager,
        event_tx: Option<EventTx>,
    ) -> Self {
        Self {
            route,
            strategies,
            portfolio,
            risk,
            queue: VecDeque::with_capacity(8),
            event_tx,
            sequence: Sequence::default(),
            clock: DateTime::<Utc>::MIN_UTC,
            latest_bars: FnvHashMap::default(),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn enqueue(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Process queued events to quiescence. Handlers enqueue derived events onto the same
    /// queue; one bad event is logged and skipped, never fatal to the loop.
    async fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            self.process(event).await;
        }
    }

    async fn process(&mut self, event: Event) {
        let sequence = self.sequence.fetch_add();
        debug!(sequence = sequence.value(), ?event, "processing event");

        if let Some(event_tx) = &mut self.event_tx {
            event_tx.send(event.clone());
        }

        match event {
            Event::Market(market) => self.process_market(market),
            Event::Signal(signal) => self.process_signal(signal).await,
            Event::Order(order) => self.process_order(order),
            Event::Fill(fill) => self.process_fill(fill),
        }
    }

    fn process_market(&mut self, market: MarketEvent) {
        if market.time > self.clock {
            self.clock = market.time;
        }
        if let MarketDataKind::Bar(bar) = &market.kind {
            self.latest_bars.insert(market.symbol.clone(), bar.clone());
        }

        for strategy in &mut self.strategies {
            for signal in strategy.on_market(&market) {
                self.queue.push_back(Event::Signal(signal));
            }
        }

        self.portfolio.update_from_market(&market);
    }

    async fn process_signal(&mut self, signal: crate::strategy::Signal) {
        match &mut self.route {
            ExecutionRoute::Simulated { .. } => {
                if let Some(order) = self.portfolio.generate_order(&signal, self.clock) {
                    self.queue.push_back(Event::Order(order));
                }
            }
            ExecutionRoute::Live {
                executor,
                enable_trading,
            } => {
                if !*enable_trading {
                    info!(
                        symbol = %signal.symbol,
                        kind = ?signal.kind,
                        strength = signal.strength.value(),
                        "paper mode: signal observed, not executed"
                    );
                    return;
                }
                match executor.execute(&signal).await {
                    Ok(Some(order)) => {
                        self.portfolio.register_order(&order);
                        self.queue.push_back(Event::Order(order));
                    }
                    Ok(None) => {}
                    Err(error) => {
                        error!(symbol = %signal.symbol, %error, "signal execution failed");
                    }
                }
            }
        }
    }

    fn process_order(&mut self, mut order: Order) {
        // Terminal snapshots (live updates, risk rejections) pass through for observation.
        if order.status.is_terminal() {
            return;
        }

        match &self.route {
            ExecutionRoute::Live { .. } => {
                // Live orders execute inside the OrderManager; the bus carries snapshots.
                self.portfolio.register_order(&order);
            }
            ExecutionRoute::Simulated {
                simulator,
                cost_model,
            } => {
                let view = self.portfolio.account_view(&order.symbol);
                if let Err(breach) = self.risk.check_order(&order, &view) {
                    warn!(order_id = %order.id, reason = %breach, "order rejected pre-trade");
                    if order.reject(breach.to_string()).is_ok() {
                        if let Some(event_tx) = &mut self.event_tx {
                            event_tx.send(Event::Order(order));
                        }
                    }
                    return;
                }

                let Some(bar) = self.latest_bars.get(&order.symbol) else {
                    warn!(order_id = %order.id, "no bar loaded for order symbol, no fill");
                    return;
                };

                let Some(decision) = simulator.decide(&order, bar, self.clock.naive_utc())
                else {
                    debug!(order_id = %order.id, "simulator produced no fill");
                    return;
                };

                // March the accepted order through the machine the way a broker would.
                for status in [
                    OrderStatus::Validated,
                    OrderStatus::Submitted,
                    OrderStatus::Accepted,
                ] {
                    if let Err(error) = order.transition(status) {
                        error!(order_id = %order.id, %error, "simulated order transition failed");
                        return;
                    }
                }
                if let Err(error) =
                    order.apply_fill(decision.quantity, decision.price, self.clock)
                {
                    error!(order_id = %order.id, %error, "simulated fill failed");
                    return;
                }

                // Market impact is already inside the fill price; charge the explicit fees.
                let costs = cost_model.cost(decision.quantity, decision.price, order.side);
                let commission = costs.total - costs.market_impact;

                self.queue.push_back(Event::Fill(Fill::new(
                    order.id.clone(),
                    order.symbol.clone(),
                    decision.quantity,
                    decision.price,
                    commission,
                    self.clock,
                )));
            }
        }
    }

    fn process_fill(&mut self, fill: Fill) {
        let side = self.portfolio.order_side(&fill.order_id);
        self.portfolio.update_from_fill(&fill);

        if let Some(side) = side {
            for strategy in &mut self.strategies {
                strategy.on_fill(&fill, side);
            }
        }
    }
}
