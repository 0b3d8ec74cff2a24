use crate::{
    engine::{Engine, ExecutionRoute},
    error::EngineError,
    event::{Event, EventTx},
    execution::SignalExecutor,
    portfolio::{Portfolio, PortfolioConfig},
    risk::RiskManager,
    strategy::Strategy,
};
use ashare_data::event::MarketEvent;
use ashare_execution::{
    account::Account,
    broker::BrokerAdapter,
    manager::{ExecutionEvent, OrderManager},
    order::AccountId,
    position::Position,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Configuration for the [`LiveEngine`].
#[derive(Copy, Clone, Debug)]
pub struct LiveConfig {
    /// When false the engine observes and logs signals without trading (paper mode).
    pub enable_trading: bool,
    /// Cadence of the broker connectivity / pending-order heartbeat.
    pub heartbeat_interval: Duration,
    /// Cadence of the positions/account re-read from the broker.
    pub state_sync_interval: Duration,
    /// How long shutdown waits for in-flight orders to resolve.
    pub drain_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enable_trading: true,
            heartbeat_interval: Duration::from_secs(30),
            state_sync_interval: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::EngineConfig> for LiveConfig {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            enable_trading: config.engine.enable_trading,
            heartbeat_interval: Duration::from_secs(config.engine.heartbeat_interval_s),
            ..Self::default()
        }
    }
}

/// Remote stop handle for a running [`LiveEngine`].
#[derive(Clone, Debug)]
pub struct EngineHandle {
    running: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Request a graceful stop: the engine finishes the current dispatch, drains queued
    /// events and in-flight orders, then disconnects.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Live driver over the shared event loop.
///
/// Market events arrive from the realtime feed channel; fills and order updates arrive from
/// the `OrderManager`'s background monitors. Both are funnelled through the identical
/// routing the backtest uses. Background tasks only ever communicate by enqueueing events.
pub struct LiveEngine {
    engine: Engine,
    broker: Arc<dyn BrokerAdapter>,
    order_manager: Arc<OrderManager>,
    market_rx: mpsc::UnboundedReceiver<MarketEvent>,
    execution_rx: mpsc::UnboundedReceiver<ExecutionEvent>,
    running: Arc<AtomicBool>,
    config: LiveConfig,
    last_account: Option<Account>,
    last_positions: Vec<Position>,
}

impl std::fmt::Debug for LiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEngine")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl LiveEngine {
    pub fn new(
        broker: Arc<dyn BrokerAdapter>,
        order_manager: Arc<OrderManager>,
        executor: SignalExecutor,
        strategies: Vec<Box<dyn Strategy>>,
        risk: RiskManager,
        portfolio_config: PortfolioConfig,
        market_rx: mpsc::UnboundedReceiver<MarketEvent>,
        execution_rx: mpsc::UnboundedReceiver<ExecutionEvent>,
        event_tx: Option<EventTx>,
        config: LiveConfig,
    ) -> Self {
        let portfolio = Portfolio::new(AccountId::new("LIVE"), portfolio_config);
        let engine = Engine::new(
            ExecutionRoute::Live {
                executor,
                enable_trading: config.enable_trading,
            },
            strategies,
            portfolio,
            risk,
            event_tx,
        );

        Self {
            engine,
            broker,
            order_manager,
            market_rx,
            execution_rx,
            running: Arc::new(AtomicBool::new(false)),
            config,
            last_account: None,
            last_positions: Vec::new(),
        }
    }

    /// Stop handle usable from other tasks and signal handlers.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Latest broker account snapshot observed by the state-sync loop.
    pub fn account(&self) -> Option<&Account> {
        self.last_account.as_ref()
    }

    /// Latest broker positions observed by the state-sync loop.
    pub fn positions(&self) -> &[Position] {
        &self.last_positions
    }

    /// Run until the stop handle fires or every input channel closes, then drain.
    pub async fn run(mut self) -> Result<(), EngineError> {
        self.broker.connect().await?;
        let restored = self.order_manager.restore()?;
        if restored > 0 {
            info!(restored, "resumed monitoring for restored orders");
        }

        self.running.store(true, Ordering::SeqCst);
        info!(enable_trading = self.config.enable_trading, "live engine started");

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        let mut state_sync = tokio::time::interval(self.config.state_sync_interval);
        // Bound how long a stop request can go unnoticed while the feeds are quiet.
        let mut stop_poll = tokio::time::interval(Duration::from_millis(200));
        let mut market_open = true;
        let mut execution_open = true;

        while self.running.load(Ordering::SeqCst) && (market_open || execution_open) {
            tokio::select! {
                maybe_market = self.market_rx.recv(), if market_open => {
                    match maybe_market {
                        Some(market) => {
                            self.engine.enqueue(Event::Market(market));
                            self.engine.drain().await;
                        }
                        None => {
                            warn!("market feed closed");
                            market_open = false;
                        }
                    }
                }
                maybe_execution = self.execution_rx.recv(), if execution_open => {
                    match maybe_execution {
                        Some(execution) => {
                            self.engine.enqueue(match execution {
                                ExecutionEvent::Fill(fill) => Event::Fill(fill),
                                ExecutionEvent::OrderUpdate(order) => Event::Order(order),
                            });
                            self.engine.drain().await;
                        }
                        None => execution_open = false,
                    }
                }
                _ = heartbeat.tick() => self.heartbeat().await,
                _ = state_sync.tick() => self.sync_state().await,
                _ = stop_poll.tick() => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Broker connectivity check plus a pending-order pulse.
    async fn heartbeat(&mut self) {
        if !self.broker.is_connected().await {
            error!("broker disconnected, attempting reconnect");
            if let Err(reconnect_error) = self.broker.connect().await {
                error!(%reconnect_error, "reconnect failed, will retry next heartbeat");
                return;
            }
            info!("broker reconnected");
        }

        let pending = self.order_manager.pending_orders().len();
        info!(pending_orders = pending, "heartbeat");
    }

    /// Re-read remote account state. The broker remains the source of truth for cash and
    /// positions in live trading; the engine never caches them across decisions.
    async fn sync_state(&mut self) {
        match self.broker.positions().await {
            Ok(positions) => self.last_positions = positions,
            Err(sync_error) => warn!(%sync_error, "position sync failed"),
        }
        match self.broker.account().await {
            Ok(account) => self.last_account = Some(account),
            Err(sync_error) => warn!(%sync_error, "account sync failed"),
        }
    }

    async fn shutdown(&mut self) {
        info!("live engine stopping");

        // Flush whatever the loop already accepted, then wait for in-flight orders.
        self.engine.drain().await;
        self.order_manager.drain(self.config.drain_timeout).await;

        // Pick up any final fills the monitors published while draining.
        while let Ok(execution) = self.execution_rx.try_recv() {
            self.engine.enqueue(match execution {
                ExecutionEvent::Fill(fill) => Event::Fill(fill),
                ExecutionEvent::OrderUpdate(order) => Event::Order(order),
            });
        }
        self.engine.drain().await;

        self.order_manager.shutdown();
        self.broker.disconnect().await;
        info!("live engine stopped");
    }
}
