use ashare::engine::live::{LiveConfig, LiveEngine};
use ashare::execution::{SignalExecutor, SignalExecutorConfig};
use ashare::portfolio::PortfolioConfig;
use ashare::risk::{RiskConfig, RiskManager};
use ashare::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_data::quote::Quote;
use ashare_execution::broker::mock::{MockBroker, MockBrokerConfig};
use ashare_execution::broker::BrokerAdapter;
use ashare_execution::cost::CostModel;
use ashare_execution::manager::{OrderManager, OrderManagerConfig};
use ashare_execution::order::AccountId;
use ashare_execution::store::OrderStore;
use ashare_instrument::symbol::Symbol;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Buys at full strength on the first market event, then stays quiet.
struct BuyOnce {
    fired: bool,
}

impl Strategy for BuyOnce {
    fn name(&self) -> &'static str {
        "buy_once"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        if self.fired {
            return Vec::new();
        }
        self.fired = true;
        vec![Signal::new(
            market.time,
            market.symbol.clone(),
            SignalKind::Buy,
            1.0,
        )]
    }
}

fn quote(symbol: &Symbol, price: Decimal) -> Quote {
    Quote {
        symbol: symbol.clone(),
        price,
        bid: Some(price - dec!(0.01)),
        ask: Some(price + dec!(0.01)),
        volume: 5_000_000,
        amount: None,
        high: price,
        low: price,
        open: price,
        prev_close: price,
        timestamp: Utc::now(),
    }
}

/// End-to-end live wiring over the mock broker: quote in, signal, sized order, asynchronous
/// fill observed through the monitor, graceful drain on stop.
#[tokio::test(flavor = "multi_thread")]
async fn live_engine_turns_a_signal_into_a_broker_fill() {
    let symbol = Symbol::new("600036.SH").unwrap();

    let broker = Arc::new(MockBroker::new(MockBrokerConfig {
        fill_delay_s: 0.02,
        ..MockBrokerConfig::default()
    }));
    broker.set_market_price(&symbol, dec!(40.00));

    let store = Arc::new(OrderStore::in_memory().unwrap());
    let (order_manager, execution_rx) = OrderManager::new(
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        store,
        CostModel::default(),
        OrderManagerConfig {
            poll_interval: Duration::from_millis(10),
            ..OrderManagerConfig::default()
        },
    );

    let executor = SignalExecutor::new(
        AccountId::new("LIVE"),
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        Arc::clone(&order_manager),
        RiskManager::new(RiskConfig::default()),
        SignalExecutorConfig::default(),
    );

    let (market_tx, market_rx) = mpsc::unbounded_channel();
    let engine = LiveEngine::new(
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        Arc::clone(&order_manager),
        executor,
        vec![Box::new(BuyOnce { fired: false })],
        RiskManager::new(RiskConfig::default()),
        PortfolioConfig::default(),
        market_rx,
        execution_rx,
        None,
        LiveConfig {
            heartbeat_interval: Duration::from_secs(5),
            state_sync_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
            ..LiveConfig::default()
        },
    );
    let handle = engine.handle();
    let engine_task = tokio::spawn(engine.run());

    market_tx
        .send(MarketEvent::from_quote(quote(&symbol, dec!(40.00))))
        .unwrap();

    // Give the order round trip (place -> delayed fill -> monitor poll) time to complete.
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.stop();
    engine_task.await.unwrap().unwrap();

    // The mock broker's ledger reflects the executed buy: 1_000_000 * 10% / 40 = 2_500
    // shares, slipped 0.01% on the fill.
    let positions = broker.positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, 2_500);
    assert_eq!(positions[0].avg_cost, dec!(40.004));

    let account = broker.account().await.unwrap();
    assert_eq!(account.cash_balance, dec!(1000000) - dec!(2500) * dec!(40.004));
    assert!(!broker.is_connected().await, "engine must disconnect on stop");
}

/// Paper mode observes signals without ever reaching the broker.
#[tokio::test(flavor = "multi_thread")]
async fn paper_mode_never_trades() {
    let symbol = Symbol::new("600036.SH").unwrap();

    let broker = Arc::new(MockBroker::new(MockBrokerConfig::default()));
    broker.set_market_price(&symbol, dec!(40.00));

    let store = Arc::new(OrderStore::in_memory().unwrap());
    let (order_manager, execution_rx) = OrderManager::new(
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        store,
        CostModel::default(),
        OrderManagerConfig::default(),
    );

    let executor = SignalExecutor::new(
        AccountId::new("LIVE"),
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        Arc::clone(&order_manager),
        RiskManager::new(RiskConfig::default()),
        SignalExecutorConfig::default(),
    );

    let (market_tx, market_rx) = mpsc::unbounded_channel();
    let engine = LiveEngine::new(
        Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
        Arc::clone(&order_manager),
        executor,
        vec![Box::new(BuyOnce { fired: false })],
        RiskManager::new(RiskConfig::default()),
        PortfolioConfig::default(),
        market_rx,
        execution_rx,
        None,
        LiveConfig {
            enable_trading: false,
            heartbeat_interval: Duration::from_secs(5),
            state_sync_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(1),
        },
    );
    let handle = engine.handle();
    let engine_task = tokio::spawn(engine.run());

    market_tx
        .send(MarketEvent::from_quote(quote(&symbol, dec!(40.00))))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop();
    engine_task.await.unwrap().unwrap();

    assert!(broker.positions().await.unwrap().is_empty());
    let account = broker.account().await.unwrap();
    assert_eq!(account.cash_balance, dec!(1000000));
}
