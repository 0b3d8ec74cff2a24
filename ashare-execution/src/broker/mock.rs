use crate::{
    account::Account,
    broker::{BrokerAdapter, BrokerError, OrderStatusReport},
    order::{AccountId, BrokerOrderId, Order, OrderStatus},
    position::Position,
};
use ashare_data::quote::Quote;
use ashare_instrument::{symbol::Symbol, Side};
use async_trait::async_trait;
use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for the [`MockBroker`] fill simulation.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MockBrokerConfig {
    pub initial_cash: Decimal,
    /// Delay between acceptance and the simulated fill, in seconds.
    pub fill_delay_s: f64,
    pub slippage_rate: Decimal,
    /// Probability in `[0, 1]` that `place_order` rejects.
    pub rejection_rate: f64,
}

impl Default for MockBrokerConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(1_000_000, 0),
            fill_delay_s: 0.1,
            slippage_rate: Decimal::new(1, 4), // 0.0001
            rejection_rate: 0.0,
        }
    }
}

#[derive(Debug)]
struct Ledger {
    cash_balance: Decimal,
    positions: FnvHashMap<Symbol, Position>,
    orders: FnvHashMap<BrokerOrderId, Order>,
    market_prices: FnvHashMap<Symbol, Decimal>,
    subscriptions: HashSet<Symbol>,
    order_sequence: u64,
}

/// In-process broker for backtest and paper flows.
///
/// Keeps its own cash and positions ledger, simulates asynchronous fills after
/// `fill_delay_s` with configurable slippage and a rejection draw, and honours the same T+1
/// available-quantity rule as a real A-share broker: shares bought today cannot be sold
/// until the next session date.
#[derive(Clone, Debug)]
pub struct MockBroker {
    account_id: AccountId,
    config: MockBrokerConfig,
    connected: Arc<AtomicBool>,
    ledger: Arc<Mutex<Ledger>>,
}

impl MockBroker {
    pub fn new(config: MockBrokerConfig) -> Self {
        Self {
            account_id: AccountId::new("MOCK_ACCOUNT"),
            config,
            connected: Arc::new(AtomicBool::new(false)),
            ledger: Arc::new(Mutex::new(Ledger {
                cash_balance: config.initial_cash,
                positions: FnvHashMap::default(),
                orders: FnvHashMap::default(),
                market_prices: FnvHashMap::default(),
                subscriptions: HashSet::new(),
                order_sequence: 0,
            })),
        }
    }

    /// Seed or move the simulated market price for a symbol.
    pub fn set_market_price(&self, symbol: &Symbol, price: Decimal) {
        self.ledger
            .lock()
            .market_prices
            .insert(symbol.clone(), price);
    }

    fn fill_delay(&self) -> Duration {
        Duration::from_secs_f64(self.config.fill_delay_s.max(0.0))
    }

    fn simulate_fill(&self, broker_order_id: BrokerOrderId) {
        let now = Utc::now();
        let today = now.date_naive();
        let mut ledger = self.ledger.lock();

        let Some(order) = ledger.orders.get(&broker_order_id).cloned() else {
            return;
        };
        if order.status.is_terminal() {
            return;
        }

        let market_price = ledger
            .market_prices
            .get(&order.symbol)
            .copied()
            .or(order.price)
            .unwrap_or(Decimal::new(4000, 2));

        let fill_price = match order.side {
            Side::Buy => market_price * (Decimal::ONE + self.config.slippage_rate),
            Side::Sell => market_price * (Decimal::ONE - self.config.slippage_rate),
        };

        let account = self.account_id.clone();
        let position = ledger
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(account, order.symbol.clone()));

        match order.side {
            Side::Buy => {
                position.apply_buy(order.quantity, fill_price, today);
            }
            Side::Sell => {
                if !position.apply_sell(order.quantity, fill_price, today) {
                    warn!(
                        %broker_order_id,
                        symbol = %order.symbol,
                        "sell exceeds T+1 available quantity, rejecting"
                    );
                    if let Some(stored) = ledger.orders.get_mut(&broker_order_id) {
                        let _ = stored.reject("insufficient available quantity (T+1)");
                    }
                    return;
                }
            }
        }

        let notional = Decimal::from(order.quantity) * fill_price;
        match order.side {
            Side::Buy => ledger.cash_balance -= notional,
            Side::Sell => ledger.cash_balance += notional,
        }

        let remove_position = ledger
            .positions
            .get(&order.symbol)
            .is_some_and(Position::is_flat);
        if remove_position {
            ledger.positions.remove(&order.symbol);
        }

        if let Some(stored) = ledger.orders.get_mut(&broker_order_id) {
            if stored.apply_fill(stored.quantity, fill_price, now).is_ok() {
                info!(%broker_order_id, price = %fill_price, "mock order filled");
            }
        }
    }
}

#[async_trait]
impl BrokerAdapter for MockBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.connected.store(true, Ordering::SeqCst);
        info!("mock broker connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("mock broker disconnected");
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn place_order(&self, order: &Order) -> Result<BrokerOrderId, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("not connected".into()));
        }

        if self.config.rejection_rate > 0.0
            && rand::rng().random::<f64>() < self.config.rejection_rate
        {
            return Err(BrokerError::OrderRejected(
                "insufficient buying power".into(),
            ));
        }

        let broker_order_id = {
            let mut ledger = self.ledger.lock();
            ledger.order_sequence += 1;
            let broker_order_id = BrokerOrderId::new(format!(
                "MOCK_{}_{:06}",
                Utc::now().format("%Y%m%d"),
                ledger.order_sequence
            ));

            let mut accepted = order.clone();
            accepted.submitted_at = Some(Utc::now());
            accepted.status = OrderStatus::Accepted;
            ledger.orders.insert(broker_order_id.clone(), accepted);
            broker_order_id
        };

        info!(
            %broker_order_id,
            side = %order.side,
            quantity = order.quantity,
            symbol = %order.symbol,
            "mock order placed"
        );

        let broker = self.clone();
        let delayed = broker_order_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(broker.fill_delay()).await;
            broker.simulate_fill(delayed);
        });

        Ok(broker_order_id)
    }

    async fn cancel_order(&self, broker_order_id: &BrokerOrderId) -> Result<bool, BrokerError> {
        let mut ledger = self.ledger.lock();
        let Some(order) = ledger.orders.get_mut(broker_order_id) else {
            return Ok(false);
        };
        if order.status.is_terminal() {
            return Ok(false);
        }

        order.status = OrderStatus::Canceled;
        order.canceled_at = Some(Utc::now());
        info!(%broker_order_id, "mock order canceled");
        Ok(true)
    }

    async fn order_status(
        &self,
        broker_order_id: &BrokerOrderId,
    ) -> Result<OrderStatusReport, BrokerError> {
        let ledger = self.ledger.lock();
        let order = ledger
            .orders
            .get(broker_order_id)
            .ok_or_else(|| BrokerError::UnknownOrder(broker_order_id.clone()))?;

        Ok(OrderStatusReport {
            broker_order_id: broker_order_id.clone(),
            order_id: order.id.clone(),
            status: order.status,
            filled_quantity: order.filled_quantity,
            avg_fill_price: order.avg_fill_price,
            updated_at: Utc::now(),
        })
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(self.ledger.lock().positions.values().cloned().collect())
    }

    async fn account(&self) -> Result<Account, BrokerError> {
        let ledger = self.ledger.lock();
        let stock_value: Decimal = ledger
            .positions
            .values()
            .map(Position::market_value)
            .sum();

        Ok(Account {
            account_id: self.account_id.clone(),
            cash_balance: ledger.cash_balance,
            available_cash: ledger.cash_balance,
            stock_value,
        })
    }

    async fn subscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), BrokerError> {
        let mut ledger = self.ledger.lock();
        ledger.subscriptions.extend(symbols.iter().cloned());
        info!(count = symbols.len(), "subscribed to quotes");
        Ok(())
    }

    async fn unsubscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), BrokerError> {
        let mut ledger = self.ledger.lock();
        for symbol in symbols {
            ledger.subscriptions.remove(symbol);
        }
        Ok(())
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>, BrokerError> {
        let ledger = self.ledger.lock();
        let Some(price) = ledger.market_prices.get(symbol).copied() else {
            return Ok(None);
        };

        Ok(Some(Quote {
            symbol: symbol.clone(),
            price,
            bid: None,
            ask: None,
            volume: 1_000_000,
            amount: None,
            high: price,
            low: price,
            open: price,
            prev_close: price,
            timestamp: Utc::now(),
        }))
    }
}
