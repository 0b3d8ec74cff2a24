use crate::{
    error::EngineError,
    risk::{AccountView, RiskManager},
    strategy::{Signal, SignalKind},
};
use ashare_execution::{
    broker::BrokerAdapter,
    error::ExecutionError,
    manager::OrderManager,
    order::{AccountId, Order, OrderId, OrderType},
};
use ashare_instrument::Side;
use rust_decimal::{prelude::FromPrimitive, prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Configuration for constructing a [`SignalExecutor`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalExecutorConfig {
    /// Cap on one position as a fraction of available cash when sizing buys.
    pub max_position_pct: Decimal,
    /// Order type used for generated orders. Limit orders peg to the quote price.
    pub order_type: OrderType,
}

impl Default for SignalExecutorConfig {
    fn default() -> Self {
        Self {
            max_position_pct: Decimal::new(10, 2), // 0.10
            order_type: OrderType::Market,
        }
    }
}

/// Bridges signal semantics to order semantics in live trading.
///
/// Every decision re-reads account, positions and the latest quote from the broker - remote
/// state is never cached across signals. Risk-gated orders are handed to the
/// [`OrderManager`]; rejected orders come back as terminal snapshots so the engine can
/// publish them.
pub struct SignalExecutor {
    account: AccountId,
    broker: Arc<dyn BrokerAdapter>,
    orders: Arc<OrderManager>,
    risk: RiskManager,
    config: SignalExecutorConfig,
    board_lot: i64,
}

impl std::fmt::Debug for SignalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalExecutor")
            .field("account", &self.account)
            .field("config", &self.config)
            .finish()
    }
}

impl SignalExecutor {
    pub fn new(
        account: AccountId,
        broker: Arc<dyn BrokerAdapter>,
        orders: Arc<OrderManager>,
        risk: RiskManager,
        config: SignalExecutorConfig,
    ) -> Self {
        Self {
            account,
            broker,
            orders,
            risk,
            config,
            board_lot: 100,
        }
    }

    /// Execute one signal. Returns the submitted (or rejected) order snapshot, or `None`
    /// when the signal converts to nothing.
    pub async fn execute(&self, signal: &Signal) -> Result<Option<Order>, EngineError> {
        if signal.kind == SignalKind::Hold {
            return Ok(None);
        }

        let Some(quote) = self.broker.quote(&signal.symbol).await? else {
            warn!(symbol = %signal.symbol, "no quote available, dropping signal");
            return Ok(None);
        };
        let price = quote.price;

        let account = self.broker.account().await?;
        let positions = self.broker.positions().await?;
        let position = positions
            .iter()
            .find(|position| position.symbol == signal.symbol);

        let strength = Decimal::from_f64(signal.strength.value()).unwrap_or(Decimal::ONE);
        let (side, quantity) = match signal.kind {
            SignalKind::Buy => {
                let budget = account.available_cash * self.config.max_position_pct * strength;
                let quantity = (budget / price)
                    .trunc()
                    .to_i64()
                    .map(|raw| raw / self.board_lot * self.board_lot)
                    .unwrap_or(0);
                (Side::Buy, quantity)
            }
            SignalKind::Sell => {
                let held = position.map(|position| position.quantity).unwrap_or(0);
                if held <= 0 {
                    info!(symbol = %signal.symbol, "no position to sell");
                    return Ok(None);
                }
                let quantity = (Decimal::from(held) * strength)
                    .trunc()
                    .to_i64()
                    .map(|raw| raw / self.board_lot * self.board_lot)
                    .unwrap_or(0);
                (Side::Sell, quantity)
            }
            SignalKind::Hold => unreachable!("handled above"),
        };

        if quantity < self.board_lot {
            info!(symbol = %signal.symbol, quantity, "signal sized below one lot");
            return Ok(None);
        }

        let order_id = OrderId::new(format!("LIVE-{}", Uuid::new_v4().simple()));
        let mut order = match self.config.order_type {
            OrderType::Market => Order::market(
                order_id,
                self.account.clone(),
                signal.symbol.clone(),
                side,
                quantity,
                chrono::Utc::now(),
            ),
            OrderType::Limit => Order::limit(
                order_id,
                self.account.clone(),
                signal.symbol.clone(),
                side,
                quantity,
                price,
                chrono::Utc::now(),
            ),
        };

        let view = AccountView {
            total_assets: account.total_assets(),
            available_cash: account.available_cash,
            stock_value: account.stock_value,
            position_quantity: position.map(|position| position.quantity).unwrap_or(0),
            position_available: position
                .map(|position| position.available_quantity)
                .unwrap_or(0),
            last_price: Some(price),
        };

        if let Err(breach) = self.risk.check_order(&order, &view) {
            warn!(order_id = %order.id, %breach, "pre-trade risk rejected order");
            order
                .reject(breach.to_string())
                .map_err(ExecutionError::Validation)?;
            return Ok(Some(order));
        }

        match self.orders.submit(order.clone()).await {
            Ok(broker_order_id) => {
                info!(
                    order_id = %order.id,
                    %broker_order_id,
                    %side,
                    quantity,
                    symbol = %signal.symbol,
                    "order submitted from signal"
                );
                Ok(self.orders.get(&order.id).or(Some(order)))
            }
            Err(ExecutionError::Broker(error)) => {
                warn!(order_id = %order.id, %error, "broker refused order");
                Ok(self.orders.get(&order.id).or(Some(order)))
            }
            Err(error) => Err(EngineError::Execution(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskConfig;
    use crate::strategy::Signal;
    use ashare_execution::{
        broker::mock::{MockBroker, MockBrokerConfig},
        cost::CostModel,
        manager::OrderManagerConfig,
        order::OrderStatus,
        store::OrderStore,
    };
    use ashare_instrument::symbol::Symbol;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::new("600036.SH").unwrap()
    }

    async fn executor_over_mock() -> (SignalExecutor, Arc<MockBroker>) {
        let broker = Arc::new(MockBroker::new(MockBrokerConfig::default()));
        broker.connect().await.unwrap();

        let store = Arc::new(OrderStore::in_memory().unwrap());
        let (orders, _events) = OrderManager::new(
            Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
            store,
            CostModel::default(),
            OrderManagerConfig::default(),
        );

        let executor = SignalExecutor::new(
            AccountId::new("LIVE"),
            Arc::clone(&broker) as Arc<dyn BrokerAdapter>,
            orders,
            RiskManager::new(RiskConfig::default()),
            SignalExecutorConfig::default(),
        );
        (executor, broker)
    }

    #[tokio::test]
    async fn missing_quote_drops_the_signal() {
        let (executor, _broker) = executor_over_mock().await;
        let signal = Signal::new(Utc::now(), symbol(), SignalKind::Buy, 1.0);
        assert!(executor.execute(&signal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn buy_signal_submits_a_sized_market_order() {
        let (executor, broker) = executor_over_mock().await;
        broker.set_market_price(&symbol(), dec!(40.00));

        let signal = Signal::new(Utc::now(), symbol(), SignalKind::Buy, 1.0);
        let order = executor.execute(&signal).await.unwrap().unwrap();

        assert_eq!(order.side, Side::Buy);
        // 1_000_000 * 10% / 40 = 2_500 shares
        assert_eq!(order.quantity, 2_500);
        assert_eq!(order.status, OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn sell_without_position_converts_to_nothing() {
        let (executor, broker) = executor_over_mock().await;
        broker.set_market_price(&symbol(), dec!(40.00));

        let signal = Signal::new(Utc::now(), symbol(), SignalKind::Sell, 1.0);
        assert!(executor.execute(&signal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn risk_breach_returns_a_rejected_snapshot() {
        let (executor, broker) = executor_over_mock().await;
        broker.set_market_price(&symbol(), dec!(40.00));

        let tight = SignalExecutor {
            risk: RiskManager::new(RiskConfig {
                max_order_value: dec!(100),
                ..RiskConfig::default()
            }),
            ..executor
        };

        let signal = Signal::new(Utc::now(), symbol(), SignalKind::Buy, 1.0);
        let order = tight.execute(&signal).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(order.reject_reason.is_some());
    }
}
