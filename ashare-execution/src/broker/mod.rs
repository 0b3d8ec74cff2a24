use crate::{
    account::Account,
    order::{BrokerOrderId, Order, OrderId, OrderStatus},
    position::Position,
};
use ashare_data::quote::Quote;
use ashare_instrument::symbol::Symbol;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mock;

/// Broker-side error taxonomy.
///
/// `Connection` failures are retryable (background reconnect with backoff); `OrderRejected`
/// is fatal for that order only; `UnknownOrder` indicates a caller bug.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("broker connection: {0}")]
    Connection(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("unknown order id: {0}")]
    UnknownOrder(BrokerOrderId),
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Connection(_))
    }
}

/// Broker-reported status of one order.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct OrderStatusReport {
    pub broker_order_id: BrokerOrderId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: i64,
    pub avg_fill_price: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

/// Capability implemented by every broker gateway - the in-process [`mock::MockBroker`] for
/// backtest/paper flows and real-broker adapters for live flows.
///
/// Account and position state is remote: callers re-read it for every decision and never
/// cache it beyond a single operation.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Establish the connection. Idempotent.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Close the connection. Never fails.
    async fn disconnect(&self);

    async fn is_connected(&self) -> bool;

    /// Submit a validated order. Returns the broker-assigned id on acceptance.
    async fn place_order(&self, order: &Order) -> Result<BrokerOrderId, BrokerError>;

    /// Request cancellation. `Ok(true)` when the broker accepted the cancel.
    async fn cancel_order(&self, broker_order_id: &BrokerOrderId) -> Result<bool, BrokerError>;

    /// Query an order's status; errors on unknown ids.
    async fn order_status(
        &self,
        broker_order_id: &BrokerOrderId,
    ) -> Result<OrderStatusReport, BrokerError>;

    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    async fn account(&self) -> Result<Account, BrokerError>;

    async fn subscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), BrokerError>;

    async fn unsubscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), BrokerError>;

    /// Latest quote for a symbol, if the broker has one.
    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>, BrokerError>;
}
