use crate::{
    broker::{BrokerAdapter, BrokerError, OrderStatusReport},
    cost::CostModel,
    error::ExecutionError,
    fill::Fill,
    order::{BrokerOrderId, Order, OrderId, OrderStatus},
    store::OrderStore,
};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Events published by the [`OrderManager`]'s background tasks. The engine consumes these and
/// re-exposes them on its bus; background tasks never mutate engine state directly.
#[derive(Clone, Debug)]
pub enum ExecutionEvent {
    Fill(Fill),
    /// Immutable snapshot published on every status change.
    OrderUpdate(Order),
}

/// Configuration for the [`OrderManager`].
#[derive(Copy, Clone, Debug)]
pub struct OrderManagerConfig {
    /// Token-bucket ceiling on order submissions. Excess submits wait, they are never
    /// silently dropped.
    pub max_orders_per_second: u32,
    /// Broker status poll cadence for the per-order monitor.
    pub poll_interval: Duration,
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            max_orders_per_second: 10,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Sliding-window rate limiter for order submission.
#[derive(Debug)]
struct SubmitLimiter {
    max_per_second: u32,
    window: Mutex<VecDeque<Instant>>,
}

impl SubmitLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait for a submission slot. Blocks the caller rather than dropping the submit.
    async fn acquire(&self) {
        if self.max_per_second == 0 {
            return;
        }

        loop {
            let wait = {
                let mut window = self.window.lock();
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|at| now.duration_since(*at) >= Duration::from_secs(1))
                {
                    window.pop_front();
                }

                if window.len() < self.max_per_second as usize {
                    window.push_back(now);
                    None
                } else {
                    window
                        .front()
                        .map(|oldest| *oldest + Duration::from_secs(1) - now)
                }
            };

            match wait {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}

/// Owns the order state machine and the broker round-trip.
///
/// Orders live here from submission to a terminal state. Every transition is written through
/// to the [`OrderStore`]; on startup [`Self::restore`] reloads non-terminal orders and
/// resumes their fill monitors. Downstream components observe orders exclusively through
/// [`ExecutionEvent`] snapshots.
pub struct OrderManager {
    broker: Arc<dyn BrokerAdapter>,
    store: Arc<OrderStore>,
    cost_model: CostModel,
    config: OrderManagerConfig,
    orders: Mutex<FnvHashMap<OrderId, (Order, Option<BrokerOrderId>)>>,
    event_tx: mpsc::UnboundedSender<ExecutionEvent>,
    limiter: SubmitLimiter,
    running: AtomicBool,
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("config", &self.config)
            .field("orders", &self.orders.lock().len())
            .finish()
    }
}

impl OrderManager {
    /// Construct the manager and the receiving half of its event channel.
    pub fn new(
        broker: Arc<dyn BrokerAdapter>,
        store: Arc<OrderStore>,
        cost_model: CostModel,
        config: OrderManagerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            broker,
            store,
            cost_model,
            config,
            orders: Mutex::new(FnvHashMap::default()),
            event_tx,
            limiter: SubmitLimiter::new(config.max_orders_per_second),
            running: AtomicBool::new(true),
        });
        (manager, event_rx)
    }

    /// Reload non-terminal orders from the store and resume their monitors. Call once on
    /// startup, before accepting new submissions.
    pub fn restore(self: &Arc<Self>) -> Result<usize, ExecutionError> {
        let pending = self.store.load_non_terminal()?;
        let count = pending.len();

        for (order, broker_order_id) in pending {
            let order_id = order.id.clone();
            self.orders
                .lock()
                .insert(order_id.clone(), (order, broker_order_id.clone()));

            match broker_order_id {
                Some(broker_order_id) => self.spawn_monitor(order_id, broker_order_id),
                None => warn!(
                    %order_id,
                    "restored order was never submitted to the broker, leaving as-is"
                ),
            }
        }

        if count > 0 {
            info!(count, "restored non-terminal orders");
        }
        Ok(count)
    }

    /// Submit an order through the full lifecycle: validate, persist, place with the broker,
    /// start monitoring. Returns the broker order id on acceptance.
    pub async fn submit(self: &Arc<Self>, mut order: Order) -> Result<BrokerOrderId, ExecutionError> {
        self.limiter.acquire().await;

        order.validate()?;
        order.transition(OrderStatus::Validated)?;
        self.store.upsert(&order, None)?;

        match self.broker.place_order(&order).await {
            Ok(broker_order_id) => {
                order.submitted_at = Some(chrono::Utc::now());
                order.transition(OrderStatus::Submitted)?;
                self.store.upsert(&order, Some(&broker_order_id))?;

                let order_id = order.id.clone();
                self.publish(ExecutionEvent::OrderUpdate(order.clone()));
                self.orders
                    .lock()
                    .insert(order_id.clone(), (order, Some(broker_order_id.clone())));

                self.spawn_monitor(order_id, broker_order_id.clone());
                Ok(broker_order_id)
            }
            Err(BrokerError::OrderRejected(reason)) => {
                order.reject(reason.clone())?;
                self.store.upsert(&order, None)?;
                self.publish(ExecutionEvent::OrderUpdate(order.clone()));
                self.orders.lock().insert(order.id.clone(), (order, None));
                Err(ExecutionError::Broker(BrokerError::OrderRejected(reason)))
            }
            Err(error) => {
                // Connection-class failure: the order stays Validated for a caller retry.
                self.store.upsert(&order, None)?;
                Err(ExecutionError::Broker(error))
            }
        }
    }

    /// Cancel an order. Only legal in cancelable states; idempotent on repeat.
    pub async fn cancel(self: &Arc<Self>, order_id: &OrderId) -> Result<bool, ExecutionError> {
        let broker_order_id = {
            let mut orders = self.orders.lock();
            let (order, broker_order_id) = orders
                .get_mut(order_id)
                .ok_or_else(|| ExecutionError::UnknownOrder(order_id.clone()))?;

            match order.status {
                OrderStatus::Canceled => return Ok(true),
                OrderStatus::Canceling => broker_order_id.clone(),
                status if status.is_cancelable() => {
                    order.transition(OrderStatus::Canceling)?;
                    self.store.upsert(order, broker_order_id.as_ref())?;
                    broker_order_id.clone()
                }
                _ => return Err(ExecutionError::NotCancelable(order_id.clone())),
            }
        };

        let Some(broker_order_id) = broker_order_id else {
            return Ok(false);
        };

        let confirmed = self.broker.cancel_order(&broker_order_id).await?;
        if confirmed {
            let mut orders = self.orders.lock();
            if let Some((order, broker_order_id)) = orders.get_mut(order_id) {
                // The monitor may have already observed the cancellation.
                if !order.status.is_terminal() {
                    order.transition(OrderStatus::Canceled)?;
                    order.canceled_at = Some(chrono::Utc::now());
                    self.store.upsert(order, broker_order_id.as_ref())?;
                    self.publish(ExecutionEvent::OrderUpdate(order.clone()));
                    info!(%order_id, "order canceled");
                }
            }
        }
        Ok(confirmed)
    }

    /// Immutable snapshot of one order.
    pub fn get(&self, order_id: &OrderId) -> Option<Order> {
        self.orders
            .lock()
            .get(order_id)
            .map(|(order, _)| order.clone())
    }

    /// Snapshots of every non-terminal order.
    pub fn pending_orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .values()
            .filter(|(order, _)| !order.status.is_terminal())
            .map(|(order, _)| order.clone())
            .collect()
    }

    /// Stop all monitor loops at their next poll.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait until every tracked order reaches a terminal state, up to `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.pending_orders().is_empty() {
            if Instant::now() >= deadline {
                warn!(
                    pending = self.pending_orders().len(),
                    "drain timed out with orders still in flight"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn publish(&self, event: ExecutionEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("execution event receiver dropped");
        }
    }

    fn spawn_monitor(self: &Arc<Self>, order_id: OrderId, broker_order_id: BrokerOrderId) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.monitor(order_id, broker_order_id).await;
        });
    }

    /// Poll the broker until the order reaches a terminal state, publishing fills and status
    /// changes along the way. One bad poll never kills the loop.
    async fn monitor(self: Arc<Self>, order_id: OrderId, broker_order_id: BrokerOrderId) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                debug!(%order_id, "monitor stopping on shutdown");
                return;
            }

            let report = match self.broker.order_status(&broker_order_id).await {
                Ok(report) => report,
                Err(error) if error.is_retryable() => {
                    warn!(%order_id, %error, "status poll failed, will retry");
                    continue;
                }
                Err(error) => {
                    error!(%order_id, %error, "status poll failed fatally, monitor stopping");
                    return;
                }
            };

            match self.sync_from_report(&order_id, &report) {
                Ok(true) => return,  // terminal
                Ok(false) => {}
                Err(error) => {
                    error!(%order_id, %error, "failed to apply broker report");
                }
            }
        }
    }

    /// Reconcile the owned order with a broker report. Returns `Ok(true)` once the order is
    /// terminal.
    fn sync_from_report(
        &self,
        order_id: &OrderId,
        report: &OrderStatusReport,
    ) -> Result<bool, ExecutionError> {
        let mut fills = Vec::new();
        let mut updates = Vec::new();
        let terminal;

        {
            let mut orders = self.orders.lock();
            let (order, broker_order_id) = orders
                .get_mut(order_id)
                .ok_or_else(|| ExecutionError::UnknownOrder(order_id.clone()))?;
            let status_before = order.status;

            // Broker saw the order before we observed acceptance.
            if order.status == OrderStatus::Submitted
                && matches!(
                    report.status,
                    OrderStatus::Accepted | OrderStatus::PartiallyFilled | OrderStatus::Filled
                )
            {
                order.transition(OrderStatus::Accepted)?;
            }

            if report.filled_quantity > order.filled_quantity {
                let delta = report.filled_quantity - order.filled_quantity;
                if let Some(price) = incremental_fill_price(order, report, delta) {
                    let at = report.updated_at;
                    order.apply_fill(delta, price, at)?;
                    let commission = self.cost_model.cost(delta, price, order.side).commission;
                    fills.push(Fill::new(
                        order.id.clone(),
                        order.symbol.clone(),
                        delta,
                        price,
                        commission,
                        at,
                    ));
                } else {
                    warn!(%order_id, "broker reported fills without a price, skipping");
                }
            }

            match report.status {
                OrderStatus::Canceled if !order.status.is_terminal() => {
                    if order.status != OrderStatus::Canceling {
                        order.transition(OrderStatus::Canceling)?;
                    }
                    order.transition(OrderStatus::Canceled)?;
                    order.canceled_at = Some(report.updated_at);
                }
                OrderStatus::Rejected if !order.status.is_terminal() => {
                    order.reject("rejected by broker")?;
                }
                OrderStatus::Expired if !order.status.is_terminal() => {
                    order.transition(OrderStatus::Expired)?;
                }
                _ => {}
            }

            if order.status != status_before {
                self.store.upsert(order, broker_order_id.as_ref())?;
                updates.push(order.clone());
            }
            terminal = order.status.is_terminal();
        }

        for fill in fills {
            self.publish(ExecutionEvent::Fill(fill));
        }
        for update in updates {
            self.publish(ExecutionEvent::OrderUpdate(update));
        }

        if terminal {
            info!(%order_id, "order reached terminal state");
        }
        Ok(terminal)
    }
}

/// Price of the incremental fill implied by the report's volume-weighted average.
fn incremental_fill_price(
    order: &Order,
    report: &OrderStatusReport,
    delta: i64,
) -> Option<Decimal> {
    let new_avg = report.avg_fill_price?;
    let old_total = order.avg_fill_price.unwrap_or(Decimal::ZERO)
        * Decimal::from(order.filled_quantity);
    let new_total = new_avg * Decimal::from(report.filled_quantity);
    Some((new_total - old_total) / Decimal::from(delta))
}
