use ashare_instrument::{symbol::Symbol, Side};
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Internal order identifier, assigned at creation.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Identifier assigned by the broker on acceptance.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct BrokerOrderId(pub SmolStr);

impl BrokerOrderId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Trading account identifier.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct AccountId(pub SmolStr);

impl AccountId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub enum TimeInForce {
    Day,
    ImmediateOrCancel,
    GoodTillCancel,
}

/// Order lifecycle states.
///
/// ```text
/// Created -> Validated -> Submitted -> Accepted --> PartiallyFilled --> Filled
///                 |            |           |                |
///                 v            v           v                v
///              Rejected     Rejected    Canceling  -->   Canceled
/// ```
///
/// `Filled`, `Canceled`, `Rejected` and `Expired` are terminal. Only `Submitted`, `Accepted`
/// and `PartiallyFilled` are cancelable.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub enum OrderStatus {
    Created,
    Validated,
    Submitted,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceling,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Accepted | OrderStatus::PartiallyFilled
        )
    }

    /// Legal state-machine successors. Terminal states have none; intermediate states cannot
    /// be skipped (eg/ `Created -> Filled` is forbidden).
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, Validated)
                | (Created, Rejected)
                | (Validated, Submitted)
                | (Validated, Rejected)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Submitted, Canceling)
                | (Submitted, Expired)
                | (Accepted, PartiallyFilled)
                | (Accepted, Filled)
                | (Accepted, Canceling)
                | (Accepted, Rejected)
                | (Accepted, Expired)
                | (PartiallyFilled, PartiallyFilled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Canceling)
                | (PartiallyFilled, Expired)
                | (Canceling, Canceled)
                | (Canceling, Filled)
                | (Canceling, PartiallyFilled)
        )
    }
}

/// All possible order validation and transition errors.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OrderError {
    #[error("order quantity must be positive: {0}")]
    NonPositiveQuantity(i64),

    #[error("order quantity must be a multiple of the {lot}-share board lot: {quantity}")]
    OddLot { quantity: i64, lot: i64 },

    #[error("limit order requires a price")]
    LimitWithoutPrice,

    #[error("order price must be positive: {0}")]
    NonPositivePrice(Decimal),

    #[error("illegal order state transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("fill quantity {fill} exceeds remaining {remaining}")]
    Overfill { fill: i64, remaining: i64 },
}

/// An order. Owned by the [`OrderManager`](crate::manager::OrderManager) from submission until
/// a terminal state; every other component only ever sees cloned snapshots published through
/// events.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub account: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub filled_quantity: i64,
    pub avg_fill_price: Option<Decimal>,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

impl Order {
    const BOARD_LOT: i64 = 100;

    /// New market order in the `Created` state.
    pub fn market(
        id: OrderId,
        account: AccountId,
        symbol: Symbol,
        side: Side,
        quantity: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(id, account, symbol, side, OrderType::Market, quantity, None, created_at)
    }

    /// New limit order in the `Created` state.
    #[allow(clippy::too_many_arguments)]
    pub fn limit(
        id: OrderId,
        account: AccountId,
        symbol: Symbol,
        side: Side,
        quantity: i64,
        price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            id,
            account,
            symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            created_at,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        id: OrderId,
        account: AccountId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: i64,
        price: Option<Decimal>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            symbol,
            side,
            order_type,
            quantity,
            price,
            time_in_force: TimeInForce::Day,
            status: OrderStatus::Created,
            filled_quantity: 0,
            avg_fill_price: None,
            reject_reason: None,
            created_at,
            submitted_at: None,
            filled_at: None,
            canceled_at: None,
            metadata: None,
        }
    }

    /// Validate the order invariants: positive lot-aligned quantity, limit orders priced,
    /// positive prices. Strict about odd lots, including sells.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity <= 0 {
            return Err(OrderError::NonPositiveQuantity(self.quantity));
        }
        if self.quantity % Self::BOARD_LOT != 0 {
            return Err(OrderError::OddLot {
                quantity: self.quantity,
                lot: Self::BOARD_LOT,
            });
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => return Err(OrderError::LimitWithoutPrice),
            (_, Some(price)) if price <= Decimal::ZERO => {
                return Err(OrderError::NonPositivePrice(price))
            }
            _ => {}
        }
        Ok(())
    }

    pub fn remaining_quantity(&self) -> i64 {
        self.quantity - self.filled_quantity
    }

    /// Transition the state machine, rejecting moves the machine does not allow.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Apply a (partial) fill: grow `filled_quantity` monotonically, re-weight
    /// `avg_fill_price` by volume, and step the state machine to `PartiallyFilled` or
    /// `Filled`.
    pub fn apply_fill(
        &mut self,
        quantity: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if quantity <= 0 || quantity > self.remaining_quantity() {
            return Err(OrderError::Overfill {
                fill: quantity,
                remaining: self.remaining_quantity(),
            });
        }

        let filled_before = Decimal::from(self.filled_quantity);
        let filled_now = Decimal::from(quantity);
        let weighted = match self.avg_fill_price {
            Some(avg) => (avg * filled_before + price * filled_now) / (filled_before + filled_now),
            None => price,
        };

        self.filled_quantity += quantity;
        self.avg_fill_price = Some(weighted);

        let next = if self.filled_quantity == self.quantity {
            self.filled_at = Some(at);
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next)
    }

    /// Move the order to `Rejected`, recording the reason. Legal from any pre-acceptance
    /// state and from `Accepted` (broker-side rejection).
    pub fn reject<S: Into<String>>(&mut self, reason: S) -> Result<(), OrderError> {
        self.transition(OrderStatus::Rejected)?;
        self.reject_reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(quantity: i64) -> Order {
        Order::market(
            OrderId::new("O-1"),
            AccountId::new("TEST"),
            Symbol::new("600036.SH").unwrap(),
            Side::Buy,
            quantity,
            Utc::now(),
        )
    }

    #[test]
    fn validate_rejects_odd_lot_and_non_positive_quantities() {
        assert!(matches!(order(0).validate(), Err(OrderError::NonPositiveQuantity(0))));
        assert!(matches!(
            order(150).validate(),
            Err(OrderError::OddLot { quantity: 150, .. })
        ));
        assert!(order(200).validate().is_ok());
    }

    #[test]
    fn validate_requires_price_on_limit_orders() {
        let mut limit = order(100);
        limit.order_type = OrderType::Limit;
        assert!(matches!(limit.validate(), Err(OrderError::LimitWithoutPrice)));

        limit.price = Some(dec!(40.00));
        assert!(limit.validate().is_ok());
    }

    #[test]
    fn lifecycle_cannot_skip_states() {
        let mut order = order(100);
        assert!(matches!(
            order.transition(OrderStatus::Filled),
            Err(OrderError::IllegalTransition { .. })
        ));

        order.transition(OrderStatus::Validated).unwrap();
        order.transition(OrderStatus::Submitted).unwrap();
        order.transition(OrderStatus::Accepted).unwrap();
        assert!(order.status.is_cancelable());
    }

    #[test]
    fn terminal_states_have_no_successors() {
        let mut order = order(100);
        order.transition(OrderStatus::Validated).unwrap();
        order.reject("risk: insufficient cash").unwrap();

        for next in [
            OrderStatus::Validated,
            OrderStatus::Submitted,
            OrderStatus::Filled,
            OrderStatus::Canceled,
        ] {
            assert!(matches!(
                order.clone().transition(next),
                Err(OrderError::IllegalTransition { .. })
            ));
        }
    }

    #[test]
    fn fills_volume_weight_the_average_price() {
        let mut order = order(300);
        order.transition(OrderStatus::Validated).unwrap();
        order.transition(OrderStatus::Submitted).unwrap();
        order.transition(OrderStatus::Accepted).unwrap();

        order.apply_fill(100, dec!(10.00), Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.avg_fill_price, Some(dec!(10.00)));

        order.apply_fill(200, dec!(11.50), Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, order.quantity);
        // (100*10 + 200*11.5) / 300 = 11
        assert_eq!(order.avg_fill_price, Some(dec!(11)));
    }

    #[test]
    fn overfill_is_rejected() {
        let mut order = order(100);
        order.transition(OrderStatus::Validated).unwrap();
        order.transition(OrderStatus::Submitted).unwrap();
        order.transition(OrderStatus::Accepted).unwrap();

        assert!(matches!(
            order.apply_fill(200, dec!(10), Utc::now()),
            Err(OrderError::Overfill { .. })
        ));
    }
}
