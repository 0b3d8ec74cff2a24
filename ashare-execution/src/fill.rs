use crate::order::OrderId;
use ashare_instrument::symbol::Symbol;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A (possibly partial) execution of an order.
///
/// Fills are monotonic: the parent order's filled quantity only ever grows, and each fill
/// re-weights its average fill price. The side is derived through the parent order rather
/// than duplicated here.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Constructor)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub quantity: i64,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Gross traded value, excluding commission.
    pub fn gross_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}
