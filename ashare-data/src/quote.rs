use ashare_instrument::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of the latest trade for one symbol. Mutable upstream; last writer wins.
///
/// Serialized field names follow the canonical realtime record of the crawler interfaces
/// (`current_price`, `previous_close`, `turnover`, ...).
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    #[serde(rename = "current_price")]
    pub price: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: i64,
    #[serde(rename = "turnover")]
    pub amount: Option<Decimal>,
    pub high: Decimal,
    pub low: Decimal,
    pub open: Decimal,
    #[serde(rename = "previous_close")]
    pub prev_close: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Intraday change versus the previous close, as a fraction.
    pub fn change_pct(&self) -> Option<Decimal> {
        if self.prev_close.is_zero() {
            return None;
        }
        Some((self.price - self.prev_close) / self.prev_close)
    }
}
