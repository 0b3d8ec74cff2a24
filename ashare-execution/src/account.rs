use crate::order::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker account snapshot.
///
/// `available_cash` excludes cash reserved for unfilled buy orders; `total_assets` is always
/// `cash_balance + stock_value`. Treated as remote state - re-read before every decision,
/// never cached across operations.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Account {
    pub account_id: AccountId,
    pub cash_balance: Decimal,
    pub available_cash: Decimal,
    pub stock_value: Decimal,
}

impl Account {
    pub fn total_assets(&self) -> Decimal {
        self.cash_balance + self.stock_value
    }
}
