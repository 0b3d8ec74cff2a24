use crate::order::AccountId;
use ashare_instrument::symbol::Symbol;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Holding in one symbol, with the T+1 settlement lockbox.
///
/// Buys on day D raise `quantity` immediately but join `available_quantity` only once a later
/// session date is observed ([`Self::roll_settlement`]). Sells consume `available_quantity`.
/// Invariant: `available_quantity <= quantity`.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Position {
    pub account: AccountId,
    pub symbol: Symbol,
    pub quantity: i64,
    pub available_quantity: i64,
    pub avg_cost: Decimal,
    pub last_price: Option<Decimal>,
    /// Shares bought on `locked_date`, not yet sellable.
    locked_quantity: i64,
    locked_date: Option<NaiveDate>,
}

impl Position {
    pub fn new(account: AccountId, symbol: Symbol) -> Self {
        Self {
            account,
            symbol,
            quantity: 0,
            available_quantity: 0,
            avg_cost: Decimal::ZERO,
            last_price: None,
            locked_quantity: 0,
            locked_date: None,
        }
    }

    /// Release the lockbox when a later trading day is observed. Call with the current
    /// session date before reading `available_quantity`.
    pub fn roll_settlement(&mut self, today: NaiveDate) {
        if let Some(locked_date) = self.locked_date {
            if today > locked_date {
                self.available_quantity += self.locked_quantity;
                self.locked_quantity = 0;
                self.locked_date = None;
            }
        }
    }

    /// Apply a buy fill executed on `trade_date`: quantity and weighted-average cost update
    /// immediately, the bought shares stay locked until the next session.
    pub fn apply_buy(&mut self, quantity: i64, price: Decimal, trade_date: NaiveDate) {
        self.roll_settlement(trade_date);

        let held = Decimal::from(self.quantity);
        let bought = Decimal::from(quantity);
        let total_cost = self.avg_cost * held + price * bought;
        self.quantity += quantity;
        self.avg_cost = if self.quantity > 0 {
            total_cost / Decimal::from(self.quantity)
        } else {
            Decimal::ZERO
        };

        self.locked_quantity += quantity;
        self.locked_date = Some(trade_date);
        self.last_price = Some(price);
    }

    /// Apply a sell fill. Returns `false` without mutating when `quantity` exceeds the
    /// available (settled) shares on `trade_date`.
    pub fn apply_sell(&mut self, quantity: i64, price: Decimal, trade_date: NaiveDate) -> bool {
        self.roll_settlement(trade_date);

        if quantity > self.available_quantity {
            return false;
        }

        self.quantity -= quantity;
        self.available_quantity -= quantity;
        self.last_price = Some(price);
        if self.quantity == 0 {
            self.avg_cost = Decimal::ZERO;
        }
        true
    }

    pub fn mark(&mut self, price: Decimal) {
        self.last_price = Some(price);
    }

    pub fn market_value(&self) -> Decimal {
        let price = self.last_price.unwrap_or(self.avg_cost);
        Decimal::from(self.quantity) * price
    }

    pub fn unrealized_pnl(&self) -> Option<Decimal> {
        let price = self.last_price?;
        Some(Decimal::from(self.quantity) * (price - self.avg_cost))
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position() -> Position {
        Position::new(AccountId::new("TEST"), Symbol::new("600036.SH").unwrap())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn same_day_buy_is_not_sellable() {
        let mut position = position();
        position.apply_buy(1_000, dec!(40.00), date(2));

        assert_eq!(position.quantity, 1_000);
        assert_eq!(position.available_quantity, 0);
        assert!(!position.apply_sell(100, dec!(41.00), date(2)));
        assert_eq!(position.quantity, 1_000);
    }

    #[test]
    fn lockbox_releases_next_session() {
        let mut position = position();
        position.apply_buy(1_000, dec!(40.00), date(2));

        position.roll_settlement(date(3));
        assert_eq!(position.available_quantity, 1_000);
        assert!(position.apply_sell(400, dec!(41.00), date(3)));
        assert_eq!(position.quantity, 600);
        assert_eq!(position.available_quantity, 600);
    }

    #[test]
    fn available_never_exceeds_quantity() {
        let mut position = position();
        position.apply_buy(500, dec!(10), date(2));
        position.roll_settlement(date(3));
        position.apply_buy(300, dec!(12), date(3));

        assert_eq!(position.quantity, 800);
        assert_eq!(position.available_quantity, 500);
        assert!(position.available_quantity <= position.quantity);

        position.roll_settlement(date(4));
        assert_eq!(position.available_quantity, 800);
    }

    #[test]
    fn buys_volume_weight_the_average_cost() {
        let mut position = position();
        position.apply_buy(100, dec!(10.00), date(2));
        position.apply_buy(300, dec!(14.00), date(2));
        // (100*10 + 300*14) / 400 = 13
        assert_eq!(position.avg_cost, dec!(13));
        assert_eq!(position.quantity, 400);
    }
}
