use ashare_execution::order::Order;
use ashare_instrument::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration for the pre-trade [`RiskManager`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Cap on one position's value as a fraction of total assets.
    pub max_position_pct: Decimal,
    /// Cap on stock exposure as a fraction of total assets.
    pub max_total_exposure: Decimal,
    pub max_order_value: Decimal,
    pub min_order_value: Decimal,
    /// Conservative price assumed when neither the order nor the market provides one.
    pub fallback_price: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: Decimal::new(10, 2),   // 0.10
            max_total_exposure: Decimal::new(95, 2), // 0.95
            max_order_value: Decimal::new(1_000_000, 0),
            min_order_value: Decimal::new(1_000, 0),
            fallback_price: Decimal::new(10, 0),
        }
    }
}

/// Account state the risk gate evaluates an order against. Assembled from the portfolio in
/// backtests and from a fresh broker snapshot in live trading.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct AccountView {
    pub total_assets: Decimal,
    pub available_cash: Decimal,
    pub stock_value: Decimal,
    /// Shares currently held in the order's symbol.
    pub position_quantity: i64,
    /// Settled (sellable) shares in the order's symbol.
    pub position_available: i64,
    /// Latest known market price for the order's symbol.
    pub last_price: Option<Decimal>,
}

/// A failed risk rule. The display string is the rejection reason surfaced to the submitter
/// and the strategy.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum RiskBreach {
    #[error("order value {value} above maximum {max}")]
    OrderValueAboveMax { value: Decimal, max: Decimal },

    #[error("order value {value} below minimum {min}")]
    OrderValueBelowMin { value: Decimal, min: Decimal },

    #[error("projected position value {projected} exceeds per-position cap {cap}")]
    PositionCapExceeded { projected: Decimal, cap: Decimal },

    #[error("insufficient cash: need {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient sellable position: requested {requested}, available {available}")]
    InsufficientPosition { requested: i64, available: i64 },

    #[error("projected exposure {projected} exceeds cap {cap}")]
    ExposureCapExceeded { projected: Decimal, cap: Decimal },
}

/// Pre-trade gate: pure checks against an [`AccountView`], rejecting with a reason and never
/// mutating state.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    /// Cost buffer on buys: estimated fees on top of the notional.
    const COST_BUFFER: Decimal = Decimal::from_parts(101, 0, 0, false, 2); // 1.01

    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Run every rule against the order. `Ok(())` admits the order to execution.
    pub fn check_order(&self, order: &Order, view: &AccountView) -> Result<(), RiskBreach> {
        let price = order
            .price
            .or(view.last_price)
            .unwrap_or(self.config.fallback_price);
        let notional = Decimal::from(order.quantity) * price;

        if notional > self.config.max_order_value {
            return Err(RiskBreach::OrderValueAboveMax {
                value: notional,
                max: self.config.max_order_value,
            });
        }
        if notional < self.config.min_order_value {
            return Err(RiskBreach::OrderValueBelowMin {
                value: notional,
                min: self.config.min_order_value,
            });
        }

        match order.side {
            Side::Buy => self.check_buy(order, view, price, notional),
            Side::Sell => self.check_sell(order, view),
        }
    }

    fn check_buy(
        &self,
        order: &Order,
        view: &AccountView,
        price: Decimal,
        notional: Decimal,
    ) -> Result<(), RiskBreach> {
        let required = notional * Self::COST_BUFFER;
        if required > view.available_cash {
            return Err(RiskBreach::InsufficientCash {
                required,
                available: view.available_cash,
            });
        }

        let projected_position =
            Decimal::from(view.position_quantity + order.quantity) * price;
        let position_cap = view.total_assets * self.config.max_position_pct;
        if projected_position > position_cap {
            return Err(RiskBreach::PositionCapExceeded {
                projected: projected_position,
                cap: position_cap,
            });
        }

        if view.total_assets > Decimal::ZERO {
            let projected_exposure = (view.stock_value + notional) / view.total_assets;
            if projected_exposure > self.config.max_total_exposure {
                return Err(RiskBreach::ExposureCapExceeded {
                    projected: projected_exposure,
                    cap: self.config.max_total_exposure,
                });
            }
        }

        debug!(order_id = %order.id, %notional, "buy passed risk checks");
        Ok(())
    }

    fn check_sell(&self, order: &Order, view: &AccountView) -> Result<(), RiskBreach> {
        if order.quantity > view.position_available {
            return Err(RiskBreach::InsufficientPosition {
                requested: order.quantity,
                available: view.position_available,
            });
        }
        debug!(order_id = %order.id, "sell passed risk checks");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_execution::order::{AccountId, OrderId};
    use ashare_instrument::symbol::Symbol;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(side: Side, quantity: i64, price: Option<Decimal>) -> Order {
        let mut order = Order::market(
            OrderId::new("O-1"),
            AccountId::new("TEST"),
            Symbol::new("600036.SH").unwrap(),
            side,
            quantity,
            Utc::now(),
        );
        order.price = price;
        order
    }

    fn wealthy_view() -> AccountView {
        AccountView {
            total_assets: dec!(1000000),
            available_cash: dec!(1000000),
            stock_value: Decimal::ZERO,
            position_quantity: 0,
            position_available: 0,
            last_price: Some(dec!(40.00)),
        }
    }

    #[test]
    fn small_buy_passes_every_rule() {
        let risk = RiskManager::default();
        let result = risk.check_order(&order(Side::Buy, 1_000, None), &wealthy_view());
        assert!(result.is_ok());
    }

    #[test]
    fn buy_without_cash_is_rejected_with_a_cash_reason() {
        let risk = RiskManager::default();
        let view = AccountView {
            total_assets: dec!(1000),
            available_cash: dec!(1000),
            ..wealthy_view()
        };

        // 100 * 40 = 4000 buffered to 4040, far beyond the 1000 on hand.
        let breach = risk
            .check_order(&order(Side::Buy, 100, None), &view)
            .unwrap_err();
        assert!(matches!(breach, RiskBreach::InsufficientCash { .. }));
        assert!(breach.to_string().contains("cash"));
    }

    #[test]
    fn cash_rule_includes_the_one_percent_buffer() {
        let risk = RiskManager::default();
        // 1_000 shares at 40 = 40_000; buffered requirement 40_400.
        let view = AccountView {
            total_assets: dec!(1000000),
            available_cash: dec!(40200),
            ..wealthy_view()
        };

        let breach = risk
            .check_order(&order(Side::Buy, 1_000, None), &view)
            .unwrap_err();
        assert!(matches!(breach, RiskBreach::InsufficientCash { .. }));
        assert!(breach.to_string().contains("cash"));
    }

    #[test]
    fn order_value_band_is_enforced_both_ways() {
        let risk = RiskManager::default();
        let view = wealthy_view();

        let breach = risk
            .check_order(&order(Side::Buy, 100_000, Some(dec!(40.00))), &view)
            .unwrap_err();
        assert!(matches!(breach, RiskBreach::OrderValueAboveMax { .. }));

        let breach = risk
            .check_order(&order(Side::Buy, 100, Some(dec!(5.00))), &view)
            .unwrap_err();
        assert!(matches!(breach, RiskBreach::OrderValueBelowMin { .. }));
    }

    #[test]
    fn sell_cannot_exceed_settled_position() {
        let risk = RiskManager::default();
        let view = AccountView {
            position_quantity: 1_000,
            position_available: 400,
            ..wealthy_view()
        };

        let breach = risk
            .check_order(&order(Side::Sell, 500, None), &view)
            .unwrap_err();
        assert!(matches!(
            breach,
            RiskBreach::InsufficientPosition {
                requested: 500,
                available: 400
            }
        ));

        assert!(risk.check_order(&order(Side::Sell, 400, None), &view).is_ok());
    }

    #[test]
    fn exposure_cap_counts_existing_holdings() {
        let risk = RiskManager::default();
        let view = AccountView {
            total_assets: dec!(100000),
            available_cash: dec!(9000),
            stock_value: dec!(91000),
            ..wealthy_view()
        };

        // 100 * 40 = 4000 more: (91_000 + 4_000) / 100_000 = 0.95 passes at the boundary,
        // but a tighter cap rejects it.
        let tight = RiskManager::new(RiskConfig {
            max_total_exposure: dec!(0.92),
            max_position_pct: Decimal::ONE,
            ..RiskConfig::default()
        });
        let breach = tight
            .check_order(&order(Side::Buy, 100, None), &view)
            .unwrap_err();
        assert!(matches!(breach, RiskBreach::ExposureCapExceeded { .. }));
    }
}
