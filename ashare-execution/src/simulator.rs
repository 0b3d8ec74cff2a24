use crate::order::{Order, OrderType};
use ashare_data::bar::Bar;
use ashare_instrument::{rules::MarketRules, session::TradingSession, Side};
use chrono::NaiveDateTime;
use rust_decimal::{prelude::ToPrimitive, Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Slippage model used for market-order fill prices.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactModel {
    Linear,
    SquareRoot,
}

/// Configuration for the [`MarketSimulator`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Test-harness bypass of the session gate. Never honoured by the live path.
    pub ignore_trading_hours: bool,
    pub impact_model: ImpactModel,
    pub base_impact: Decimal,
    /// Maximum fraction of a bar's volume one order may consume.
    pub max_participation_rate: Decimal,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ignore_trading_hours: false,
            impact_model: ImpactModel::Linear,
            base_impact: Decimal::new(1, 3),          // 0.001
            max_participation_rate: Decimal::new(1, 1), // 0.10
        }
    }
}

/// The simulator's fill verdict for one order against one bar.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FillDecision {
    pub quantity: i64,
    pub price: Decimal,
}

/// Deterministic exchange-rule simulation: given an order, the bar for its trading day and
/// the simulated clock, decide whether (and how) the order fills.
///
/// Enforces the session gate, suspension, the daily price-limit band, tick rounding, the
/// liquidity participation cap and a configurable market-impact model. Being a pure function
/// of bar data keeps backtests reproducible.
#[derive(Clone, Debug)]
pub struct MarketSimulator {
    config: SimulatorConfig,
    session: TradingSession,
}

impl MarketSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            session: TradingSession::default(),
        }
    }

    /// Decide the fill for `order` against `bar` at simulated time `now`. `None` means no
    /// fill this session (the order stays live).
    pub fn decide(&self, order: &Order, bar: &Bar, now: NaiveDateTime) -> Option<FillDecision> {
        if !self.config.ignore_trading_hours && !self.session.is_trading_time(now) {
            warn!(order_id = %order.id, %now, "order outside trading session, no fill");
            return None;
        }

        if bar.is_suspended() {
            warn!(order_id = %order.id, symbol = %order.symbol, "bar suspended, no fill");
            return None;
        }

        let rules = MarketRules::for_board(order.symbol.board());
        let pre_close = bar.pre_close.unwrap_or(bar.close);
        let limits = rules.price_limits(pre_close);

        let price = match order.order_type {
            OrderType::Market => self.market_order_price(order, bar, &rules, limits)?,
            OrderType::Limit => self.limit_order_price(order, bar, limits)?,
        };

        let quantity = self.max_fill_quantity(order.quantity, bar.volume, &rules);
        if quantity == 0 {
            debug!(order_id = %order.id, "liquidity cap leaves nothing to fill");
            return None;
        }

        Some(FillDecision { quantity, price })
    }

    fn market_order_price(
        &self,
        order: &Order,
        bar: &Bar,
        rules: &MarketRules,
        limits: Option<(Decimal, Decimal)>,
    ) -> Option<Decimal> {
        if let Some((lower, upper)) = limits {
            // A one-sided market locked at the limit has no counterparty.
            match order.side {
                Side::Buy if bar.close >= upper => {
                    debug!(order_id = %order.id, "limit-up bar blocks market buy");
                    return None;
                }
                Side::Sell if bar.close <= lower => {
                    debug!(order_id = %order.id, "limit-down bar blocks market sell");
                    return None;
                }
                _ => {}
            }
        }

        let impact = self.impact(order.quantity, bar.volume);
        let mut price = match order.side {
            Side::Buy => bar.close * (Decimal::ONE + impact),
            Side::Sell => bar.close * (Decimal::ONE - impact),
        };
        if let Some((lower, upper)) = limits {
            price = price.clamp(lower, upper);
        }
        Some(rules.round_to_tick(price))
    }

    fn limit_order_price(
        &self,
        order: &Order,
        bar: &Bar,
        limits: Option<(Decimal, Decimal)>,
    ) -> Option<Decimal> {
        let limit_price = order.price?;

        if let Some((lower, upper)) = limits {
            if limit_price < lower || limit_price > upper {
                debug!(order_id = %order.id, %limit_price, "limit price outside daily band");
                return None;
            }
        }

        let crosses = match order.side {
            Side::Buy => limit_price >= bar.low,
            Side::Sell => limit_price <= bar.high,
        };
        crosses.then_some(limit_price)
    }

    fn impact(&self, quantity: i64, volume: i64) -> Decimal {
        if volume <= 0 {
            return Decimal::ZERO;
        }
        let ratio = Decimal::from(quantity) / Decimal::from(volume);
        match self.config.impact_model {
            ImpactModel::Linear => self.config.base_impact * ratio,
            ImpactModel::SquareRoot => {
                self.config.base_impact * ratio.sqrt().unwrap_or(Decimal::ZERO)
            }
        }
    }

    fn max_fill_quantity(&self, ordered: i64, bar_volume: i64, rules: &MarketRules) -> i64 {
        let capacity = Decimal::from(bar_volume) * self.config.max_participation_rate;
        let capacity = capacity.trunc().to_i64().unwrap_or(0);
        ordered.min(rules.floor_to_lot(capacity))
    }
}
