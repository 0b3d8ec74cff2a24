use ashare_instrument::Side;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fee configuration for Chinese A-share trading.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CostConfig {
    pub commission_rate: Decimal,
    pub min_commission: Decimal,
    /// Charged on sells only.
    pub stamp_tax_rate: Decimal,
    /// Charged both sides.
    pub transfer_fee_rate: Decimal,
    /// Slippage proxy, added to buy cost and subtracted from sell proceeds.
    pub market_impact_rate: Decimal,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(3, 4),      // 0.0003
            min_commission: Decimal::new(5, 0),       // 5.00
            stamp_tax_rate: Decimal::new(1, 3),       // 0.001
            transfer_fee_rate: Decimal::new(2, 5),    // 0.00002
            market_impact_rate: Decimal::new(1, 4),   // 0.0001
        }
    }
}

/// Per-order cost breakdown, every amount quantized to two decimal places.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct CostBreakdown {
    pub commission: Decimal,
    pub stamp_tax: Decimal,
    pub transfer_fee: Decimal,
    pub market_impact: Decimal,
    pub total: Decimal,
}

/// Deterministic fee/slippage/stamp-tax calculation. Pure: no state beyond the configured
/// rates.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct CostModel {
    config: CostConfig,
}

impl CostModel {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    /// Full cost of executing `quantity` shares at `price` on the given side.
    pub fn cost(&self, quantity: i64, price: Decimal, side: Side) -> CostBreakdown {
        let notional = Decimal::from(quantity) * price;

        let commission = quantize((notional * self.config.commission_rate)
            .max(self.config.min_commission));
        let stamp_tax = match side {
            Side::Sell => quantize(notional * self.config.stamp_tax_rate),
            Side::Buy => Decimal::ZERO,
        };
        let transfer_fee = quantize(notional * self.config.transfer_fee_rate);
        let market_impact = quantize(notional * self.config.market_impact_rate);

        CostBreakdown {
            commission,
            stamp_tax,
            transfer_fee,
            market_impact,
            total: commission + stamp_tax + transfer_fee + market_impact,
        }
    }

    /// Net cash effect: what a buy costs in total, or what a sell nets after costs.
    pub fn net_amount(&self, quantity: i64, price: Decimal, side: Side) -> Decimal {
        let gross = Decimal::from(quantity) * price;
        let total = self.cost(quantity, price, side).total;
        match side {
            Side::Buy => quantize(gross + total),
            Side::Sell => quantize(gross - total),
        }
    }
}

/// Two decimal places, banker's rounding.
fn quantize(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
