use crate::{
    risk::AccountView,
    strategy::{Signal, SignalKind},
};
use ashare_data::event::MarketEvent;
use ashare_execution::{
    cost::CostModel,
    fill::Fill,
    order::{AccountId, Order, OrderId},
    position::Position,
};
use ashare_instrument::{symbol::Symbol, Side};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::{prelude::FromPrimitive, prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for constructing a [`Portfolio`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub initial_capital: Decimal,
    /// Cap on one position as a fraction of available cash when sizing buys.
    pub max_position_pct: Decimal,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::new(1_000_000, 0),
            max_position_pct: Decimal::new(10, 2), // 0.10
        }
    }
}

/// One equity-curve observation.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct EquitySample {
    pub time: DateTime<Utc>,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub holdings: Decimal,
}

/// One executed trade on the tape.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct TradeRecord {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: i64,
    pub price: Decimal,
    pub commission: Decimal,
}

/// Cash & positions ledger with signal-to-order sizing and performance tracking.
///
/// On every market event the book is marked to market and exactly one equity sample is
/// appended (monotonic in time). Signals size to orders under the position-percent rule;
/// fills update cash, positions (T+1 lockbox included) and the trade tape.
#[derive(Debug)]
pub struct Portfolio {
    account: AccountId,
    config: PortfolioConfig,
    cash: Decimal,
    positions: FnvHashMap<Symbol, Position>,
    current_prices: FnvHashMap<Symbol, Decimal>,
    /// Side/symbol of orders this portfolio created, for fill attribution.
    order_index: FnvHashMap<OrderId, (Symbol, Side)>,
    equity_curve: Vec<EquitySample>,
    daily_returns: Vec<f64>,
    trades: Vec<TradeRecord>,
    order_sequence: u64,
    board_lot: i64,
}

impl Portfolio {
    pub fn new(account: AccountId, config: PortfolioConfig) -> Self {
        Self {
            account,
            config,
            cash: config.initial_capital,
            positions: FnvHashMap::default(),
            current_prices: FnvHashMap::default(),
            order_index: FnvHashMap::default(),
            equity_curve: Vec::new(),
            daily_returns: Vec::new(),
            trades: Vec::new(),
            order_sequence: 0,
            board_lot: 100,
        }
    }

    /// Mark the book to market and append an equity sample. Call once per market event.
    pub fn update_from_market(&mut self, market: &MarketEvent) {
        let price = market.close();
        if price <= Decimal::ZERO {
            return;
        }
        self.current_prices.insert(market.symbol.clone(), price);

        if let Some(position) = self.positions.get_mut(&market.symbol) {
            position.roll_settlement(market.time.date_naive());
            position.mark(price);
        }

        let holdings = self.stock_value();
        let total_value = self.cash + holdings;

        if let Some(previous) = self.equity_curve.last() {
            if previous.total_value > Decimal::ZERO {
                let step_return = ((total_value - previous.total_value)
                    / previous.total_value)
                    .to_f64()
                    .unwrap_or(0.0);
                self.daily_returns.push(step_return);
            }
        }

        self.equity_curve.push(EquitySample {
            time: market.time,
            total_value,
            cash: self.cash,
            holdings,
        });
    }

    /// Size a signal into a market order, or `None` when the signal does not convert
    /// (HOLD, missing price, sub-lot size, or nothing held to sell).
    pub fn generate_order(&mut self, signal: &Signal, now: DateTime<Utc>) -> Option<Order> {
        let strength = Decimal::from_f64(signal.strength.value())?;

        let (side, quantity) = match signal.kind {
            SignalKind::Hold => return None,
            SignalKind::Buy => {
                let Some(price) = self.current_prices.get(&signal.symbol).copied() else {
                    warn!(symbol = %signal.symbol, "no market price for buy signal, dropping");
                    return None;
                };
                let budget = self.cash * self.config.max_position_pct * strength;
                let quantity = (budget / price)
                    .trunc()
                    .to_i64()
                    .map(|raw| raw / self.board_lot * self.board_lot)
                    .unwrap_or(0);
                (Side::Buy, quantity)
            }
            SignalKind::Sell => {
                let held = self
                    .positions
                    .get(&signal.symbol)
                    .map(|position| position.quantity)
                    .unwrap_or(0);
                if held == 0 {
                    debug!(symbol = %signal.symbol, "no position to sell");
                    return None;
                }
                let quantity = (Decimal::from(held) * strength)
                    .trunc()
                    .to_i64()
                    .map(|raw| raw / self.board_lot * self.board_lot)
                    .unwrap_or(0);
                (Side::Sell, quantity)
            }
        };

        if quantity < self.board_lot {
            debug!(symbol = %signal.symbol, quantity, "sized below one lot, dropping signal");
            return None;
        }

        self.order_sequence += 1;
        let order = Order::market(
            OrderId::new(format!("ORD-{:08}", self.order_sequence)),
            self.account.clone(),
            signal.symbol.clone(),
            side,
            quantity,
            now,
        );
        self.register_order(&order);
        Some(order)
    }

    /// Record an order's symbol/side so later fills can be attributed. Orders created by
    /// [`Self::generate_order`] are registered automatically; live-mode order snapshots are
    /// registered by the engine.
    pub fn register_order(&mut self, order: &Order) {
        self.order_index
            .insert(order.id.clone(), (order.symbol.clone(), order.side));
    }

    /// Side of a registered order, for fill attribution.
    pub fn order_side(&self, order_id: &OrderId) -> Option<Side> {
        self.order_index.get(order_id).map(|(_, side)| *side)
    }

    /// Apply a fill: update cash, the position ledger and the trade tape.
    pub fn update_from_fill(&mut self, fill: &Fill) {
        let Some((symbol, side)) = self.order_index.get(&fill.order_id).cloned() else {
            warn!(order_id = %fill.order_id, "fill for unknown order, ignoring");
            return;
        };

        let trade_date = fill.timestamp.date_naive();
        let gross = fill.gross_value();

        match side {
            Side::Buy => {
                let position = self
                    .positions
                    .entry(symbol.clone())
                    .or_insert_with(|| Position::new(self.account.clone(), symbol.clone()));
                position.apply_buy(fill.quantity, fill.price, trade_date);
                self.cash -= gross + fill.commission;
            }
            Side::Sell => {
                let Some(position) = self.positions.get_mut(&symbol) else {
                    warn!(%symbol, "sell fill without a position, ignoring");
                    return;
                };
                if !position.apply_sell(fill.quantity, fill.price, trade_date) {
                    warn!(
                        %symbol,
                        quantity = fill.quantity,
                        "sell fill exceeds settled shares, ignoring"
                    );
                    return;
                }
                if position.is_flat() {
                    self.positions.remove(&symbol);
                }
                self.cash += gross - fill.commission;
            }
        }

        self.trades.push(TradeRecord {
            time: fill.timestamp,
            symbol,
            side,
            quantity: fill.quantity,
            price: fill.price,
            commission: fill.commission,
        });
    }

    /// Assemble the risk gate's view of this book for an order in `symbol`.
    pub fn account_view(&self, symbol: &Symbol) -> AccountView {
        let position = self.positions.get(symbol);
        AccountView {
            total_assets: self.total_value(),
            available_cash: self.cash,
            stock_value: self.stock_value(),
            position_quantity: position.map(|position| position.quantity).unwrap_or(0),
            position_available: position
                .map(|position| position.available_quantity)
                .unwrap_or(0),
            last_price: self.current_prices.get(symbol).copied(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn stock_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.cash + self.stock_value()
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn current_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.current_prices.get(symbol).copied()
    }

    pub fn equity_curve(&self) -> &[EquitySample] {
        &self.equity_curve
    }

    pub fn daily_returns(&self) -> &[f64] {
        &self.daily_returns
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn initial_capital(&self) -> Decimal {
        self.config.initial_capital
    }

    /// Estimate the cost of liquidating everything at current prices. Used in reporting.
    pub fn liquidation_costs(&self, cost_model: &CostModel) -> Decimal {
        self.positions
            .values()
            .filter_map(|position| {
                let price = position.last_price?;
                Some(cost_model.cost(position.quantity, price, Side::Sell).total)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_data::bar::Bar;
    use chrono::{Days, NaiveDate};
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::new("600036.SH").unwrap()
    }

    fn portfolio() -> Portfolio {
        Portfolio::new(AccountId::new("BACKTEST"), PortfolioConfig::default())
    }

    fn market_event(close: Decimal, day: u64) -> MarketEvent {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .checked_add_days(Days::new(day))
            .unwrap();
        let bar = Bar::daily(
            symbol(),
            date,
            close,
            close,
            close,
            close,
            10_000_000,
            Some(close),
        )
        .unwrap();
        MarketEvent::from_bar(date.and_hms_opt(15, 0, 0).unwrap().and_utc(), bar)
    }

    fn signal(kind: SignalKind, strength: f64) -> Signal {
        Signal::new(Utc::now(), symbol(), kind, strength)
    }

    #[test]
    fn buy_signal_sizes_to_lot_aligned_budget_share() {
        let mut portfolio = portfolio();
        portfolio.update_from_market(&market_event(dec!(40.00), 0));

        // 1_000_000 * 10% * 1.0 / 40 = 2_500 shares
        let order = portfolio
            .generate_order(&signal(SignalKind::Buy, 1.0), Utc::now())
            .unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 2_500);

        // Half strength halves the budget.
        let order = portfolio
            .generate_order(&signal(SignalKind::Buy, 0.5), Utc::now())
            .unwrap();
        assert_eq!(order.quantity, 1_200);
    }

    #[test]
    fn sub_lot_sizing_drops_the_signal() {
        let mut portfolio = Portfolio::new(
            AccountId::new("BACKTEST"),
            PortfolioConfig {
                initial_capital: dec!(30000),
                ..PortfolioConfig::default()
            },
        );
        portfolio.update_from_market(&market_event(dec!(40.00), 0));

        // 30_000 * 10% / 40 = 75 shares < one lot
        assert!(portfolio
            .generate_order(&signal(SignalKind::Buy, 1.0), Utc::now())
            .is_none());
    }

    #[test]
    fn hold_and_unpriced_signals_convert_to_nothing() {
        let mut portfolio = portfolio();
        assert!(portfolio
            .generate_order(&signal(SignalKind::Hold, 1.0), Utc::now())
            .is_none());
        // No market data seen yet: no price for the symbol.
        assert!(portfolio
            .generate_order(&signal(SignalKind::Buy, 1.0), Utc::now())
            .is_none());
    }

    #[test]
    fn fill_round_trip_updates_cash_positions_and_tape() {
        let mut portfolio = portfolio();
        portfolio.update_from_market(&market_event(dec!(40.00), 0));

        let order = portfolio
            .generate_order(&signal(SignalKind::Buy, 1.0), Utc::now())
            .unwrap();
        let buy_time = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
            .and_utc();
        portfolio.update_from_fill(&Fill::new(
            order.id.clone(),
            symbol(),
            order.quantity,
            dec!(40.00),
            dec!(30.00),
            buy_time,
        ));

        assert_eq!(
            portfolio.cash(),
            dec!(1000000) - dec!(100000) - dec!(30.00)
        );
        let position = portfolio.position(&symbol()).unwrap();
        assert_eq!(position.quantity, 2_500);
        assert_eq!(position.avg_cost, dec!(40.00));
        assert_eq!(portfolio.trades().len(), 1);

        // Next session: the shares settle and a sell applies.
        portfolio.update_from_market(&market_event(dec!(42.00), 1));
        let sell = portfolio
            .generate_order(&signal(SignalKind::Sell, 1.0), Utc::now())
            .unwrap();
        assert_eq!(sell.quantity, 2_500);

        let sell_time = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
            .and_utc();
        portfolio.update_from_fill(&Fill::new(
            sell.id.clone(),
            symbol(),
            2_500,
            dec!(42.00),
            dec!(140.00),
            sell_time,
        ));

        assert!(portfolio.position(&symbol()).is_none());
        assert_eq!(
            portfolio.cash(),
            dec!(1000000) - dec!(100000) - dec!(30.00) + dec!(105000) - dec!(140.00)
        );
    }

    #[test]
    fn equity_curve_is_monotonic_with_one_sample_per_event() {
        let mut portfolio = portfolio();
        for day in 0..5 {
            portfolio.update_from_market(&market_event(dec!(40.00), day));
        }

        let curve = portfolio.equity_curve();
        assert_eq!(curve.len(), 5);
        assert!(curve.windows(2).all(|pair| pair[0].time <= pair[1].time));
        // Flat prices, no trades: zero returns throughout.
        assert!(portfolio.daily_returns().iter().all(|r| *r == 0.0));
    }

    #[test]
    fn fills_for_unknown_orders_are_ignored() {
        let mut portfolio = portfolio();
        portfolio.update_from_fill(&Fill::new(
            OrderId::new("GHOST"),
            symbol(),
            100,
            dec!(40.00),
            dec!(5.00),
            Utc::now(),
        ));
        assert_eq!(portfolio.cash(), dec!(1000000));
        assert!(portfolio.trades().is_empty());
    }
}
