use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_execution::fill::Fill;
use ashare_instrument::{symbol::Symbol, Side};
use ashare_ta::indicators::Rsi;
use chrono::NaiveDate;
use fnv::FnvHashMap;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// T-trading pattern selection.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Sell part of the settled base position high, buy it back lower the same day.
    RegularT,
    /// Buy an extra tranche low, sell it higher - no earlier than the next session (T+1).
    ReverseT,
    /// Pick per symbol: regular T with a base position, reverse T without.
    Auto,
}

/// Configuration for constructing an [`EtfTTrading`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    /// Fraction of the base position traded per T round.
    pub t_ratio: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Lookback window for support/resistance levels.
    pub support_lookback: usize,
    /// ETF premium (percent) above which selling is favoured.
    pub premium_threshold: f64,
    /// ETF discount (percent) below which buying is favoured.
    pub discount_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            t_ratio: 0.3,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            support_lookback: 20,
            premium_threshold: 1.0,
            discount_threshold: -0.5,
        }
    }
}

/// Per-symbol round-trip state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum TState {
    Idle,
    /// Regular T: sold high, waiting to buy the tranche back lower.
    WaitingBuy,
    /// Reverse T: bought low, waiting (at least one session) to sell higher.
    WaitingSell,
}

#[derive(Debug)]
struct SymbolState {
    rsi: Rsi,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    t_state: TState,
    entry_price: f64,
    t_quantity: i64,
    last_trade_date: Option<NaiveDate>,
    premium_pct: f64,
    /// Net position observed through fills.
    position: i64,
}

/// ETF T+1 intraday strategy with premium-rate awareness.
///
/// Scores buy and sell pressure from the RSI, proximity to rolling support/resistance and
/// the ETF premium/discount, then runs the selected T pattern as a small state machine per
/// symbol (`idle | waiting_buy | waiting_sell`). The reverse-T closing sell is held back
/// until a later session date, honouring T+1.
#[derive(Debug)]
pub struct EtfTTrading {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

/// Minimum pressure score before either leg fires.
const SIGNAL_FLOOR: f64 = 35.0;

impl EtfTTrading {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }

    /// Feed the latest ETF premium rate (percent vs NAV) from an external monitor.
    pub fn update_premium_rate(&mut self, symbol: &Symbol, premium_pct: f64) {
        if let Some(state) = self.states.get_mut(symbol) {
            state.premium_pct = premium_pct;
        }
    }

    fn state_for(&mut self, symbol: &Symbol) -> &mut SymbolState {
        let config = self.config;
        self.states.entry(symbol.clone()).or_insert_with(|| SymbolState {
            rsi: Rsi::new(config.rsi_period),
            highs: VecDeque::with_capacity(config.support_lookback + 1),
            lows: VecDeque::with_capacity(config.support_lookback + 1),
            t_state: TState::Idle,
            entry_price: 0.0,
            t_quantity: 0,
            last_trade_date: None,
            premium_pct: 0.0,
            position: 0,
        })
    }
}

impl Strategy for EtfTTrading {
    fn name(&self) -> &'static str {
        "etf_t_trading"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let config = self.config;
        let Some(price) = market.close().to_f64() else {
            return Vec::new();
        };
        let (high, low) = (
            market.high().to_f64().unwrap_or(price),
            market.low().to_f64().unwrap_or(price),
        );
        let today = market.time.date_naive();

        let state = self.state_for(&market.symbol);
        state.highs.push_back(high);
        state.lows.push_back(low);
        if state.highs.len() > config.support_lookback {
            state.highs.pop_front();
            state.lows.pop_front();
        }

        let rsi = state.rsi.update(market.close()).and_then(|rsi| rsi.to_f64());
        if state.highs.len() < config.support_lookback {
            return Vec::new();
        }
        let Some(rsi) = rsi else {
            return Vec::new();
        };
        let resistance = state.highs.iter().copied().fold(f64::MIN, f64::max);
        let support = state.lows.iter().copied().fold(f64::MAX, f64::min);

        // Score buy/sell pressure from the three inputs.
        let mut buy_strength = 0.0;
        let mut sell_strength = 0.0;
        if rsi < config.rsi_oversold {
            buy_strength += 30.0;
        } else if rsi > config.rsi_overbought {
            sell_strength += 30.0;
        }
        if price <= support * 1.01 {
            buy_strength += 35.0;
        } else if price >= resistance * 0.99 {
            sell_strength += 35.0;
        }
        if state.premium_pct > config.premium_threshold {
            sell_strength += 20.0;
        } else if state.premium_pct < config.discount_threshold {
            buy_strength += 20.0;
        }

        debug!(
            symbol = %market.symbol,
            price,
            rsi,
            support,
            resistance,
            premium = state.premium_pct,
            buy_strength,
            sell_strength,
            state = ?state.t_state,
            "t-trading scores"
        );

        let regular = matches!(config.mode, Mode::RegularT)
            || (matches!(config.mode, Mode::Auto) && state.position > 0);

        if regular {
            match state.t_state {
                TState::Idle
                    if sell_strength > buy_strength
                        && sell_strength >= SIGNAL_FLOOR
                        && state.position > 0 =>
                {
                    let quantity = (state.position as f64 * config.t_ratio) as i64 / 100 * 100;
                    if quantity >= 100 {
                        state.t_state = TState::WaitingBuy;
                        state.entry_price = price;
                        state.t_quantity = quantity;
                        state.last_trade_date = Some(today);
                        info!(symbol = %market.symbol, quantity, price, "regular T sell leg");
                        return vec![Signal::new(
                            market.time,
                            market.symbol.clone(),
                            SignalKind::Sell,
                            sell_strength / 100.0,
                        )];
                    }
                }
                TState::WaitingBuy
                    if buy_strength > sell_strength
                        && buy_strength >= SIGNAL_FLOOR
                        && state.t_quantity > 0
                        && price < state.entry_price =>
                {
                    state.t_state = TState::Idle;
                    let quantity = state.t_quantity;
                    state.t_quantity = 0;
                    info!(symbol = %market.symbol, quantity, price, "regular T buyback leg");
                    return vec![Signal::new(
                        market.time,
                        market.symbol.clone(),
                        SignalKind::Buy,
                        buy_strength / 100.0,
                    )];
                }
                _ => {}
            }
        } else {
            match state.t_state {
                TState::Idle if buy_strength > sell_strength && buy_strength >= SIGNAL_FLOOR => {
                    state.t_state = TState::WaitingSell;
                    state.entry_price = price;
                    state.last_trade_date = Some(today);
                    info!(symbol = %market.symbol, price, "reverse T buy leg");
                    return vec![Signal::new(
                        market.time,
                        market.symbol.clone(),
                        SignalKind::Buy,
                        buy_strength / 100.0,
                    )];
                }
                TState::WaitingSell
                    if sell_strength > buy_strength && sell_strength >= SIGNAL_FLOOR =>
                {
                    // T+1: the tranche bought on the entry date is only sellable from the
                    // next session on, and only in profit.
                    let settled = state
                        .last_trade_date
                        .is_none_or(|entry| today > entry);
                    if settled && price > state.entry_price {
                        state.t_state = TState::Idle;
                        info!(symbol = %market.symbol, price, "reverse T sell leg");
                        return vec![Signal::new(
                            market.time,
                            market.symbol.clone(),
                            SignalKind::Sell,
                            sell_strength / 100.0,
                        )];
                    }
                }
                _ => {}
            }
        }

        Vec::new()
    }

    fn on_fill(&mut self, fill: &Fill, side: Side) {
        let state = self.state_for(&fill.symbol);
        match side {
            Side::Buy => state.position += fill.quantity,
            Side::Sell => state.position -= fill.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_data::bar::Bar;
    use chrono::{Days, NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::new("513090.SH").unwrap()
    }

    fn event(close: Decimal, day: u64) -> MarketEvent {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .checked_add_days(Days::new(day))
            .unwrap();
        let bar = Bar::daily(
            symbol(),
            date,
            close,
            close + dec!(0.005),
            close - dec!(0.005),
            close,
            10_000_000,
            None,
        )
        .unwrap();
        MarketEvent::from_bar(date.and_hms_opt(15, 0, 0).unwrap().and_utc(), bar)
    }

    fn config() -> Config {
        Config {
            mode: Mode::ReverseT,
            rsi_period: 3,
            support_lookback: 5,
            ..Config::default()
        }
    }

    /// Drive a decline to the support, then a rally: the buy leg fires at the bottom and the
    /// sell leg must wait for a later session date.
    #[test]
    fn reverse_t_round_trip_respects_t_plus_one() {
        let mut strategy = EtfTTrading::new(config());

        let mut signals = Vec::new();
        let path = [
            dec!(1.10),
            dec!(1.08),
            dec!(1.06),
            dec!(1.04),
            dec!(1.02), // day 4: at support, oversold -> buy leg
        ];
        for (day, close) in path.into_iter().enumerate() {
            signals.extend(strategy.on_market(&event(close, day as u64)));
        }
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);

        // Same-day rally to the resistance: T+1 forbids the closing sell.
        let same_day = strategy.on_market(&event(dec!(1.12), 4));
        assert!(same_day.is_empty());

        // Next session, still at the highs: the sell leg may fire.
        let next_day = strategy.on_market(&event(dec!(1.13), 5));
        assert_eq!(next_day.len(), 1);
        assert_eq!(next_day[0].kind, SignalKind::Sell);
    }

    #[test]
    fn regular_t_needs_a_base_position() {
        let mut strategy = EtfTTrading::new(Config {
            mode: Mode::RegularT,
            ..config()
        });

        // Rally toward resistance with no position: nothing may fire.
        let path = [dec!(1.00), dec!(1.02), dec!(1.04), dec!(1.06), dec!(1.08)];
        let mut signals = Vec::new();
        for (day, close) in path.into_iter().enumerate() {
            signals.extend(strategy.on_market(&event(close, day as u64)));
        }
        assert!(signals.is_empty());

        // With a settled base position the sell leg fires on the next push higher.
        strategy.on_fill(
            &Fill::new(
                ashare_execution::order::OrderId::new("O-1"),
                symbol(),
                10_000,
                dec!(1.00),
                dec!(5.00),
                Utc::now(),
            ),
            Side::Buy,
        );
        let signals = strategy.on_market(&event(dec!(1.10), 5));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Sell);
    }
}
